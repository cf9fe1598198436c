// eduhub-cli/src/report.rs
//! Static SVG charts from transcribed query results
//!
//! The inputs are fixed snapshots, not live query output.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// EduHub greens
pub const GREENS: [&str; 3] = ["#2E8B57", "#228B22", "#32CD32"];
/// Fill for "without index" bars
pub const WITHOUT_INDEX: &str = "red";

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 500.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 90.0;

/// Input tables for the four charts
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub popular_categories: Vec<(String, f64)>,
    pub monthly_trend: Vec<(String, f64)>,
    /// (metric, without index, with index)
    pub performance: Vec<(String, f64, f64)>,
    pub user_distribution: Vec<(String, f64)>,
}

fn rows(items: &[(&str, f64)]) -> Vec<(String, f64)> {
    items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

impl Default for ChartData {
    fn default() -> Self {
        ChartData {
            popular_categories: rows(&[
                ("Programming", 32.0),
                ("Data Science", 17.0),
                ("Web Development", 16.0),
            ]),
            monthly_trend: rows(&[("2025-01", 5.0), ("2025-02", 15.0), ("2025-03", 10.0)]),
            performance: vec![
                ("Docs examined".to_string(), 28.0, 8.0),
                ("Time (s)".to_string(), 0.0060, 0.0055),
            ],
            user_distribution: rows(&[("Students", 15.0), ("Instructors", 5.0)]),
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Integers without a fraction, everything else as written
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Tick spacing of 1, 2 or 5 times a power of ten, about five ticks up to `max`
fn tick_step(max: f64) -> f64 {
    if max <= 0.0 {
        return 1.0;
    }
    let raw = max / 5.0;
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

struct Svg {
    body: String,
}

impl Svg {
    fn new(title: &str) -> Self {
        let mut body = String::new();
        body.push_str(&format!(
            r##"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg" font-family="sans-serif" style="background-color: #ffffff;">"##,
            w = WIDTH,
            h = HEIGHT
        ));
        body.push_str(&format!(
            r##"<text x="{:.1}" y="35" text-anchor="middle" font-size="20" font-weight="bold">{}</text>"##,
            WIDTH / 2.0,
            escape(title)
        ));
        Svg { body }
    }

    fn push(&mut self, element: String) {
        self.body.push_str(&element);
    }

    fn text(&mut self, x: f64, y: f64, anchor: &str, extra: &str, content: &str) {
        self.push(format!(
            r##"<text x="{:.1}" y="{:.1}" text-anchor="{}" font-size="13"{}>{}</text>"##,
            x,
            y,
            anchor,
            extra,
            escape(content)
        ));
    }

    fn finish(mut self) -> String {
        self.body.push_str("</svg>");
        self.body
    }
}

/// Plot area with a y axis scaled to `max`
struct Axes {
    max: f64,
    step: f64,
}

impl Axes {
    fn new(values: impl Iterator<Item = f64>) -> Self {
        let data_max = values.fold(0.0, f64::max);
        let step = tick_step(data_max);
        let max = (data_max / step).ceil().max(1.0) * step;
        Axes { max, step }
    }

    fn plot_height() -> f64 {
        HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn plot_width() -> f64 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn y(&self, value: f64) -> f64 {
        HEIGHT - MARGIN_BOTTOM - value / self.max * Self::plot_height()
    }

    fn draw(&self, svg: &mut Svg, x_label: &str, y_label: &str) {
        let decimals = (-self.step.log10().floor()).max(0.0) as usize;
        let ticks = (self.max / self.step).round() as usize;
        for i in 0..=ticks {
            let value = self.step * i as f64;
            let y = self.y(value);
            svg.push(format!(
                r##"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#cccccc" stroke-width="1" opacity="0.3"/>"##,
                MARGIN_LEFT,
                y,
                WIDTH - MARGIN_RIGHT,
                y
            ));
            svg.text(MARGIN_LEFT - 8.0, y + 4.0, "end", "", &format!("{:.*}", decimals, value));
        }
        svg.push(format!(
            r##"<line x1="{l:.1}" y1="{t:.1}" x2="{l:.1}" y2="{b:.1}" stroke="#333333" stroke-width="1"/><line x1="{l:.1}" y1="{b:.1}" x2="{r:.1}" y2="{b:.1}" stroke="#333333" stroke-width="1"/>"##,
            l = MARGIN_LEFT,
            t = MARGIN_TOP,
            b = HEIGHT - MARGIN_BOTTOM,
            r = WIDTH - MARGIN_RIGHT
        ));
        svg.text(WIDTH / 2.0, HEIGHT - 15.0, "middle", "", x_label);
        svg.push(format!(
            r##"<text x="20" y="{y:.1}" text-anchor="middle" font-size="13" transform="rotate(-90 20 {y:.1})">{}</text>"##,
            escape(y_label),
            y = MARGIN_TOP + Self::plot_height() / 2.0
        ));
    }

    /// Rotated category label below the x axis
    fn category_label(svg: &mut Svg, x: f64, label: &str) {
        let y = HEIGHT - MARGIN_BOTTOM + 18.0;
        svg.push(format!(
            r##"<text x="{x:.1}" y="{y:.1}" text-anchor="end" font-size="13" transform="rotate(-45 {x:.1} {y:.1})">{}</text>"##,
            escape(label)
        ));
    }
}

/// One bar per row, cycling through `colors`
pub fn bar_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    data: &[(String, f64)],
    colors: &[&str],
) -> String {
    let mut svg = Svg::new(title);
    let axes = Axes::new(data.iter().map(|(_, v)| *v));
    axes.draw(&mut svg, x_label, y_label);

    let slot = Axes::plot_width() / data.len().max(1) as f64;
    let bar_width = slot * 0.6;
    for (i, (label, value)) in data.iter().enumerate() {
        let center = MARGIN_LEFT + slot * (i as f64 + 0.5);
        let top = axes.y(*value);
        let color = colors.get(i % colors.len().max(1)).copied().unwrap_or(GREENS[0]);
        svg.push(format!(
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"##,
            center - bar_width / 2.0,
            top,
            bar_width,
            HEIGHT - MARGIN_BOTTOM - top,
            color
        ));
        svg.text(center, top - 6.0, "middle", r#" font-weight="bold""#, &format_value(*value));
        Axes::category_label(&mut svg, center, label);
    }
    svg.finish()
}

/// Polyline with a marker and value annotation at each point
pub fn line_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    data: &[(String, f64)],
    color: &str,
) -> String {
    let mut svg = Svg::new(title);
    let axes = Axes::new(data.iter().map(|(_, v)| *v));
    axes.draw(&mut svg, x_label, y_label);

    let slot = Axes::plot_width() / data.len().max(1) as f64;
    let points: Vec<(f64, f64)> = data
        .iter()
        .enumerate()
        .map(|(i, (_, v))| (MARGIN_LEFT + slot * (i as f64 + 0.5), axes.y(*v)))
        .collect();

    let path = points
        .iter()
        .map(|(x, y)| format!("{:.1},{:.1}", x, y))
        .collect::<Vec<_>>()
        .join(" ");
    svg.push(format!(
        r##"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"##,
        path, color
    ));

    for ((x, y), (label, value)) in points.iter().zip(data) {
        svg.push(format!(
            r##"<circle cx="{:.1}" cy="{:.1}" r="6" fill="{}"/>"##,
            x, y, color
        ));
        svg.text(*x, y - 12.0, "middle", "", &format_value(*value));
        Axes::category_label(&mut svg, *x, label);
    }
    svg.finish()
}

/// Side-by-side bars per metric with a legend
pub fn grouped_bar_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    rows: &[(String, f64, f64)],
    series: [(&str, &str); 2],
) -> String {
    let mut svg = Svg::new(title);
    let axes = Axes::new(rows.iter().flat_map(|(_, a, b)| [*a, *b]));
    axes.draw(&mut svg, x_label, y_label);

    let slot = Axes::plot_width() / rows.len().max(1) as f64;
    let bar_width = slot * 0.35;
    for (i, (metric, first, second)) in rows.iter().enumerate() {
        let center = MARGIN_LEFT + slot * (i as f64 + 0.5);
        for (offset, value, (_, color)) in [(-0.5, *first, series[0]), (0.5, *second, series[1])] {
            let x = center + offset * bar_width;
            let top = axes.y(value);
            svg.push(format!(
                r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" opacity="0.7"/>"##,
                x - bar_width / 2.0,
                top,
                bar_width,
                HEIGHT - MARGIN_BOTTOM - top,
                color
            ));
            svg.text(x, top - 6.0, "middle", "", &format_value(value));
        }
        svg.text(center, HEIGHT - MARGIN_BOTTOM + 20.0, "middle", "", metric);
    }

    for (i, (label, color)) in series.iter().enumerate() {
        let y = MARGIN_TOP + 10.0 + 22.0 * i as f64;
        let x = WIDTH - MARGIN_RIGHT - 140.0;
        svg.push(format!(
            r##"<rect x="{:.1}" y="{:.1}" width="14" height="14" fill="{}" opacity="0.7"/>"##,
            x, y, color
        ));
        svg.text(x + 20.0, y + 12.0, "start", "", label);
    }
    svg.finish()
}

/// Pie starting at 12 o'clock, counter-clockwise, with percentage labels
pub fn pie_chart(title: &str, data: &[(String, f64)], colors: &[&str]) -> String {
    let mut svg = Svg::new(title);
    let total: f64 = data.iter().map(|(_, v)| v).sum();
    let (cx, cy, r) = (WIDTH / 2.0, HEIGHT / 2.0 + 20.0, 170.0);
    let point = |angle: f64, radius: f64| (cx + radius * angle.cos(), cy - radius * angle.sin());

    let mut start = PI / 2.0;
    for (i, (label, value)) in data.iter().enumerate() {
        if total <= 0.0 {
            break;
        }
        let fraction = value / total;
        let sweep = fraction * 2.0 * PI;
        let end = start + sweep;
        let color = colors.get(i % colors.len().max(1)).copied().unwrap_or(GREENS[0]);

        if fraction >= 1.0 {
            svg.push(format!(
                r##"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}"/>"##,
                cx, cy, r, color
            ));
        } else {
            let (x1, y1) = point(start, r);
            let (x2, y2) = point(end, r);
            let large_arc = if sweep > PI { 1 } else { 0 };
            svg.push(format!(
                r##"<path d="M {:.1} {:.1} L {:.1} {:.1} A {:.1} {:.1} 0 {} 0 {:.1} {:.1} Z" fill="{}" stroke="#ffffff" stroke-width="1"/>"##,
                cx, cy, x1, y1, r, r, large_arc, x2, y2, color
            ));
        }

        let middle = start + sweep / 2.0;
        let (px, py) = point(middle, r * 0.6);
        svg.text(px, py + 4.0, "middle", r##" fill="#ffffff" font-weight="bold""##, &format!("{:.1}%", fraction * 100.0));
        let (lx, ly) = point(middle, r * 1.15);
        let anchor = if middle.cos() >= 0.0 { "start" } else { "end" };
        svg.text(lx, ly + 4.0, anchor, "", label);

        start = end;
    }
    svg.finish()
}

/// Render the four charts into `dir`, creating it if needed
pub fn render_all(dir: &Path, data: &ChartData) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let charts = [
        (
            "popular_categories.svg",
            bar_chart(
                "Category of most Popular Courses (Enrollments)",
                "Category",
                "Number of Enrollments",
                &data.popular_categories,
                &GREENS,
            ),
        ),
        (
            "monthly_trends.svg",
            line_chart(
                "Monthly Enrollment Trends",
                "Month",
                "Number of Enrollments",
                &data.monthly_trend,
                GREENS[0],
            ),
        ),
        (
            "performance_optimization.svg",
            grouped_bar_chart(
                "Performance Optimization: Before/After Index",
                "Metric",
                "Value",
                &data.performance,
                [("Without index", WITHOUT_INDEX), ("With index", GREENS[1])],
            ),
        ),
        (
            "user_distribution.svg",
            pie_chart("Distribution of Users", &data.user_distribution, &GREENS[..2]),
        ),
    ];

    let mut written = Vec::with_capacity(charts.len());
    for (file, svg) in charts {
        let path = dir.join(file);
        fs::write(&path, svg)?;
        tracing::info!(path = %path.display(), "chart saved");
        written.push(path);
    }
    Ok(written)
}
