// eduhub-core/src/find_options.rs
// Find query options: projection, sort, limit, skip

use crate::value_utils::{compare_values_with_none, get_nested_value};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Options for find queries
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Projection: field → 1 (include) or 0 (exclude), dot notation allowed
    /// Special case: _id can be excluded in include mode
    pub projection: Option<HashMap<String, i32>>,

    /// Sort: [(field, direction)], direction: 1 (asc) or -1 (desc)
    pub sort: Option<Vec<(String, i32)>>,

    pub limit: Option<usize>,

    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        self.projection = Some(fields.into_iter().map(|(f, v)| (f.into(), v)).collect());
        self
    }

    pub fn with_sort<S: Into<String>>(mut self, field: S, direction: i32) -> Self {
        self.sort
            .get_or_insert_with(Vec::new)
            .push((field.into(), direction));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Apply sort, skip, limit and projection, in that order
    pub fn apply(&self, mut docs: Vec<Value>) -> Vec<Value> {
        if let Some(sort) = &self.sort {
            apply_sort(&mut docs, sort);
        }
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        let page = docs.into_iter().skip(skip).take(limit);
        match &self.projection {
            Some(projection) => page.map(|d| apply_projection(&d, projection)).collect(),
            None => page.collect(),
        }
    }
}

/// Keep the parts of `value` named by `paths` (relative, dot separated), in document order
fn include_paths(value: &Value, paths: &[&str]) -> Value {
    let obj = match value {
        Value::Object(obj) => obj,
        Value::Array(items) => {
            return Value::Array(
                items
                    .iter()
                    .filter(|item| item.is_object())
                    .map(|item| include_paths(item, paths))
                    .collect(),
            )
        }
        _ => return value.clone(),
    };

    let mut result = Map::new();
    for (key, child) in obj {
        let whole = paths.iter().any(|p| *p == key.as_str());
        if whole {
            result.insert(key.clone(), child.clone());
            continue;
        }
        let prefix = format!("{}.", key);
        let nested: Vec<&str> = paths
            .iter()
            .filter_map(|p| p.strip_prefix(prefix.as_str()))
            .collect();
        if nested.is_empty() {
            continue;
        }
        let projected = include_paths(child, &nested);
        if !matches!(&projected, Value::Object(m) if m.is_empty()) {
            result.insert(key.clone(), projected);
        }
    }
    Value::Object(result)
}

/// Apply projection to a document
///
/// Include mode keeps `_id` unless it is explicitly excluded; exclude mode
/// drops the listed top-level or dotted fields.
pub fn apply_projection(doc: &Value, projection: &HashMap<String, i32>) -> Value {
    if projection.is_empty() {
        return doc.clone();
    }

    let has_inclusions = projection.iter().any(|(f, &v)| v != 0 && f != "_id");
    let has_non_id_exclusions = projection
        .iter()
        .any(|(field, &action)| action == 0 && field != "_id");
    let include_mode = has_inclusions && !has_non_id_exclusions;

    if include_mode {
        let mut paths: Vec<&str> = projection
            .iter()
            .filter(|(_, &v)| v != 0)
            .map(|(f, _)| f.as_str())
            .collect();
        if projection.get("_id") != Some(&0) {
            paths.push("_id");
        }
        include_paths(doc, &paths)
    } else {
        let mut result = doc.clone();
        for (field, &action) in projection {
            if action == 0 {
                crate::value_utils::remove_nested_value(&mut result, field);
            }
        }
        result
    }
}

/// Stable sort by the given fields; missing values sort first
pub fn apply_sort(docs: &mut [Value], sort: &[(String, i32)]) {
    if sort.is_empty() {
        return;
    }

    docs.sort_by(|a, b| {
        for (field, direction) in sort {
            let cmp = compare_values_with_none(get_nested_value(a, field), get_nested_value(b, field));
            if cmp != std::cmp::Ordering::Equal {
                return if *direction >= 0 { cmp } else { cmp.reverse() };
            }
        }
        std::cmp::Ordering::Equal
    });
}
