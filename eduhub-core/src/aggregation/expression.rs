// eduhub-core/src/aggregation/expression.rs
//! Aggregation expressions used by `$project`, `$group` keys and accumulators

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::error::{EduHubError, Result};
use crate::value_utils::{
    compare_values_total, date_value, get_nested_value, is_date, parse_date, values_equal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "$eq" => Some(CompareOp::Eq),
            "$ne" => Some(CompareOp::Ne),
            "$gt" => Some(CompareOp::Gt),
            "$gte" => Some(CompareOp::Gte),
            "$lt" => Some(CompareOp::Lt),
            "$lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    fn apply(&self, a: &Value, b: &Value) -> bool {
        match self {
            CompareOp::Eq => values_equal(a, b),
            CompareOp::Ne => !values_equal(a, b),
            CompareOp::Gt => compare_values_total(a, b) == Ordering::Greater,
            CompareOp::Gte => compare_values_total(a, b) != Ordering::Less,
            CompareOp::Lt => compare_values_total(a, b) == Ordering::Less,
            CompareOp::Lte => compare_values_total(a, b) != Ordering::Greater,
        }
    }
}

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// `"$path.to.field"`, stored without the `$`
    Field(String),
    Object(Vec<(String, Expression)>),
    Array(Vec<Expression>),
    Cond {
        condition: Box<Expression>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },
    Compare(CompareOp, Box<Expression>, Box<Expression>),
    Add(Vec<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Vec<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    Size(Box<Expression>),
    DateToString {
        format: String,
        date: Box<Expression>,
    },
}

fn agg_err(msg: impl Into<String>) -> EduHubError {
    EduHubError::AggregationError(msg.into())
}

fn parse_args(op: &str, args: &Value) -> Result<Vec<Expression>> {
    match args {
        Value::Array(items) => items.iter().map(Expression::parse).collect(),
        single => Ok(vec![Expression::parse(single).map_err(|e| {
            agg_err(format!("{} argument: {}", op, e))
        })?]),
    }
}

fn exactly_two(op: &str, args: &Value) -> Result<(Box<Expression>, Box<Expression>)> {
    let mut parsed = parse_args(op, args)?;
    if parsed.len() != 2 {
        return Err(agg_err(format!("{} takes exactly 2 arguments", op)));
    }
    let second = parsed.pop().map(Box::new);
    let first = parsed.pop().map(Box::new);
    match (first, second) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(agg_err(format!("{} takes exactly 2 arguments", op))),
    }
}

/// Truthiness used by `$cond`: null, missing, false and 0 are false
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(_) => true,
    }
}

/// Numeric result: integral when every operand was an integer
fn number_value(result: f64, all_int: bool) -> Value {
    if all_int && result.fract() == 0.0 && result.abs() < 9.0e15 {
        Value::from(result as i64)
    } else {
        Value::from(result)
    }
}

fn operand_number(op: &str, value: &Value) -> Result<(f64, bool)> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(|f| (f, n.is_i64() || n.is_u64()))
            .ok_or_else(|| agg_err(format!("{} operand out of range", op))),
        other => Err(agg_err(format!(
            "{} only supports numeric types, got {}",
            op, other
        ))),
    }
}

/// Render an instant with the `%Y %m %d %H %M %S %L %j %%` specifiers
pub fn format_date(format: &str, dt: &DateTime<Utc>) -> Result<String> {
    let mut out = String::with_capacity(format.len() + 8);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str(&format!("{:04}", dt.year())),
            Some('m') => out.push_str(&format!("{:02}", dt.month())),
            Some('d') => out.push_str(&format!("{:02}", dt.day())),
            Some('H') => out.push_str(&format!("{:02}", dt.hour())),
            Some('M') => out.push_str(&format!("{:02}", dt.minute())),
            Some('S') => out.push_str(&format!("{:02}", dt.second())),
            Some('L') => out.push_str(&format!("{:03}", dt.timestamp_subsec_millis())),
            Some('j') => out.push_str(&format!("{:03}", dt.ordinal())),
            Some('%') => out.push('%'),
            Some(other) => {
                return Err(agg_err(format!(
                    "$dateToString: unsupported format specifier %{}",
                    other
                )))
            }
            None => return Err(agg_err("$dateToString: format ends with %")),
        }
    }
    Ok(out)
}

impl Expression {
    pub fn parse(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) if s.starts_with('$') => {
                let path = s.trim_start_matches('$');
                if path.is_empty() {
                    return Err(agg_err("empty field path"));
                }
                Ok(Expression::Field(path.to_string()))
            }
            Value::Array(items) => Ok(Expression::Array(
                items.iter().map(Expression::parse).collect::<Result<_>>()?,
            )),
            Value::Object(_) if is_date(value) => Ok(Expression::Literal(value.clone())),
            Value::Object(obj) => {
                let operator = obj.keys().next().filter(|k| k.starts_with('$'));
                match operator {
                    Some(op) if obj.len() == 1 => {
                        let args = &obj[op.as_str()];
                        Self::parse_operator(op, args)
                    }
                    Some(op) => Err(agg_err(format!(
                        "expression with operator {} must have exactly one key",
                        op
                    ))),
                    None => {
                        let mut fields = Vec::with_capacity(obj.len());
                        for (key, v) in obj {
                            fields.push((key.clone(), Expression::parse(v)?));
                        }
                        Ok(Expression::Object(fields))
                    }
                }
            }
            other => Ok(Expression::Literal(other.clone())),
        }
    }

    fn parse_operator(op: &str, args: &Value) -> Result<Self> {
        if let Some(cmp) = CompareOp::from_name(op) {
            let (a, b) = exactly_two(op, args)?;
            return Ok(Expression::Compare(cmp, a, b));
        }

        match op {
            "$literal" => Ok(Expression::Literal(args.clone())),
            "$cond" => {
                let (condition, then, otherwise) = match args {
                    Value::Array(items) if items.len() == 3 => {
                        (&items[0], &items[1], &items[2])
                    }
                    Value::Object(obj) => match (obj.get("if"), obj.get("then"), obj.get("else")) {
                        (Some(i), Some(t), Some(e)) => (i, t, e),
                        _ => return Err(agg_err("$cond requires if, then and else")),
                    },
                    _ => return Err(agg_err("$cond requires 3 arguments")),
                };
                Ok(Expression::Cond {
                    condition: Box::new(Expression::parse(condition)?),
                    then: Box::new(Expression::parse(then)?),
                    otherwise: Box::new(Expression::parse(otherwise)?),
                })
            }
            "$add" => Ok(Expression::Add(parse_args(op, args)?)),
            "$multiply" => Ok(Expression::Multiply(parse_args(op, args)?)),
            "$subtract" => {
                let (a, b) = exactly_two(op, args)?;
                Ok(Expression::Subtract(a, b))
            }
            "$divide" => {
                let (a, b) = exactly_two(op, args)?;
                Ok(Expression::Divide(a, b))
            }
            "$size" => {
                let mut parsed = parse_args(op, args)?;
                match (parsed.pop(), parsed.is_empty()) {
                    (Some(inner), true) => Ok(Expression::Size(Box::new(inner))),
                    _ => Err(agg_err("$size takes exactly 1 argument")),
                }
            }
            "$dateToString" => {
                let format = args
                    .get("format")
                    .and_then(Value::as_str)
                    .unwrap_or("%Y-%m-%dT%H:%M:%S.%LZ")
                    .to_string();
                let date = args
                    .get("date")
                    .ok_or_else(|| agg_err("$dateToString requires a date"))?;
                Ok(Expression::DateToString {
                    format,
                    date: Box::new(Expression::parse(date)?),
                })
            }
            other => Err(agg_err(format!("Unknown expression operator: {}", other))),
        }
    }

    /// Evaluate against a document; `None` means the value is missing
    pub fn evaluate(&self, doc: &Value) -> Result<Option<Value>> {
        match self {
            Expression::Literal(v) => Ok(Some(v.clone())),
            Expression::Field(path) => Ok(get_nested_value(doc, path).cloned()),
            Expression::Object(fields) => {
                let mut map = Map::new();
                for (key, expr) in fields {
                    if let Some(v) = expr.evaluate(doc)? {
                        map.insert(key.clone(), v);
                    }
                }
                Ok(Some(Value::Object(map)))
            }
            Expression::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.evaluate(doc)?.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(out)))
            }
            Expression::Cond {
                condition,
                then,
                otherwise,
            } => {
                if is_truthy(condition.evaluate(doc)?.as_ref()) {
                    then.evaluate(doc)
                } else {
                    otherwise.evaluate(doc)
                }
            }
            Expression::Compare(op, a, b) => {
                let a = a.evaluate(doc)?.unwrap_or(Value::Null);
                let b = b.evaluate(doc)?.unwrap_or(Value::Null);
                Ok(Some(Value::Bool(op.apply(&a, &b))))
            }
            Expression::Add(items) => self.arithmetic("$add", items, doc, 0.0, |acc, x| acc + x),
            Expression::Multiply(items) => {
                self.arithmetic("$multiply", items, doc, 1.0, |acc, x| acc * x)
            }
            Expression::Subtract(a, b) => {
                let (Some(a), Some(b)) = (a.evaluate(doc)?, b.evaluate(doc)?) else {
                    return Ok(Some(Value::Null));
                };
                if a.is_null() || b.is_null() {
                    return Ok(Some(Value::Null));
                }
                if let (Some(d1), Some(d2)) = (parse_date(&a), parse_date(&b)) {
                    return Ok(Some(Value::from((d1 - d2).num_milliseconds())));
                }
                if let Some(d) = parse_date(&a) {
                    let (ms, _) = operand_number("$subtract", &b)?;
                    let shifted = d - chrono::Duration::milliseconds(ms as i64);
                    return Ok(Some(date_value(&shifted)));
                }
                let (x, x_int) = operand_number("$subtract", &a)?;
                let (y, y_int) = operand_number("$subtract", &b)?;
                Ok(Some(number_value(x - y, x_int && y_int)))
            }
            Expression::Divide(a, b) => {
                let (Some(a), Some(b)) = (a.evaluate(doc)?, b.evaluate(doc)?) else {
                    return Ok(Some(Value::Null));
                };
                if a.is_null() || b.is_null() {
                    return Ok(Some(Value::Null));
                }
                let (x, _) = operand_number("$divide", &a)?;
                let (y, _) = operand_number("$divide", &b)?;
                if y == 0.0 {
                    return Err(agg_err("can't $divide by zero"));
                }
                Ok(Some(Value::from(x / y)))
            }
            Expression::Size(inner) => match inner.evaluate(doc)? {
                Some(Value::Array(arr)) => Ok(Some(Value::from(arr.len() as i64))),
                other => Err(agg_err(format!(
                    "The argument to $size must be an array, got {}",
                    other.map(|v| v.to_string()).unwrap_or_else(|| "missing".to_string())
                ))),
            },
            Expression::DateToString { format, date } => match date.evaluate(doc)? {
                None | Some(Value::Null) => Ok(Some(Value::Null)),
                Some(v) => {
                    let dt = parse_date(&v).ok_or_else(|| {
                        agg_err(format!("$dateToString requires a date, got {}", v))
                    })?;
                    Ok(Some(Value::String(format_date(format, &dt)?)))
                }
            },
        }
    }

    fn arithmetic<F>(
        &self,
        op: &str,
        items: &[Expression],
        doc: &Value,
        init: f64,
        fold: F,
    ) -> Result<Option<Value>>
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut acc = init;
        let mut all_int = true;
        for item in items {
            match item.evaluate(doc)? {
                None | Some(Value::Null) => return Ok(Some(Value::Null)),
                Some(v) => {
                    let (x, is_int) = operand_number(op, &v)?;
                    acc = fold(acc, x);
                    all_int &= is_int;
                }
            }
        }
        Ok(Some(number_value(acc, all_int)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(expr: Value, doc: Value) -> Option<Value> {
        Expression::parse(&expr).unwrap().evaluate(&doc).unwrap()
    }

    #[test]
    fn test_field_and_literal() {
        let doc = json!({"course": {"category": "Programming"}});
        assert_eq!(eval(json!("$course.category"), doc.clone()), Some(json!("Programming")));
        assert_eq!(eval(json!("$missing"), doc.clone()), None);
        assert_eq!(eval(json!({"$literal": "$notAField"}), doc.clone()), Some(json!("$notAField")));
        assert_eq!(eval(json!(7), doc), Some(json!(7)));
    }

    #[test]
    fn test_cond_array_and_object_forms() {
        let expr = json!({"$cond": [{"$eq": ["$isCompleted", true]}, 1, 0]});
        assert_eq!(eval(expr.clone(), json!({"isCompleted": true})), Some(json!(1)));
        assert_eq!(eval(expr, json!({"isCompleted": false})), Some(json!(0)));

        let expr = json!({"$cond": {"if": "$flag", "then": "yes", "else": "no"}});
        assert_eq!(eval(expr, json!({})), Some(json!("no")));
    }

    #[test]
    fn test_completion_rate_arithmetic() {
        let expr = json!({"$multiply": [{"$divide": ["$completed", "$total"]}, 100]});
        assert_eq!(eval(expr, json!({"completed": 1, "total": 2})), Some(json!(50.0)));
    }

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(eval(json!({"$add": [1, 2, 3]}), json!({})), Some(json!(6)));
        assert_eq!(eval(json!({"$subtract": [10, 4]}), json!({})), Some(json!(6)));
        assert_eq!(eval(json!({"$add": [1, 0.5]}), json!({})), Some(json!(1.5)));
        assert_eq!(eval(json!({"$add": [1, "$missing"]}), json!({})), Some(Value::Null));
    }

    #[test]
    fn test_divide_by_zero_is_error() {
        let expr = Expression::parse(&json!({"$divide": [1, 0]})).unwrap();
        assert!(expr.evaluate(&json!({})).is_err());
    }

    #[test]
    fn test_size() {
        let doc = json!({"uniqueStudents": ["stu001", "stu009"]});
        assert_eq!(eval(json!({"$size": "$uniqueStudents"}), doc), Some(json!(2)));
        let expr = Expression::parse(&json!({"$size": "$x"})).unwrap();
        assert!(expr.evaluate(&json!({"x": 3})).is_err());
    }

    #[test]
    fn test_date_to_string() {
        let doc = json!({"enrollDate": {"$date": "2025-02-07T00:00:00Z"}});
        let expr = json!({"$dateToString": {"format": "%Y-%m", "date": "$enrollDate"}});
        assert_eq!(eval(expr, doc), Some(json!("2025-02")));
        assert!(Expression::parse(&json!({"$dateToString": {"format": "%Q", "date": "$d"}}))
            .unwrap()
            .evaluate(&json!({"d": {"$date": "2025-02-07T00:00:00Z"}}))
            .is_err());
    }

    #[test]
    fn test_date_subtraction_in_millis() {
        let doc = json!({
            "a": {"$date": "2025-01-02T00:00:00Z"},
            "b": {"$date": "2025-01-01T00:00:00Z"}
        });
        assert_eq!(eval(json!({"$subtract": ["$a", "$b"]}), doc), Some(json!(86_400_000)));
    }

    #[test]
    fn test_object_expression_drops_missing() {
        let doc = json!({"a": 1});
        assert_eq!(eval(json!({"x": "$a", "y": "$b"}), doc), Some(json!({"x": 1})));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expression::parse(&json!({"$frobnicate": 1})).is_err());
        assert!(Expression::parse(&json!({"$eq": [1]})).is_err());
        assert!(Expression::parse(&json!({"$cond": [true, 1]})).is_err());
        assert!(Expression::parse(&json!({"$add": 1, "x": 2})).is_err());
    }
}
