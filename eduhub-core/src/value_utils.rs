//! Value utility functions shared across modules
//!
//! Nested field access, value comparison, and the `{"$date": ...}` date
//! representation used by documents.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::error::{EduHubError, Result};

/// Key of the relaxed extended-JSON date wrapper
pub const DATE_KEY: &str = "$date";

/// Get nested value from JSON with dot notation support
///
/// Supports:
/// - Simple fields: "name"
/// - Nested objects: "profile.bio"
/// - Array indexing: "skills.0"
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use eduhub_core::value_utils::get_nested_value;
///
/// let doc = json!({"profile": {"bio": "hi"}});
/// assert_eq!(get_nested_value(&doc, "profile.bio"), Some(&json!("hi")));
/// ```
pub fn get_nested_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if !path.contains('.') {
        return doc.get(path);
    }

    let mut value = doc;
    for part in path.split('.') {
        match value {
            Value::Object(map) => value = map.get(part)?,
            Value::Array(arr) => {
                let index = part.parse::<usize>().ok()?;
                value = arr.get(index)?;
            }
            _ => return None,
        }
    }
    Some(value)
}

/// Set a value at a nested path, creating intermediate objects as needed
///
/// Numeric parts step into arrays, padding with nulls past the end. A scalar
/// sitting in the middle of the path is an error.
///
/// ```
/// use serde_json::json;
/// use eduhub_core::value_utils::set_nested_value;
///
/// let mut doc = json!({"name": "Alice", "tags": ["python"]});
/// set_nested_value(&mut doc, "profile.bio", json!("Updated bio")).unwrap();
/// set_nested_value(&mut doc, "tags.0", json!("py")).unwrap();
/// assert_eq!(doc["profile"]["bio"], "Updated bio");
/// assert_eq!(doc["tags"], json!(["py"]));
/// ```
pub fn set_nested_value(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    let mut current = doc;
    let mut parent = "";
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        let last = parts.peek().is_none();
        let index = match &*current {
            Value::Object(_) => None,
            array @ Value::Array(_) => match part.parse::<usize>() {
                Ok(index) => Some(index),
                Err(_) => return Err(cannot_create(part, parent, array)),
            },
            other => return Err(cannot_create(part, parent, other)),
        };

        current = match (current, index) {
            (Value::Array(items), Some(index)) => {
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                    if !last {
                        items[index] = Value::Object(Map::new());
                    }
                }
                if last {
                    items[index] = value;
                    return Ok(());
                }
                &mut items[index]
            }
            (Value::Object(map), _) => {
                if last {
                    map.insert(part.to_string(), value);
                    return Ok(());
                }
                map.entry(part.to_string())
                    .or_insert_with(|| Value::Object(Map::new()))
            }
            (other, _) => return Err(cannot_create(part, parent, other)),
        };
        parent = part;
    }
    Ok(())
}

fn cannot_create(field: &str, parent: &str, element: &Value) -> EduHubError {
    EduHubError::InvalidUpdate(format!(
        "Cannot create field '{}' in element {{{}: {}}}",
        field, parent, element
    ))
}

/// Remove the value at a nested path, keeping the order of the remaining keys
///
/// Returns true when something was removed.
pub fn remove_nested_value(doc: &mut Value, path: &str) -> bool {
    let (parent, last) = match path.rsplit_once('.') {
        Some((parent_path, last)) => match get_nested_value_mut(doc, parent_path) {
            Some(parent) => (parent, last),
            None => return false,
        },
        None => (doc, path),
    };

    let Value::Object(map) = parent else {
        return false;
    };
    if !map.contains_key(last) {
        return false;
    }

    let kept: Map<String, Value> = std::mem::take(map)
        .into_iter()
        .filter(|(key, _)| key != last)
        .collect();
    *map = kept;
    true
}

fn get_nested_value_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut value = doc;
    for part in path.split('.') {
        value = match value {
            Value::Object(map) => map.get_mut(part)?,
            _ => return None,
        };
    }
    Some(value)
}

// ============================================================================
// DATES
// ============================================================================

/// Wrap an instant in the `{"$date": "<RFC 3339>"}` document form
pub fn date_value(dt: &DateTime<Utc>) -> Value {
    let mut map = Map::new();
    map.insert(
        DATE_KEY.to_string(),
        Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    Value::Object(map)
}

/// Parse a `{"$date": ...}` value back into an instant
///
/// Accepts RFC 3339 strings and integer milliseconds since the epoch.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    match map.get(DATE_KEY)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        _ => None,
    }
}

pub fn is_date(value: &Value) -> bool {
    parse_date(value).is_some()
}

/// BSON-style type name of a value, as used in validation messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) if is_date(value) => "date",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// COMPARISON
// ============================================================================

/// Compare two JSON values
///
/// Returns `Some(Ordering)` for comparable types (numbers, strings, booleans,
/// dates), `None` for incompatible types (e.g., comparing string to number).
///
/// ```
/// use serde_json::json;
/// use std::cmp::Ordering;
/// use eduhub_core::value_utils::compare_values;
///
/// assert_eq!(compare_values(&json!(10), &json!(5.5)), Some(Ordering::Greater));
/// assert_eq!(compare_values(&json!("a"), &json!("b")), Some(Ordering::Less));
/// assert_eq!(compare_values(&json!("a"), &json!(1)), None);
/// ```
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            if let (Some(i1), Some(i2)) = (n1.as_i64(), n2.as_i64()) {
                return Some(i1.cmp(&i2));
            }
            n1.as_f64()?.partial_cmp(&n2.as_f64()?)
        }
        (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
        (Value::Bool(b1), Value::Bool(b2)) => Some(b1.cmp(b2)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Object(_), Value::Object(_)) => match (parse_date(a), parse_date(b)) {
            (Some(d1), Some(d2)) => Some(d1.cmp(&d2)),
            _ => None,
        },
        _ => None,
    }
}

/// Equality with numeric widening and date awareness (`1 == 1.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        (Value::Object(_), Value::Object(_)) => match (parse_date(a), parse_date(b)) {
            (Some(d1), Some(d2)) => d1 == d2,
            _ => a == b,
        },
        _ => a == b,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) if is_date(value) => 6,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total ordering used by sorts: values of different types order by type
/// (null < numbers < strings < objects < arrays < booleans < dates)
pub fn compare_values_total(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    if let Some(ordering) = compare_values(a, b) {
        return ordering;
    }
    canonical_json_string(a).cmp(&canonical_json_string(b))
}

/// Compare two optional JSON values, with missing values first
pub fn compare_values_with_none(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(av), Some(bv)) => compare_values_total(av, bv),
    }
}

/// Canonical string of a JSON value with object keys sorted
///
/// Used for `$addToSet` deduplication and as a grouping key.
///
/// ```
/// use serde_json::json;
/// use eduhub_core::value_utils::canonical_json_string;
///
/// let v1 = json!({"a": 1, "b": 2});
/// let v2 = json!({"b": 2, "a": 1});
/// assert_eq!(canonical_json_string(&v1), canonical_json_string(&v2));
/// ```
pub fn canonical_json_string(value: &Value) -> String {
    // one instant, one key, however the date was spelled
    if let Some(dt) = parse_date(value) {
        return format!(
            "{{\"{}\":\"{}\"}}",
            DATE_KEY,
            dt.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));

            let inner: String = pairs
                .iter()
                .map(|(k, v)| format!("\"{}\":{}", k, canonical_json_string(v)))
                .collect::<Vec<_>>()
                .join(",");

            format!("{{{}}}", inner)
        }
        Value::Array(arr) => {
            let inner: String = arr
                .iter()
                .map(canonical_json_string)
                .collect::<Vec<_>>()
                .join(",");
            format!("[{}]", inner)
        }
        // 1 and 1.0 must land in the same group
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        _ => value.to_string(),
    }
}

/// Numeric view of a value, if it is a number
pub fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}
