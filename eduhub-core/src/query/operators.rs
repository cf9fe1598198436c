// eduhub-core/src/query/operators.rs
//! Query operator trait and implementations
//!
//! Each filter operator is a separate type implementing [`OperatorMatcher`];
//! [`matches_filter`] dispatches through a name → operator registry.
//!
//! ```text
//! OperatorMatcher trait
//!     ↓
//! ┌────────────────┬────────────────┬────────────────┐
//! │ Comparison     │ Logical        │ Element        │
//! │ ($eq, $gt...)  │ ($and, $or...) │ ($exists...)   │
//! └────────────────┴────────────────┴────────────────┘
//! ```

use crate::error::{EduHubError, Result};
use crate::value_utils::{compare_values, get_nested_value, values_equal};
use lazy_static::lazy_static;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::num::NonZeroUsize;

// ============================================================================
// REGEX SUPPORT
// ============================================================================

const REGEX_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

lazy_static! {
    /// Compiled regex cache, keyed by "pattern:options"
    static ref REGEX_CACHE: Mutex<LruCache<String, Regex>> =
        Mutex::new(LruCache::new(REGEX_CACHE_CAPACITY));
}

/// Prefix the pattern with inline flags for the MongoDB options (i, m, s, x)
fn build_regex_pattern(pattern: &str, options: &str) -> String {
    let valid_options: String = options
        .chars()
        .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
        .collect();

    if valid_options.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", valid_options, pattern)
    }
}

fn get_or_compile_regex(pattern: &str, options: &str) -> Result<Regex> {
    let cache_key = format!("{}:{}", pattern, options);

    if let Some(regex) = REGEX_CACHE.lock().get(&cache_key) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&build_regex_pattern(pattern, options)).map_err(|e| {
        EduHubError::InvalidQuery(format!("Invalid regex pattern '{}': {}", pattern, e))
    })?;

    REGEX_CACHE.lock().put(cache_key, regex.clone());
    Ok(regex)
}

/// Match a string, or any string element of an array, against a pattern
fn regex_matches(doc_value: Option<&Value>, pattern: &str, options: &str) -> Result<bool> {
    let regex = get_or_compile_regex(pattern, options)?;
    Ok(match doc_value {
        Some(Value::String(s)) => regex.is_match(s),
        Some(Value::Array(arr)) => arr
            .iter()
            .any(|v| v.as_str().map(|s| regex.is_match(s)).unwrap_or(false)),
        _ => false,
    })
}

// ============================================================================
// TRAIT DEFINITION
// ============================================================================

/// A single query operator (`$eq`, `$gt`, `$and`, ...)
///
/// ```rust
/// use serde_json::json;
/// use eduhub_core::query::operators::{EqOperator, OperatorMatcher};
///
/// let doc = json!({"role": "student"});
/// assert!(EqOperator.matches(doc.get("role"), &json!("student"), &doc).unwrap());
/// ```
pub trait OperatorMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// `doc_value` is the field's value (None when absent); `document` is the
    /// whole document, used by the logical operators that recurse.
    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, document: &Value)
        -> Result<bool>;
}

// ============================================================================
// COMPARISON OPERATORS
// ============================================================================

/// `$eq`; an array field matches when any element is equal
pub struct EqOperator;

impl OperatorMatcher for EqOperator {
    fn name(&self) -> &'static str {
        "$eq"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, _document: &Value) -> Result<bool> {
        Ok(match doc_value {
            None => filter_value.is_null(),
            Some(v) => {
                values_equal(v, filter_value)
                    || matches!(v, Value::Array(arr) if arr.iter().any(|e| values_equal(e, filter_value)))
            }
        })
    }
}

/// `$ne`; true when the field is missing
pub struct NeOperator;

impl OperatorMatcher for NeOperator {
    fn name(&self) -> &'static str {
        "$ne"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, document: &Value) -> Result<bool> {
        Ok(!EqOperator.matches(doc_value, filter_value, document)?)
    }
}

pub struct GtOperator;

impl OperatorMatcher for GtOperator {
    fn name(&self) -> &'static str {
        "$gt"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, _document: &Value) -> Result<bool> {
        Ok(compare_with_predicate(doc_value, filter_value, |ord| ord == Ordering::Greater))
    }
}

pub struct GteOperator;

impl OperatorMatcher for GteOperator {
    fn name(&self) -> &'static str {
        "$gte"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, _document: &Value) -> Result<bool> {
        Ok(compare_with_predicate(doc_value, filter_value, |ord| ord != Ordering::Less))
    }
}

pub struct LtOperator;

impl OperatorMatcher for LtOperator {
    fn name(&self) -> &'static str {
        "$lt"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, _document: &Value) -> Result<bool> {
        Ok(compare_with_predicate(doc_value, filter_value, |ord| ord == Ordering::Less))
    }
}

pub struct LteOperator;

impl OperatorMatcher for LteOperator {
    fn name(&self) -> &'static str {
        "$lte"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, _document: &Value) -> Result<bool> {
        Ok(compare_with_predicate(doc_value, filter_value, |ord| ord != Ordering::Greater))
    }
}

// ============================================================================
// ARRAY OPERATORS
// ============================================================================

/// `$in`: matches any of the listed values (element-wise for array fields)
pub struct InOperator;

impl OperatorMatcher for InOperator {
    fn name(&self) -> &'static str {
        "$in"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, document: &Value) -> Result<bool> {
        let Value::Array(candidates) = filter_value else {
            return Err(EduHubError::InvalidQuery(
                "$in operator requires an array".to_string(),
            ));
        };
        for candidate in candidates {
            if EqOperator.matches(doc_value, candidate, document)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// `$nin`: the negation of `$in`
pub struct NinOperator;

impl OperatorMatcher for NinOperator {
    fn name(&self) -> &'static str {
        "$nin"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, document: &Value) -> Result<bool> {
        if !filter_value.is_array() {
            return Err(EduHubError::InvalidQuery(
                "$nin operator requires an array".to_string(),
            ));
        }
        Ok(!InOperator.matches(doc_value, filter_value, document)?)
    }
}

// ============================================================================
// ELEMENT OPERATORS
// ============================================================================

pub struct ExistsOperator;

impl OperatorMatcher for ExistsOperator {
    fn name(&self) -> &'static str {
        "$exists"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, _document: &Value) -> Result<bool> {
        match filter_value {
            Value::Bool(should_exist) => Ok(doc_value.is_some() == *should_exist),
            Value::Number(n) => Ok(doc_value.is_some() == (n.as_f64() != Some(0.0))),
            _ => Err(EduHubError::InvalidQuery(
                "$exists operator requires a boolean".to_string(),
            )),
        }
    }
}

/// `$regex` without options; `{$regex, $options}` pairs are handled in [`matches_condition`]
pub struct RegexOperator;

impl OperatorMatcher for RegexOperator {
    fn name(&self) -> &'static str {
        "$regex"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, _document: &Value) -> Result<bool> {
        let pattern = filter_value.as_str().ok_or_else(|| {
            EduHubError::InvalidQuery("$regex operator requires a string pattern".to_string())
        })?;
        regex_matches(doc_value, pattern, "")
    }
}

// ============================================================================
// LOGICAL OPERATORS
// ============================================================================

fn sub_filters<'a>(op: &str, filter_value: &'a Value) -> Result<&'a Vec<Value>> {
    match filter_value {
        Value::Array(conditions) if !conditions.is_empty() => Ok(conditions),
        _ => Err(EduHubError::InvalidQuery(format!(
            "{} operator requires a non-empty array",
            op
        ))),
    }
}

pub struct AndOperator;

impl OperatorMatcher for AndOperator {
    fn name(&self) -> &'static str {
        "$and"
    }

    fn matches(&self, _doc_value: Option<&Value>, filter_value: &Value, document: &Value) -> Result<bool> {
        for condition in sub_filters("$and", filter_value)? {
            if !matches_filter(document, condition)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub struct OrOperator;

impl OperatorMatcher for OrOperator {
    fn name(&self) -> &'static str {
        "$or"
    }

    fn matches(&self, _doc_value: Option<&Value>, filter_value: &Value, document: &Value) -> Result<bool> {
        for condition in sub_filters("$or", filter_value)? {
            if matches_filter(document, condition)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub struct NorOperator;

impl OperatorMatcher for NorOperator {
    fn name(&self) -> &'static str {
        "$nor"
    }

    fn matches(&self, _doc_value: Option<&Value>, filter_value: &Value, document: &Value) -> Result<bool> {
        Ok(!OrOperator.matches(None, filter_value, document)?)
    }
}

/// `$not`: `{ field: { $not: { $gt: 5 } } }`
pub struct NotOperator;

impl OperatorMatcher for NotOperator {
    fn name(&self) -> &'static str {
        "$not"
    }

    fn matches(&self, doc_value: Option<&Value>, filter_value: &Value, document: &Value) -> Result<bool> {
        match filter_value {
            Value::Object(_) => Ok(!matches_condition(doc_value, filter_value, document)?),
            _ => Err(EduHubError::InvalidQuery(
                "$not operator requires an operator expression".to_string(),
            )),
        }
    }
}

// ============================================================================
// OPERATOR REGISTRY
// ============================================================================

lazy_static! {
    /// Name → operator lookup, built once and immutable afterwards
    pub static ref OPERATOR_REGISTRY: HashMap<&'static str, Box<dyn OperatorMatcher>> = {
        let operators: Vec<Box<dyn OperatorMatcher>> = vec![
            Box::new(EqOperator),
            Box::new(NeOperator),
            Box::new(GtOperator),
            Box::new(GteOperator),
            Box::new(LtOperator),
            Box::new(LteOperator),
            Box::new(InOperator),
            Box::new(NinOperator),
            Box::new(ExistsOperator),
            Box::new(RegexOperator),
            Box::new(AndOperator),
            Box::new(OrOperator),
            Box::new(NorOperator),
            Box::new(NotOperator),
        ];
        operators.into_iter().map(|op| (op.name(), op)).collect()
    };
}

fn lookup_operator(name: &str) -> Result<&'static dyn OperatorMatcher> {
    OPERATOR_REGISTRY
        .get(name)
        .map(|op| op.as_ref())
        .ok_or_else(|| EduHubError::InvalidQuery(format!("Unknown operator: {}", name)))
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Shared body of `$gt`/`$gte`/`$lt`/`$lte`, with array element matching
fn compare_with_predicate<F>(doc_value: Option<&Value>, filter_value: &Value, predicate: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    let Some(v) = doc_value else {
        return false;
    };
    if compare_values(v, filter_value).map(&predicate).unwrap_or(false) {
        return true;
    }
    match v {
        Value::Array(arr) => arr
            .iter()
            .any(|elem| compare_values(elem, filter_value).map(&predicate).unwrap_or(false)),
        _ => false,
    }
}

/// True when `value` is an operator object such as `{"$gt": 5}`
///
/// Date literals (`{"$date": ...}`) are values, not operator objects.
pub fn is_operator_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            !map.is_empty()
                && map.keys().all(|k| k.starts_with('$'))
                && !crate::value_utils::is_date(value)
        }
        _ => false,
    }
}

/// Evaluate one field's condition: an operator object or an implicit `$eq`
fn matches_condition(doc_value: Option<&Value>, condition: &Value, document: &Value) -> Result<bool> {
    if !is_operator_object(condition) {
        return EqOperator.matches(doc_value, condition, document);
    }

    let Value::Object(ops) = condition else {
        return Ok(false);
    };

    for (op_name, op_value) in ops {
        match op_name.as_str() {
            "$options" => continue,
            "$regex" => {
                let pattern = op_value.as_str().ok_or_else(|| {
                    EduHubError::InvalidQuery("$regex requires a string pattern".to_string())
                })?;
                let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                if !regex_matches(doc_value, pattern, options)? {
                    return Ok(false);
                }
            }
            name => {
                if !lookup_operator(name)?.matches(doc_value, op_value, document)? {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

/// Main entry point for filter matching
///
/// - `Ok(true)` if the document matches the filter
/// - `Err(InvalidQuery)` if the filter is malformed
pub fn matches_filter(document: &Value, filter: &Value) -> Result<bool> {
    let filter_obj = filter
        .as_object()
        .ok_or_else(|| EduHubError::InvalidQuery("Filter must be an object".to_string()))?;

    for (key, value) in filter_obj {
        if key.starts_with('$') {
            if key == "$text" {
                return Err(EduHubError::InvalidQuery(
                    "$text is only supported as a top-level collection query".to_string(),
                ));
            }
            if !lookup_operator(key)?.matches(None, value, document)? {
                return Ok(false);
            }
        } else if !matches_condition(get_nested_value(document, key), value, document)? {
            return Ok(false);
        }
    }

    Ok(true)
}
