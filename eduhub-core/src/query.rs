// eduhub-core/src/query.rs
//! Query module for the MongoDB-like filter language
//!
//! Field matching is done by the operator registry in [`operators`]. The
//! top-level `$text` clause is not an operator: it needs a text index, so the
//! collection pulls it out with [`split_text_search`] before matching.

pub mod operators;

use serde_json::{Map, Value};

use crate::error::{EduHubError, Result};

pub use operators::matches_filter;

/// A parsed `{"$text": {"$search": "..."}}` clause
#[derive(Debug, Clone, PartialEq)]
pub struct TextSearch {
    pub search: String,
    pub terms: Vec<String>,
}

impl TextSearch {
    pub fn from_json(spec: &Value) -> Result<Self> {
        let search = spec
            .get("$search")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                EduHubError::InvalidQuery("$text requires a string $search".to_string())
            })?;
        Ok(TextSearch {
            search: search.to_string(),
            terms: tokenize(search),
        })
    }
}

/// Split a text value into lowercase alphanumeric terms
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Separate a top-level `$text` clause from the rest of the filter
pub fn split_text_search(filter: &Value) -> Result<(Option<TextSearch>, Value)> {
    let Some(obj) = filter.as_object() else {
        return Err(EduHubError::InvalidQuery(
            "Filter must be an object".to_string(),
        ));
    };

    let Some(text_spec) = obj.get("$text") else {
        return Ok((None, filter.clone()));
    };

    let rest: Map<String, Value> = obj
        .iter()
        .filter(|(key, _)| key.as_str() != "$text")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok((Some(TextSearch::from_json(text_spec)?), Value::Object(rest)))
}

/// True for `{}` (matches everything)
pub fn is_match_all(filter: &Value) -> bool {
    filter.as_object().map(|o| o.is_empty()).unwrap_or(false)
}
