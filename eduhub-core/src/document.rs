// eduhub-core/src/document.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{EduHubError, Result};

/// Document identifier
///
/// Untagged so it appears as a plain value inside documents: `{"_id": 2}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum DocumentId {
    Int(i64),
    String(String),
}

impl DocumentId {
    /// Next auto-increment id
    pub fn new_auto(last_id: u64) -> Self {
        DocumentId::Int((last_id + 1) as i64)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(DocumentId::Int).ok_or_else(|| {
                EduHubError::InvalidQuery(format!("_id must be an integer or string, got {}", n))
            }),
            Value::String(s) => Ok(DocumentId::String(s.clone())),
            other => Err(EduHubError::InvalidQuery(format!(
                "_id must be an integer or string, got {}",
                other
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DocumentId::Int(i) => Value::from(*i),
            DocumentId::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Int(i) => write!(f, "{}", i),
            DocumentId::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// A stored document: its id plus the full JSON body (which carries `_id` as the first key)
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub body: Value,
}

impl Document {
    /// Build a document from caller-supplied fields, assigning `id` when `_id` is absent
    ///
    /// `_id` is always moved to the front of the field list.
    pub fn prepare(fields: Value, auto_id: impl FnOnce() -> DocumentId) -> Result<Self> {
        let map = match fields {
            Value::Object(map) => map,
            other => {
                return Err(EduHubError::InvalidQuery(format!(
                    "Document must be a JSON object, got {}",
                    other
                )))
            }
        };

        let id = match map.get("_id") {
            Some(value) => DocumentId::from_value(value)?,
            None => auto_id(),
        };

        let mut body = Map::with_capacity(map.len() + 1);
        body.insert("_id".to_string(), id.to_value());
        for (key, value) in map {
            if key != "_id" {
                body.insert(key, value);
            }
        }

        Ok(Document {
            id,
            body: Value::Object(body),
        })
    }

    /// Wrap an already-stored body
    pub fn from_stored(body: Value) -> Result<Self> {
        let id = body
            .get("_id")
            .ok_or_else(|| EduHubError::Corruption("stored document has no _id".to_string()))
            .and_then(DocumentId::from_value)?;
        Ok(Document { id, body })
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        crate::value_utils::get_nested_value(&self.body, path)
    }

    pub fn into_value(self) -> Value {
        self.body
    }
}
