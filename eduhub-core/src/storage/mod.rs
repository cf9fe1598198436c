// storage/mod.rs
// Storage backends and the collection catalog they share

mod catalog;
pub mod file_storage;
pub mod memory_storage;
mod traits;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::IndexSpec;

pub(crate) use catalog::{Catalog, Snapshot};
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use traits::Storage;

/// Per-collection metadata persisted with the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMeta {
    pub name: String,
    /// Validator document as given at creation time (`{"$jsonSchema": ...}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<Value>,
    /// Highest auto-assigned integer `_id`
    #[serde(default)]
    pub last_id: u64,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl CollectionMeta {
    pub fn new(name: impl Into<String>) -> Self {
        CollectionMeta {
            name: name.into(),
            validator: None,
            last_id: 0,
            indexes: Vec::new(),
        }
    }

    pub fn with_validator(mut self, validator: Option<Value>) -> Self {
        self.validator = validator;
        self
    }
}
