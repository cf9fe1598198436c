// src/storage/traits.rs
//! Storage abstraction
//!
//! ```text
//! Storage trait (unified interface)
//!   ├── FileStorage (single snapshot file)
//!   └── MemoryStorage (tests, no persistence)
//! ```

use serde_json::Value;

use crate::document::DocumentId;
use crate::error::Result;
use crate::storage::CollectionMeta;

/// Core storage abstraction
///
/// Documents are addressed by collection and `_id`; every backend keeps them
/// in insertion order so scans are deterministic.
pub trait Storage: Send + Sync {
    // ========================================================================
    // DOCUMENT OPERATIONS
    // ========================================================================

    /// Insert or replace a document; a replaced document keeps its position
    fn write_document(&mut self, collection: &str, id: &DocumentId, doc: &Value) -> Result<u64>;

    fn read_document(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>>;

    /// Returns false when no document had this id
    fn delete_document(&mut self, collection: &str, id: &DocumentId) -> Result<bool>;

    /// All documents in insertion order
    fn scan_documents(&self, collection: &str) -> Result<Vec<Value>>;

    /// Insertion position of a document, used to order index candidates
    fn document_position(&self, collection: &str, id: &DocumentId) -> Option<u64>;

    fn document_count(&self, collection: &str) -> Result<u64>;

    // ========================================================================
    // COLLECTION MANAGEMENT
    // ========================================================================

    fn create_collection(&mut self, meta: CollectionMeta) -> Result<()>;

    fn drop_collection(&mut self, name: &str) -> Result<()>;

    fn list_collections(&self) -> Vec<String>;

    // ========================================================================
    // METADATA ACCESS
    // ========================================================================

    fn get_collection_meta(&self, name: &str) -> Option<&CollectionMeta>;

    fn get_collection_meta_mut(&mut self, name: &str) -> Option<&mut CollectionMeta>;

    // ========================================================================
    // PERSISTENCE & FLUSHING
    // ========================================================================

    /// Flush any pending writes to persistent storage
    ///
    /// For MemoryStorage this is a no-op.
    fn flush(&mut self) -> Result<()>;
}
