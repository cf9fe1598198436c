// storage/memory_storage.rs
//! Pure in-memory storage for tests
//!
//! Same catalog as [`FileStorage`](super::FileStorage) without the snapshot
//! file; data is lost when dropped.

use serde_json::Value;

use crate::document::DocumentId;
use crate::error::Result;
use crate::storage::{Catalog, CollectionMeta, Storage};

/// In-memory storage backend
///
/// ```ignore
/// use eduhub_core::DatabaseCore;
///
/// let db = DatabaseCore::in_memory();
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    catalog: Catalog,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn write_document(&mut self, collection: &str, id: &DocumentId, doc: &Value) -> Result<u64> {
        self.catalog.write_document(collection, id, doc.clone())
    }

    fn read_document(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>> {
        self.catalog.read_document(collection, id)
    }

    fn delete_document(&mut self, collection: &str, id: &DocumentId) -> Result<bool> {
        self.catalog.delete_document(collection, id)
    }

    fn scan_documents(&self, collection: &str) -> Result<Vec<Value>> {
        self.catalog.scan(collection)
    }

    fn document_position(&self, collection: &str, id: &DocumentId) -> Option<u64> {
        self.catalog.position(collection, id)
    }

    fn document_count(&self, collection: &str) -> Result<u64> {
        self.catalog.count(collection)
    }

    fn create_collection(&mut self, meta: CollectionMeta) -> Result<()> {
        self.catalog.create_collection(meta)
    }

    fn drop_collection(&mut self, name: &str) -> Result<()> {
        self.catalog.drop_collection(name)
    }

    fn list_collections(&self) -> Vec<String> {
        self.catalog.names()
    }

    fn get_collection_meta(&self, name: &str) -> Option<&CollectionMeta> {
        self.catalog.meta(name)
    }

    fn get_collection_meta_mut(&mut self, name: &str) -> Option<&mut CollectionMeta> {
        self.catalog.meta_mut(name)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_storage_basic_operations() {
        let mut storage = MemoryStorage::new();
        storage.create_collection(CollectionMeta::new("users")).unwrap();
        assert_eq!(storage.list_collections(), vec!["users".to_string()]);

        let id = DocumentId::Int(1);
        storage
            .write_document("users", &id, &json!({"_id": 1, "userId": "stu001"}))
            .unwrap();
        assert_eq!(
            storage.read_document("users", &id).unwrap(),
            Some(json!({"_id": 1, "userId": "stu001"}))
        );
        assert_eq!(storage.document_position("users", &id), Some(0));
        assert_eq!(storage.document_count("users").unwrap(), 1);

        storage.drop_collection("users").unwrap();
        assert!(storage.list_collections().is_empty());
        assert!(storage.flush().is_ok());
    }
}
