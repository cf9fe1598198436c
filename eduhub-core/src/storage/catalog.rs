// storage/catalog.rs
// In-memory catalog shared by every storage backend

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CollectionMeta;
use crate::document::DocumentId;
use crate::error::{EduHubError, Result};

/// Documents of one collection, kept in insertion order
#[derive(Debug, Clone)]
struct CollectionData {
    meta: CollectionMeta,
    /// Insertion sequence -> document
    documents: BTreeMap<u64, Value>,
    /// Document id -> insertion sequence
    positions: AHashMap<DocumentId, u64>,
    next_seq: u64,
}

impl CollectionData {
    fn new(meta: CollectionMeta) -> Self {
        CollectionData {
            meta,
            documents: BTreeMap::new(),
            positions: AHashMap::new(),
            next_seq: 0,
        }
    }
}

/// Serialized form of the whole catalog
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub collections: Vec<CollectionSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub meta: CollectionMeta,
    pub documents: Vec<Value>,
}

/// Collection name -> metadata and documents
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    collections: BTreeMap<String, CollectionData>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self, collection: &str) -> Result<&CollectionData> {
        self.collections
            .get(collection)
            .ok_or_else(|| EduHubError::CollectionNotFound(collection.to_string()))
    }

    fn data_mut(&mut self, collection: &str) -> Result<&mut CollectionData> {
        self.collections
            .get_mut(collection)
            .ok_or_else(|| EduHubError::CollectionNotFound(collection.to_string()))
    }

    pub fn create_collection(&mut self, meta: CollectionMeta) -> Result<()> {
        if self.collections.contains_key(&meta.name) {
            return Err(EduHubError::CollectionExists(meta.name));
        }
        self.collections
            .insert(meta.name.clone(), CollectionData::new(meta));
        Ok(())
    }

    pub fn drop_collection(&mut self, name: &str) -> Result<()> {
        self.collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EduHubError::CollectionNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    pub fn meta(&self, name: &str) -> Option<&CollectionMeta> {
        self.collections.get(name).map(|d| &d.meta)
    }

    pub fn meta_mut(&mut self, name: &str) -> Option<&mut CollectionMeta> {
        self.collections.get_mut(name).map(|d| &mut d.meta)
    }

    /// Insert a new document or replace an existing one in place
    ///
    /// Returns the insertion sequence of the document.
    pub fn write_document(&mut self, collection: &str, id: &DocumentId, doc: Value) -> Result<u64> {
        let data = self.data_mut(collection)?;
        let seq = match data.positions.get(id) {
            Some(&seq) => seq,
            None => {
                let seq = data.next_seq;
                data.next_seq += 1;
                data.positions.insert(id.clone(), seq);
                seq
            }
        };
        data.documents.insert(seq, doc);

        if let DocumentId::Int(n) = id {
            if *n > 0 && *n as u64 > data.meta.last_id {
                data.meta.last_id = *n as u64;
            }
        }
        Ok(seq)
    }

    pub fn read_document(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>> {
        let data = self.data(collection)?;
        Ok(data
            .positions
            .get(id)
            .and_then(|seq| data.documents.get(seq))
            .cloned())
    }

    pub fn delete_document(&mut self, collection: &str, id: &DocumentId) -> Result<bool> {
        let data = self.data_mut(collection)?;
        match data.positions.remove(id) {
            Some(seq) => {
                data.documents.remove(&seq);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn scan(&self, collection: &str) -> Result<Vec<Value>> {
        Ok(self.data(collection)?.documents.values().cloned().collect())
    }

    pub fn position(&self, collection: &str, id: &DocumentId) -> Option<u64> {
        self.collections
            .get(collection)
            .and_then(|d| d.positions.get(id).copied())
    }

    pub fn count(&self, collection: &str) -> Result<u64> {
        Ok(self.data(collection)?.documents.len() as u64)
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            collections: self
                .collections
                .values()
                .map(|d| CollectionSnapshot {
                    meta: d.meta.clone(),
                    documents: d.documents.values().cloned().collect(),
                })
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let mut catalog = Catalog::new();
        for collection in snapshot.collections {
            let name = collection.meta.name.clone();
            catalog.create_collection(collection.meta)?;
            for doc in collection.documents {
                let id = doc
                    .get("_id")
                    .ok_or_else(|| {
                        EduHubError::Corruption(format!(
                            "document without _id in collection '{}'",
                            name
                        ))
                    })
                    .and_then(DocumentId::from_value)?;
                catalog.write_document(&name, &id, doc)?;
            }
        }
        Ok(catalog)
    }
}
