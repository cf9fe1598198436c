// eduhub-core/src/database.rs
// Database handle: collection registry over one storage backend

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::collection_core::{CollectionCore, CompiledSchema};
use crate::error::{EduHubError, Result};
use crate::storage::{CollectionMeta, FileStorage, MemoryStorage, Storage};

/// Options for [`DatabaseCore::create_collection`]
#[derive(Debug, Clone, Default)]
pub struct CreateCollectionOptions {
    /// `{"$jsonSchema": {...}}` applied to every insert and update
    pub validator: Option<Value>,
}

impl CreateCollectionOptions {
    pub fn with_validator(validator: Value) -> Self {
        CreateCollectionOptions {
            validator: Some(validator),
        }
    }
}

/// Embedded database
///
/// Generic over Storage backend:
/// - `DatabaseCore<FileStorage>` - single snapshot file (default)
/// - `DatabaseCore<MemoryStorage>` - in-memory storage for tests
pub struct DatabaseCore<S: Storage = FileStorage> {
    storage: Arc<RwLock<S>>,
    path: Option<PathBuf>,
    /// Open collection handles; clones share indexes and schema
    collections: RwLock<HashMap<String, CollectionCore<S>>>,
}

impl DatabaseCore<FileStorage> {
    /// Open or create a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let storage = FileStorage::open(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "database opened");
        Ok(Self::with_storage(storage, Some(path.as_ref().to_path_buf())))
    }
}

impl DatabaseCore<MemoryStorage> {
    /// Database without persistence
    pub fn in_memory() -> Self {
        Self::with_storage(MemoryStorage::new(), None)
    }
}

fn check_collection_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('$') || name.starts_with("system.") {
        return Err(EduHubError::InvalidQuery(format!(
            "Invalid collection name: '{}'",
            name
        )));
    }
    Ok(())
}

impl<S: Storage> DatabaseCore<S> {
    pub fn with_storage(storage: S, path: Option<PathBuf>) -> Self {
        DatabaseCore {
            storage: Arc::new(RwLock::new(storage)),
            path,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Database file, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn list_collection_names(&self) -> Vec<String> {
        self.storage.read().list_collections()
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.storage.read().get_collection_meta(name).is_some()
    }

    /// Explicitly create a collection, optionally with a validator
    ///
    /// Fails with `CollectionExists` when the name is taken; the existing
    /// collection and its validator are left untouched.
    pub fn create_collection(
        &self,
        name: &str,
        options: CreateCollectionOptions,
    ) -> Result<CollectionCore<S>> {
        check_collection_name(name)?;
        if let Some(validator) = &options.validator {
            CompiledSchema::from_validator(validator)?;
        }

        self.storage
            .write()
            .create_collection(CollectionMeta::new(name).with_validator(options.validator))?;
        tracing::debug!(collection = name, "collection created");
        self.collection(name)
    }

    /// Get a collection handle, creating the collection on first use
    pub fn collection(&self, name: &str) -> Result<CollectionCore<S>> {
        check_collection_name(name)?;
        if let Some(existing) = self.collections.read().get(name) {
            return Ok(existing.clone());
        }

        let mut cache = self.collections.write();
        if let Some(existing) = cache.get(name) {
            return Ok(existing.clone());
        }
        let handle = CollectionCore::new(name.to_string(), Arc::clone(&self.storage))?;
        cache.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    /// Drop a collection with its documents and indexes
    ///
    /// Returns false when there was no such collection.
    pub fn drop_collection(&self, name: &str) -> Result<bool> {
        let mut cache = self.collections.write();
        cache.remove(name);
        let mut storage = self.storage.write();
        if storage.get_collection_meta(name).is_none() {
            return Ok(false);
        }
        storage.drop_collection(name)?;
        tracing::debug!(collection = name, "collection dropped");
        Ok(true)
    }

    /// Flush all changes to disk
    pub fn flush(&self) -> Result<()> {
        self.storage.write().flush()
    }

    /// Flush and release the database
    pub fn close(self) -> Result<()> {
        self.flush()?;
        tracing::info!("database closed");
        Ok(())
    }
}

impl<S: Storage> Drop for DatabaseCore<S> {
    fn drop(&mut self) {
        if let Err(e) = self.storage.write().flush() {
            tracing::warn!(error = %e, "flush on drop failed");
        }
    }
}
