// eduhub-core/src/collection_core/mod.rs
// Collection logic: CRUD, queries, aggregation, indexes, explain
//
// ├── Constructor (load validator + rebuild indexes)
// ├── CRUD Operations
// │   ├── insert_one, insert_many
// │   ├── update_one, update_many
// │   └── delete_one, delete_many
// ├── Query Operations
// │   ├── find, find_with_options, find_one, count_documents, distinct
// │   └── explain
// ├── Aggregation
// ├── Index Operations
// │   └── create_index, drop_index, list_indexes
// └── Private Helpers

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::aggregation::{LookupSource, Pipeline};
use crate::document::{Document, DocumentId};
use crate::error::{EduHubError, Result};
use crate::find_options::FindOptions;
use crate::index::{IndexManager, IndexSpec, ID_INDEX_NAME};
use crate::query::{matches_filter, split_text_search};
use crate::query_planner::{choose_plan, execute_plan, QueryPlan};
use crate::storage::{CollectionMeta, Storage};
use crate::value_utils::values_equal;

mod schema;
mod update;

pub use self::schema::{BsonType, CompiledSchema};
pub use self::update::UpdateSpec;

/// Result of insert_many operation
#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<DocumentId>,
    pub inserted_count: usize,
}

/// Documents matched by a query plus how they were found
struct QueryExecution {
    plan: QueryPlan,
    docs: Vec<Value>,
    docs_examined: u64,
    keys_examined: u64,
}

/// `$lookup` reads other collections straight from storage
struct StorageLookup<'a, S: Storage> {
    storage: &'a S,
}

impl<S: Storage> LookupSource for StorageLookup<'_, S> {
    fn lookup_documents(&self, collection: &str) -> Result<Vec<Value>> {
        if self.storage.get_collection_meta(collection).is_none() {
            return Ok(Vec::new());
        }
        self.storage.scan_documents(collection)
    }
}

/// A handle to one collection
///
/// Handles are cheap to clone; clones share the same index manager and
/// schema, so every handle obtained from one database sees the same state.
pub struct CollectionCore<S: Storage> {
    pub name: String,
    storage: Arc<RwLock<S>>,
    indexes: Arc<RwLock<IndexManager>>,
    schema: Arc<RwLock<Option<CompiledSchema>>>,
}

impl<S: Storage> Clone for CollectionCore<S> {
    fn clone(&self) -> Self {
        CollectionCore {
            name: self.name.clone(),
            storage: Arc::clone(&self.storage),
            indexes: Arc::clone(&self.indexes),
            schema: Arc::clone(&self.schema),
        }
    }
}

impl<S: Storage> CollectionCore<S> {
    // ========== CONSTRUCTOR ==========

    /// Open a collection, creating it in storage if it does not exist
    ///
    /// The validator is compiled and every persisted index is rebuilt from
    /// the stored documents.
    pub(crate) fn new(name: String, storage: Arc<RwLock<S>>) -> Result<Self> {
        let mut index_manager = IndexManager::new();
        let schema = {
            let mut guard = storage.write();
            if guard.get_collection_meta(&name).is_none() {
                guard.create_collection(CollectionMeta::new(name.clone()))?;
            }
            let meta = guard
                .get_collection_meta(&name)
                .ok_or_else(|| EduHubError::CollectionNotFound(name.clone()))?;

            let schema = meta
                .validator
                .as_ref()
                .map(CompiledSchema::from_validator)
                .transpose()?;
            let specs = meta.indexes.clone();

            for spec in specs {
                index_manager.create_index(spec)?;
            }
            let docs = guard.scan_documents(&name)?;
            for doc in &docs {
                let stored = Document::from_stored(doc.clone())?;
                index_manager.insert_document(&stored.id, &stored.body);
            }
            tracing::debug!(
                collection = %name,
                documents = docs.len(),
                indexes = index_manager.iter().count(),
                "collection loaded"
            );
            schema
        };

        Ok(CollectionCore {
            name,
            storage,
            indexes: Arc::new(RwLock::new(index_manager)),
            schema: Arc::new(RwLock::new(schema)),
        })
    }

    /// Validator document stored with the collection, if any
    pub fn validator(&self) -> Option<Value> {
        self.storage
            .read()
            .get_collection_meta(&self.name)
            .and_then(|m| m.validator.clone())
    }

    fn validate(&self, doc: &Value) -> Result<()> {
        match self.schema.read().as_ref() {
            Some(schema) => schema.validate(doc).map_err(|violation| EduHubError::Validation {
                collection: self.name.clone(),
                violation,
            }),
            None => Ok(()),
        }
    }

    // ========== CRUD OPERATIONS ==========

    /// Insert one document; `_id` is assigned when absent
    pub fn insert_one(&self, fields: Value) -> Result<DocumentId> {
        let mut storage = self.storage.write();
        let last_id = storage
            .get_collection_meta(&self.name)
            .map(|m| m.last_id)
            .ok_or_else(|| EduHubError::CollectionNotFound(self.name.clone()))?;
        let document = Document::prepare(fields, || DocumentId::new_auto(last_id))?;

        self.validate(&document.body)?;

        if storage.read_document(&self.name, &document.id)?.is_some() {
            return Err(EduHubError::DuplicateKey {
                collection: self.name.clone(),
                index: ID_INDEX_NAME.to_string(),
                key: document.id.to_string(),
            });
        }

        let mut indexes = self.indexes.write();
        indexes.check_unique(&self.name, &document.id, &document.body)?;
        storage.write_document(&self.name, &document.id, &document.body)?;
        indexes.insert_document(&document.id, &document.body);

        tracing::trace!(collection = %self.name, id = %document.id, "inserted");
        Ok(document.id)
    }

    /// Ordered bulk insert: stops at the first failing document
    ///
    /// Documents before the failure stay inserted.
    pub fn insert_many(&self, documents: Vec<Value>) -> Result<InsertManyResult> {
        let mut inserted_ids = Vec::with_capacity(documents.len());
        for doc in documents {
            inserted_ids.push(self.insert_one(doc)?);
        }
        tracing::debug!(collection = %self.name, count = inserted_ids.len(), "insert_many");
        Ok(InsertManyResult {
            inserted_count: inserted_ids.len(),
            inserted_ids,
        })
    }

    /// Update the first matching document; returns (matched, modified)
    pub fn update_one(&self, filter: &Value, update: &Value) -> Result<(u64, u64)> {
        self.update_matching(filter, update, Some(1))
    }

    /// Update every matching document; returns (matched, modified)
    pub fn update_many(&self, filter: &Value, update: &Value) -> Result<(u64, u64)> {
        self.update_matching(filter, update, None)
    }

    fn update_matching(
        &self,
        filter: &Value,
        update: &Value,
        limit: Option<usize>,
    ) -> Result<(u64, u64)> {
        let spec = UpdateSpec::parse(update)?;
        let mut targets = self.execute_query(filter)?.docs;
        if let Some(limit) = limit {
            targets.truncate(limit);
        }

        let mut storage = self.storage.write();
        let mut indexes = self.indexes.write();
        let mut matched = 0;
        let mut modified = 0;

        for old in targets {
            let stored = Document::from_stored(old)?;
            matched += 1;

            let mut new_body = stored.body.clone();
            if !spec.apply(&mut new_body)? {
                continue;
            }
            self.validate(&new_body)?;

            indexes.remove_document(&stored.id, &stored.body);
            if let Err(e) = indexes.check_unique(&self.name, &stored.id, &new_body) {
                indexes.insert_document(&stored.id, &stored.body);
                return Err(e);
            }
            storage.write_document(&self.name, &stored.id, &new_body)?;
            indexes.insert_document(&stored.id, &new_body);
            modified += 1;
        }

        tracing::debug!(collection = %self.name, matched, modified, "update");
        Ok((matched, modified))
    }

    /// Delete the first matching document
    pub fn delete_one(&self, filter: &Value) -> Result<u64> {
        self.delete_matching(filter, Some(1))
    }

    /// Delete every matching document
    pub fn delete_many(&self, filter: &Value) -> Result<u64> {
        self.delete_matching(filter, None)
    }

    fn delete_matching(&self, filter: &Value, limit: Option<usize>) -> Result<u64> {
        let mut targets = self.execute_query(filter)?.docs;
        if let Some(limit) = limit {
            targets.truncate(limit);
        }

        let mut storage = self.storage.write();
        let mut indexes = self.indexes.write();
        let mut deleted = 0;
        for doc in targets {
            let stored = Document::from_stored(doc)?;
            if storage.delete_document(&self.name, &stored.id)? {
                indexes.remove_document(&stored.id, &stored.body);
                deleted += 1;
            }
        }

        tracing::debug!(collection = %self.name, deleted, "delete");
        Ok(deleted)
    }

    // ========== QUERY OPERATIONS ==========

    pub fn find(&self, filter: &Value) -> Result<Vec<Value>> {
        Ok(self.execute_query(filter)?.docs)
    }

    /// Find with projection, sort, skip and limit
    pub fn find_with_options(&self, filter: &Value, options: &FindOptions) -> Result<Vec<Value>> {
        let docs = self.find(filter)?;
        Ok(options.apply(docs))
    }

    pub fn find_one(&self, filter: &Value) -> Result<Option<Value>> {
        Ok(self.find(filter)?.into_iter().next())
    }

    pub fn count_documents(&self, filter: &Value) -> Result<u64> {
        Ok(self.execute_query(filter)?.docs.len() as u64)
    }

    /// Distinct values of `field` among matching documents; arrays contribute their elements
    pub fn distinct(&self, field: &str, filter: &Value) -> Result<Vec<Value>> {
        let mut values: Vec<Value> = Vec::new();
        let mut push_unique = |v: &Value| {
            if !values.iter().any(|existing| values_equal(existing, v)) {
                values.push(v.clone());
            }
        };

        for doc in self.find(filter)? {
            match crate::value_utils::get_nested_value(&doc, field) {
                Some(Value::Array(items)) => items.iter().for_each(&mut push_unique),
                Some(v) => push_unique(v),
                None => {}
            }
        }
        Ok(values)
    }

    /// Run the query and report the plan with execution statistics
    pub fn explain(&self, filter: &Value) -> Result<Value> {
        let started = Instant::now();
        let execution = self.execute_query(filter)?;
        let elapsed = started.elapsed();

        Ok(json!({
            "queryPlanner": {
                "namespace": self.name,
                "winningPlan": execution.plan.to_json(),
            },
            "executionStats": {
                "nReturned": execution.docs.len(),
                "totalDocsExamined": execution.docs_examined,
                "totalKeysExamined": execution.keys_examined,
                "executionTimeMillis": elapsed.as_millis() as u64,
                "executionTimeMicros": elapsed.as_micros() as u64,
            }
        }))
    }

    // ========== AGGREGATION ==========

    /// Execute an aggregation pipeline over the whole collection
    ///
    /// ```no_run
    /// use eduhub_core::DatabaseCore;
    /// use serde_json::json;
    ///
    /// let db = DatabaseCore::in_memory();
    /// let enrollments = db.collection("enrollments").unwrap();
    /// let rows = enrollments.aggregate(&json!([
    ///     {"$group": {"_id": "$courseId", "count": {"$sum": 1}}},
    ///     {"$sort": {"count": -1}}
    /// ])).unwrap();
    /// ```
    pub fn aggregate(&self, pipeline_json: &Value) -> Result<Vec<Value>> {
        let pipeline = Pipeline::from_json(pipeline_json)?;

        let storage = self.storage.read();
        let docs = storage.scan_documents(&self.name)?;
        let source = StorageLookup { storage: &*storage };
        let results = pipeline.execute(docs, &source)?;

        tracing::debug!(
            collection = %self.name,
            stages = pipeline.stages().len(),
            results = results.len(),
            "aggregate"
        );
        Ok(results)
    }

    // ========== INDEX OPERATIONS ==========

    /// Create an index from a key document, e.g. `{"email": 1}` or
    /// `{"title": "text", "category": 1}`; returns the index name
    ///
    /// Creating an identical index again is a no-op. A unique index over
    /// existing duplicates fails with `DuplicateKey` and is not kept.
    pub fn create_index(&self, keys: &Value, unique: bool) -> Result<String> {
        let spec = IndexSpec::from_keys(keys, unique)?;
        let name = spec.name.clone();

        let mut storage = self.storage.write();
        let mut indexes = self.indexes.write();
        if !indexes.create_index(spec.clone())? {
            return Ok(name);
        }

        let docs = storage.scan_documents(&self.name)?;
        let populated = (|| -> Result<()> {
            let index = indexes
                .get_mut(&name)
                .ok_or_else(|| EduHubError::IndexError(format!("Index not found: {}", name)))?;
            for doc in docs {
                let stored = Document::from_stored(doc)?;
                index.check_unique(&self.name, &stored.id, &stored.body)?;
                index.insert(&stored.id, &stored.body);
            }
            Ok(())
        })();
        if let Err(e) = populated {
            indexes.drop_index(&name)?;
            return Err(e);
        }

        let meta = storage
            .get_collection_meta_mut(&self.name)
            .ok_or_else(|| EduHubError::CollectionNotFound(self.name.clone()))?;
        meta.indexes.push(spec);

        tracing::debug!(collection = %self.name, index = %name, unique, "index created");
        Ok(name)
    }

    pub fn drop_index(&self, index_name: &str) -> Result<()> {
        let mut storage = self.storage.write();
        self.indexes.write().drop_index(index_name)?;
        if let Some(meta) = storage.get_collection_meta_mut(&self.name) {
            meta.indexes.retain(|spec| spec.name != index_name);
        }
        Ok(())
    }

    /// Index names, the implicit `_id_` first
    pub fn list_indexes(&self) -> Vec<String> {
        self.indexes.read().list_indexes()
    }

    /// Definitions of the secondary indexes
    pub fn index_specs(&self) -> Vec<IndexSpec> {
        self.indexes.read().specs()
    }

    // ========== PRIVATE HELPERS ==========

    fn execute_query(&self, filter: &Value) -> Result<QueryExecution> {
        let (text, rest) = split_text_search(filter)?;

        let storage = self.storage.read();
        let indexes = self.indexes.read();
        let plan = choose_plan(&rest, text.as_ref(), &indexes)?;

        let (candidates, keys_examined) = match execute_plan(&plan, &indexes)? {
            None => (storage.scan_documents(&self.name)?, 0),
            Some(probe) => {
                let mut ids = probe.ids;
                ids.sort_by_key(|id| storage.document_position(&self.name, id).unwrap_or(u64::MAX));
                let mut docs = Vec::with_capacity(ids.len());
                for id in &ids {
                    if let Some(doc) = storage.read_document(&self.name, id)? {
                        docs.push(doc);
                    }
                }
                (docs, probe.keys_examined)
            }
        };

        let docs_examined = candidates.len() as u64;
        let mut docs = Vec::new();
        for doc in candidates {
            if matches_filter(&doc, &rest)? {
                docs.push(doc);
            }
        }

        tracing::trace!(
            collection = %self.name,
            stage = plan.stage(),
            docs_examined,
            returned = docs.len(),
            "query"
        );
        Ok(QueryExecution {
            plan,
            docs,
            docs_examined,
            keys_examined,
        })
    }
}
