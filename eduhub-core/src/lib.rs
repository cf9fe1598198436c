// eduhub-core/src/lib.rs
// Embedded document store used by the EduHub application

pub mod aggregation;
pub mod collection_core;
pub mod database;
pub mod document;
pub mod error;
pub mod find_options;
pub mod index;
pub mod query;
pub mod query_planner;
pub mod storage;
pub mod value_utils;

// Public exports
pub use aggregation::{LookupSource, Pipeline};
pub use collection_core::{CollectionCore, InsertManyResult, UpdateSpec};
pub use database::{CreateCollectionOptions, DatabaseCore};
pub use document::{Document, DocumentId};
pub use error::{EduHubError, Result, SchemaViolation};
pub use find_options::FindOptions;
pub use index::{IndexDirection, IndexSpec};
pub use query_planner::QueryPlan;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use value_utils::{date_value, parse_date};
