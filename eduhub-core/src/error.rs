// eduhub-core/src/error.rs
//! Error types surfaced by the document store

use thiserror::Error;

/// A single reason a document failed its collection validator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' expected type {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("field '{field}' value {value} is not one of the allowed values")]
    EnumMismatch { field: String, value: String },

    #[error("field '{field}' value {value} does not match pattern '{pattern}'")]
    PatternMismatch {
        field: String,
        value: String,
        pattern: String,
    },

    #[error("field '{field}' value {value} is outside the allowed range ({bound})")]
    OutOfRange {
        field: String,
        value: String,
        bound: String,
    },
}

impl SchemaViolation {
    /// Dotted path of the offending field
    pub fn field(&self) -> &str {
        match self {
            SchemaViolation::MissingField { field }
            | SchemaViolation::TypeMismatch { field, .. }
            | SchemaViolation::EnumMismatch { field, .. }
            | SchemaViolation::PatternMismatch { field, .. }
            | SchemaViolation::OutOfRange { field, .. } => field,
        }
    }
}

#[derive(Debug, Error)]
pub enum EduHubError {
    #[error("Document failed validation for collection '{collection}': {violation}")]
    Validation {
        collection: String,
        violation: SchemaViolation,
    },

    #[error("Duplicate key error in '{collection}' index {index}: {key}")]
    DuplicateKey {
        collection: String,
        index: String,
        key: String,
    },

    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Aggregation error: {0}")]
    AggregationError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Corrupted database file: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EduHubError {
    fn from(err: serde_json::Error) -> Self {
        EduHubError::Serialization(err.to_string())
    }
}

impl EduHubError {
    /// Schema violation carried by a validation failure, if any
    pub fn violation(&self) -> Option<&SchemaViolation> {
        match self {
            EduHubError::Validation { violation, .. } => Some(violation),
            _ => None,
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, EduHubError::DuplicateKey { .. })
    }
}

pub type Result<T> = std::result::Result<T, EduHubError>;
