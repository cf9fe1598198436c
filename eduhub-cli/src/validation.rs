// eduhub-cli/src/validation.rs
//! Deliberately invalid writes and how the database rejects them

use std::fmt;

use chrono::{DateTime, Utc};
use eduhub_core::{date_value, DatabaseCore, EduHubError, SchemaViolation, Storage};
use serde_json::{json, Value};

use crate::error::Result;

/// Error categories the application distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Enum, pattern or range constraint
    Validation,
    /// Duplicate key on a unique index
    Uniqueness,
    TypeMismatch,
    MissingField,
    Other,
}

impl ErrorKind {
    pub fn classify(err: &EduHubError) -> Self {
        match err {
            EduHubError::Validation { violation, .. } => match violation {
                SchemaViolation::MissingField { .. } => ErrorKind::MissingField,
                SchemaViolation::TypeMismatch { .. } => ErrorKind::TypeMismatch,
                SchemaViolation::EnumMismatch { .. }
                | SchemaViolation::PatternMismatch { .. }
                | SchemaViolation::OutOfRange { .. } => ErrorKind::Validation,
            },
            EduHubError::DuplicateKey { .. } => ErrorKind::Uniqueness,
            _ => ErrorKind::Other,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation failure",
            ErrorKind::Uniqueness => "uniqueness conflict",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::MissingField => "missing required field",
            ErrorKind::Other => "other error",
        };
        f.write_str(name)
    }
}

/// What happened to one invalid insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub case: &'static str,
    pub collection: &'static str,
    /// `None` when the insert was unexpectedly accepted
    pub rejected_as: Option<ErrorKind>,
    pub message: String,
}

/// Insert that the database should refuse
pub struct InvalidInsert {
    pub case: &'static str,
    pub collection: &'static str,
    pub document: Value,
    pub expected: ErrorKind,
}

/// The four rejected writes: bad role, reused email, text price, no firstName
///
/// The reused email is only refused once the unique email index exists.
pub fn invalid_inserts(now: DateTime<Utc>) -> Vec<InvalidInsert> {
    vec![
        InvalidInsert {
            case: "invalid role",
            collection: "users",
            document: json!({
                "userId": "invalid", "email": "test@invalid.com",
                "firstName": "Test", "lastName": "User", "role": "admin"
            }),
            expected: ErrorKind::Validation,
        },
        InvalidInsert {
            case: "duplicate email",
            collection: "users",
            document: json!({
                "userId": "dup001", "email": "student1@example.com",
                "firstName": "Dup", "lastName": "User", "role": "student",
                "dateJoined": date_value(&now), "profile": {}, "isActive": true
            }),
            expected: ErrorKind::Uniqueness,
        },
        InvalidInsert {
            case: "non-numeric price",
            collection: "courses",
            document: json!({
                "courseId": "c_invalid", "title": "Invalid",
                "instructorId": "inst001", "price": "not_a_number"
            }),
            expected: ErrorKind::TypeMismatch,
        },
        InvalidInsert {
            case: "missing firstName",
            collection: "users",
            document: json!({"userId": "missing", "email": "missing@example.com", "role": "student"}),
            expected: ErrorKind::MissingField,
        },
    ]
}

/// Attempt each invalid insert, log how it was rejected and keep going
///
/// Only failures to reach a collection at all abort the run.
pub fn run_error_checks<S: Storage>(db: &DatabaseCore<S>, now: DateTime<Utc>) -> Result<Vec<CheckOutcome>> {
    let mut outcomes = Vec::new();

    for check in invalid_inserts(now) {
        let collection = db.collection(check.collection)?;
        let outcome = match collection.insert_one(check.document) {
            Ok(id) => {
                tracing::warn!(case = check.case, id = ?id, "invalid document was accepted");
                CheckOutcome {
                    case: check.case,
                    collection: check.collection,
                    rejected_as: None,
                    message: format!("accepted with _id {:?}", id),
                }
            }
            Err(err) => {
                let kind = ErrorKind::classify(&err);
                tracing::warn!(case = check.case, kind = %kind, error = %err, "insert rejected");
                if kind != check.expected {
                    tracing::warn!(case = check.case, expected = %check.expected, "rejected for an unexpected reason");
                }
                CheckOutcome {
                    case: check.case,
                    collection: check.collection,
                    rejected_as: Some(kind),
                    message: err.to_string(),
                }
            }
        };
        outcomes.push(outcome);
    }

    Ok(outcomes)
}
