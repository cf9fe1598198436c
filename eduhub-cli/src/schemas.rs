// eduhub-cli/src/schemas.rs
//! Collection validators and idempotent collection setup

use eduhub_core::{CreateCollectionOptions, DatabaseCore, EduHubError, Storage};
use serde_json::{json, Value};

use crate::error::Result;

/// The six EduHub collections, in setup order
pub const COLLECTIONS: [&str; 6] = [
    "users",
    "courses",
    "enrollments",
    "lessons",
    "assignments",
    "submissions",
];

/// Which collections a setup run created and which it found already present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// `$jsonSchema` validator for a collection, `None` for unknown names
pub fn validator_for(collection: &str) -> Option<Value> {
    let schema = match collection {
        "users" => json!({
            "bsonType": "object",
            "required": ["email", "firstName", "lastName", "role"],
            "properties": {
                "userId": {"bsonType": "string"},
                "email": {"bsonType": "string", "pattern": "^.+@.+$"},
                "firstName": {"bsonType": "string"},
                "lastName": {"bsonType": "string"},
                "role": {"enum": ["student", "instructor"]},
                "dateJoined": {"bsonType": "date"},
                "profile": {
                    "bsonType": "object",
                    "properties": {
                        "bio": {"bsonType": "string"},
                        "avatar": {"bsonType": "string"},
                        "skills": {"bsonType": "array", "items": {"bsonType": "string"}}
                    }
                },
                "isActive": {"bsonType": "bool"}
            }
        }),
        "courses" => json!({
            "bsonType": "object",
            "required": ["title", "instructorId"],
            "properties": {
                "courseId": {"bsonType": "string"},
                "title": {"bsonType": "string"},
                "description": {"bsonType": "string"},
                "instructorId": {"bsonType": "string"},
                "category": {"bsonType": "string"},
                "level": {"enum": ["beginner", "intermediate", "advanced"]},
                "duration": {"bsonType": "double"},
                "price": {"bsonType": "double"},
                "tags": {"bsonType": "array", "items": {"bsonType": "string"}},
                "createdAt": {"bsonType": "date"},
                "updatedAt": {"bsonType": "date"},
                "isPublished": {"bsonType": "bool"}
            }
        }),
        "enrollments" => json!({
            "bsonType": "object",
            "required": ["studentId", "courseId"],
            "properties": {
                "enrollmentId": {"bsonType": "string"},
                "studentId": {"bsonType": "string"},
                "courseId": {"bsonType": "string"},
                "enrollDate": {"bsonType": "date"},
                "progress": {"bsonType": "double", "minimum": 0, "maximum": 100},
                "isCompleted": {"bsonType": "bool"}
            }
        }),
        "lessons" => json!({
            "bsonType": "object",
            "required": ["title", "courseId"],
            "properties": {
                "lessonId": {"bsonType": "string"},
                "title": {"bsonType": "string"},
                "courseId": {"bsonType": "string"},
                "content": {"bsonType": "string"},
                "order": {"bsonType": "int"},
                "duration": {"bsonType": "double"}
            }
        }),
        "assignments" => json!({
            "bsonType": "object",
            "required": ["title", "courseId"],
            "properties": {
                "assignmentId": {"bsonType": "string"},
                "title": {"bsonType": "string"},
                "courseId": {"bsonType": "string"},
                "dueDate": {"bsonType": "date"},
                "maxScore": {"bsonType": "double"}
            }
        }),
        "submissions" => json!({
            "bsonType": "object",
            "required": ["studentId", "assignmentId"],
            "properties": {
                "submissionId": {"bsonType": "string"},
                "studentId": {"bsonType": "string"},
                "assignmentId": {"bsonType": "string"},
                "submissionDate": {"bsonType": "date"},
                "fileUrl": {"bsonType": "string"},
                "grade": {"bsonType": "double"},
                "feedback": {"bsonType": "string"}
            }
        }),
        _ => return None,
    };
    Some(json!({ "$jsonSchema": schema }))
}

/// Create every EduHub collection with its validator
///
/// Collections that already exist are left exactly as they are, validator
/// included, so running setup twice is harmless.
pub fn define_collections<S: Storage>(db: &DatabaseCore<S>) -> Result<SchemaReport> {
    let mut report = SchemaReport::default();

    for name in COLLECTIONS {
        if db.has_collection(name) {
            tracing::info!(collection = name, "collection already exists, keeping its validator");
            report.existing.push(name.to_string());
            continue;
        }

        let options = CreateCollectionOptions {
            validator: validator_for(name),
        };
        match db.create_collection(name, options) {
            Ok(_) => {
                tracing::info!(collection = name, "collection created with validation");
                report.created.push(name.to_string());
            }
            Err(EduHubError::CollectionExists(_)) => report.existing.push(name.to_string()),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_collection_has_a_validator() {
        for name in COLLECTIONS {
            let validator = validator_for(name).unwrap();
            assert!(validator["$jsonSchema"]["required"].is_array(), "{name}");
        }
        assert!(validator_for("grades").is_none());
    }

    #[test]
    fn test_define_collections_is_idempotent() {
        let db = DatabaseCore::in_memory();
        let first = define_collections(&db).unwrap();
        assert_eq!(first.created.len(), 6);
        assert!(first.existing.is_empty());

        let second = define_collections(&db).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.existing, COLLECTIONS.map(String::from).to_vec());
    }

    #[test]
    fn test_existing_collection_keeps_its_validator() {
        let db = DatabaseCore::in_memory();
        db.collection("users").unwrap();
        let report = define_collections(&db).unwrap();
        assert_eq!(report.existing, vec!["users".to_string()]);
        assert_eq!(db.collection("users").unwrap().validator(), None);
    }
}
