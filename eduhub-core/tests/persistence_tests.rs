// persistence_tests.rs
// Reopening a database file restores documents, validators and indexes

use eduhub_core::{CreateCollectionOptions, DatabaseCore, EduHubError};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_documents_and_ids_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("eduhub_db.mlite");

    {
        let db = DatabaseCore::open(&path).unwrap();
        let lessons = db.collection("lessons").unwrap();
        for i in 0..3 {
            lessons.insert_one(json!({"lessonId": format!("l{:03}", i + 1), "order": i})).unwrap();
        }
        db.flush().unwrap();
    }

    let db = DatabaseCore::open(&path).unwrap();
    let lessons = db.collection("lessons").unwrap();
    let docs = lessons.find(&json!({})).unwrap();
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[0]["lessonId"], "l001");

    // the auto-id counter continues after the stored documents
    let next = lessons.insert_one(json!({"lessonId": "l004"})).unwrap();
    assert_eq!(next, eduhub_core::DocumentId::Int(4));
}

#[test]
fn test_validator_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("v.mlite");
    let validator = json!({"$jsonSchema": {
        "bsonType": "object",
        "required": ["title", "courseId"],
        "properties": {"order": {"bsonType": "int"}}
    }});

    {
        let db = DatabaseCore::open(&path).unwrap();
        db.create_collection("lessons", CreateCollectionOptions::with_validator(validator.clone()))
            .unwrap();
        db.close().unwrap();
    }

    let db = DatabaseCore::open(&path).unwrap();
    let lessons = db.collection("lessons").unwrap();
    assert_eq!(lessons.validator(), Some(validator));
    let err = lessons
        .insert_one(json!({"title": "Intro", "courseId": "c001", "order": "first"}))
        .unwrap_err();
    assert!(err.violation().is_some());
}

#[test]
fn test_indexes_rebuilt_on_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("i.mlite");

    {
        let db = DatabaseCore::open(&path).unwrap();
        let users = db.collection("users").unwrap();
        users.insert_one(json!({"email": "a@example.com"})).unwrap();
        users.create_index(&json!({"email": 1}), true).unwrap();
        db.close().unwrap();
    }

    let db = DatabaseCore::open(&path).unwrap();
    let users = db.collection("users").unwrap();
    assert_eq!(users.list_indexes(), vec!["_id_".to_string(), "email_1".to_string()]);
    assert!(users
        .insert_one(json!({"email": "a@example.com"}))
        .unwrap_err()
        .is_duplicate_key());

    let plan = users.explain(&json!({"email": "a@example.com"})).unwrap();
    assert_eq!(plan["queryPlanner"]["winningPlan"]["stage"], "IXSCAN");
}

#[test]
fn test_drop_flushes_best_effort() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("d.mlite");
    {
        let db = DatabaseCore::open(&path).unwrap();
        db.collection("courses").unwrap().insert_one(json!({"courseId": "c001"})).unwrap();
    }
    let db = DatabaseCore::open(&path).unwrap();
    assert_eq!(db.collection("courses").unwrap().count_documents(&json!({})).unwrap(), 1);
}

#[test]
fn test_tampered_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.mlite");
    {
        let db = DatabaseCore::open(&path).unwrap();
        db.collection("users").unwrap().insert_one(json!({"role": "student"})).unwrap();
        db.close().unwrap();
    }

    let contents = fs::read_to_string(&path).unwrap();
    fs::write(&path, contents.replace("student", "admin!!")).unwrap();

    assert!(matches!(DatabaseCore::open(&path), Err(EduHubError::Corruption(_))));
}
