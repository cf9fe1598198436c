// workflow_tests.rs
// Setup, seeding, CRUD and error handling against an in-memory database

use std::collections::HashSet;

use eduhub::config::utc_date;
use eduhub::validation::ErrorKind;
use eduhub::{crud, indexes, queries, schemas, seed, validation, AppConfig};
use eduhub_core::{DatabaseCore, MemoryStorage};
use serde_json::json;

fn seeded() -> DatabaseCore<MemoryStorage> {
    let db = DatabaseCore::in_memory();
    schemas::define_collections(&db).unwrap();
    seed::seed(&db, AppConfig::default().reference_time).unwrap();
    db
}

fn field_set(db: &DatabaseCore<MemoryStorage>, collection: &str, field: &str) -> HashSet<String> {
    db.collection(collection)
        .unwrap()
        .distinct(field, &json!({}))
        .unwrap()
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[test]
fn test_seed_counts() {
    let db = seeded();
    let summary = seed::seed(&db, AppConfig::default().reference_time).unwrap();
    let expected = [
        ("users", 20),
        ("courses", 8),
        ("enrollments", 15),
        ("lessons", 25),
        ("assignments", 10),
        ("submissions", 12),
    ];
    for (collection, count) in expected {
        assert_eq!(summary.count(collection), Some(count), "{collection}");
    }
}

#[test]
fn test_reseeding_yields_same_counts() {
    let db = seeded();
    indexes::create_indexes(&db).unwrap();
    let first = seed::seed(&db, AppConfig::default().reference_time).unwrap();
    let second = seed::seed(&db, AppConfig::default().reference_time).unwrap();
    assert_eq!(first, second);
    assert_eq!(second.count("users"), Some(20));
}

#[test]
fn test_references_resolve() {
    let db = seeded();
    let user_ids = field_set(&db, "users", "userId");
    let course_ids = field_set(&db, "courses", "courseId");

    assert!(field_set(&db, "enrollments", "studentId").is_subset(&user_ids));
    assert!(field_set(&db, "enrollments", "courseId").is_subset(&course_ids));
    assert!(field_set(&db, "lessons", "courseId").is_subset(&course_ids));
    assert!(field_set(&db, "assignments", "courseId").is_subset(&course_ids));
    assert!(field_set(&db, "courses", "instructorId").is_subset(&user_ids));
}

#[test]
fn test_role_counts() {
    let db = seeded();
    let counts = seed::user_role_counts(&db).unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].role, "student");
    assert_eq!(counts[0].count, 15);
    assert_eq!(counts[1].role, "instructor");
    assert_eq!(counts[1].count, 5);
}

#[test]
fn test_invalid_role_rejected() {
    let db = seeded();
    let err = db
        .collection("users")
        .unwrap()
        .insert_one(json!({
            "userId": "x1", "email": "x@example.com",
            "firstName": "X", "lastName": "Y", "role": "admin"
        }))
        .unwrap_err();
    assert_eq!(ErrorKind::classify(&err), ErrorKind::Validation);
}

#[test]
fn test_progress_range_enforced_on_enrollments() {
    let db = seeded();
    let err = db
        .collection("enrollments")
        .unwrap()
        .insert_one(json!({"studentId": "stu001", "courseId": "c002", "progress": 120.0}))
        .unwrap_err();
    assert_eq!(ErrorKind::classify(&err), ErrorKind::Validation);
}

#[test]
fn test_error_checks_after_indexes() {
    let db = seeded();
    indexes::create_indexes(&db).unwrap();
    let outcomes = validation::run_error_checks(&db, AppConfig::default().reference_time).unwrap();
    let kinds: Vec<_> = outcomes.iter().map(|o| o.rejected_as).collect();
    assert_eq!(
        kinds,
        vec![
            Some(ErrorKind::Validation),
            Some(ErrorKind::Uniqueness),
            Some(ErrorKind::TypeMismatch),
            Some(ErrorKind::MissingField),
        ]
    );
    assert_eq!(db.collection("users").unwrap().count_documents(&json!({})).unwrap(), 20);
}

#[test]
fn test_duplicate_email_accepted_without_unique_index() {
    let db = seeded();
    let outcomes = validation::run_error_checks(&db, AppConfig::default().reference_time).unwrap();
    assert_eq!(outcomes[1].case, "duplicate email");
    assert_eq!(outcomes[1].rejected_as, None);

    assert_eq!(indexes::remove_duplicate_emails(&db).unwrap(), 1);
    let names = indexes::create_indexes(&db).unwrap();
    assert!(names.contains(&"users.email_1".to_string()));
    let kept = db
        .collection("users")
        .unwrap()
        .find_one(&json!({"email": "student1@example.com"}))
        .unwrap()
        .unwrap();
    assert_eq!(kept["userId"], "stu001");
}

#[test]
fn test_crud_walkthrough() {
    let db = seeded();
    let now = AppConfig::default().reference_time;

    let created = crud::run_create(&db, now).unwrap();
    assert!(created.iter().all(|o| o.inserted == 1));

    let updated = crud::run_updates(&db, now).unwrap();
    assert!(updated.iter().all(|o| o.matched == 1 && o.modified == 1));
    let c001 = db
        .collection("courses")
        .unwrap()
        .find_one(&json!({"courseId": "c001"}))
        .unwrap()
        .unwrap();
    assert_eq!(c001["tags"], json!(["python", "coding", "beginner-friendly"]));
    let stu001 = db
        .collection("users")
        .unwrap()
        .find_one(&json!({"userId": "stu001"}))
        .unwrap()
        .unwrap();
    assert_eq!(stu001["profile"]["bio"], "Updated bio");
    assert_eq!(stu001["profile"]["avatar"], "avatar1.jpg");

    let deleted = crud::run_deletes(&db).unwrap();
    assert_eq!(deleted[0].modified, 1);
    assert_eq!(deleted[1].deleted, 1);
    assert_eq!(deleted[2].deleted, 1);

    // soft-deleted student stays stored but drops out of active reads
    let users = db.collection("users").unwrap();
    assert_eq!(users.count_documents(&json!({})).unwrap(), 21);
    let active = queries::active_students(&db).unwrap();
    assert_eq!(active.len(), 15);
    assert!(active.iter().all(|s| s.user_id != "stu021"));

    let enrollments = db.collection("enrollments").unwrap();
    assert_eq!(enrollments.count_documents(&json!({})).unwrap(), 15);
    assert_eq!(db.collection("lessons").unwrap().count_documents(&json!({})).unwrap(), 25);
}

#[test]
fn test_deleting_course_does_not_cascade() {
    let db = seeded();
    db.collection("courses")
        .unwrap()
        .delete_one(&json!({"courseId": "c001"}))
        .unwrap();
    let lessons = db
        .collection("lessons")
        .unwrap()
        .count_documents(&json!({"courseId": "c001"}))
        .unwrap();
    assert_eq!(lessons, 3);
}

#[test]
fn test_assignments_due_window() {
    let db = seeded();
    let due = queries::assignments_due_within(&db, utc_date(2025, 3, 10), 7).unwrap();
    let ids: Vec<_> = due.iter().map(|a| a.assignment_id.as_str()).collect();
    assert_eq!(ids, vec!["a001"]);
}
