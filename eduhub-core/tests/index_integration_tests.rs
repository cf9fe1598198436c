// index_integration_tests.rs
// Query planning with single-field, compound and text indexes

use eduhub_core::{DatabaseCore, EduHubError};
use serde_json::json;

fn courses_db() -> DatabaseCore<eduhub_core::MemoryStorage> {
    let db = DatabaseCore::in_memory();
    let courses = db.collection("courses").unwrap();
    let rows = [
        ("c001", "Introduction to Python Programming", "Programming", vec!["python", "beginner"]),
        ("c002", "Data Science with Python", "Data Science", vec!["python", "data"]),
        ("c003", "Web Development Bootcamp", "Web Development", vec!["web", "javascript"]),
        ("c004", "Machine Learning Basics", "Data Science", vec!["ml"]),
    ];
    for (id, title, category, tags) in rows {
        courses
            .insert_one(json!({"courseId": id, "title": title, "category": category, "tags": tags}))
            .unwrap();
    }
    db
}

#[test]
fn test_text_search_requires_text_index() {
    let db = courses_db();
    let courses = db.collection("courses").unwrap();
    let err = courses
        .find(&json!({"$text": {"$search": "python"}}))
        .unwrap_err();
    assert!(matches!(err, EduHubError::InvalidQuery(_)));
}

#[test]
fn test_text_search_examines_fewer_documents_than_regex() {
    let db = courses_db();
    let courses = db.collection("courses").unwrap();

    let regex_plan = courses
        .explain(&json!({"title": {"$regex": "python", "$options": "i"}}))
        .unwrap();
    assert_eq!(regex_plan["queryPlanner"]["winningPlan"]["stage"], "COLLSCAN");
    assert_eq!(regex_plan["executionStats"]["totalDocsExamined"], 4);
    assert_eq!(regex_plan["executionStats"]["nReturned"], 2);

    let name = courses
        .create_index(&json!({"title": "text", "category": 1}), false)
        .unwrap();
    assert_eq!(name, "title_text_category_1");

    let text_plan = courses.explain(&json!({"$text": {"$search": "Python"}})).unwrap();
    assert_eq!(text_plan["queryPlanner"]["winningPlan"]["stage"], "TEXT");
    assert_eq!(text_plan["executionStats"]["totalDocsExamined"], 2);
    assert_eq!(text_plan["executionStats"]["nReturned"], 2);
}

#[test]
fn test_multikey_tags_index() {
    let db = courses_db();
    let courses = db.collection("courses").unwrap();
    courses.create_index(&json!({"tags": 1}), false).unwrap();

    let plan = courses.explain(&json!({"tags": "python"})).unwrap();
    assert_eq!(plan["queryPlanner"]["winningPlan"]["indexName"], "tags_1");
    assert_eq!(plan["executionStats"]["nReturned"], 2);

    let found = courses.find(&json!({"tags": "python"})).unwrap();
    let ids: Vec<_> = found.iter().map(|d| d["courseId"].clone()).collect();
    assert_eq!(ids, vec![json!("c001"), json!("c002")]);
}

#[test]
fn test_index_maintained_across_updates_and_deletes() {
    let db = courses_db();
    let courses = db.collection("courses").unwrap();
    courses.create_index(&json!({"category": 1}), false).unwrap();

    courses
        .update_one(&json!({"courseId": "c004"}), &json!({"$set": {"category": "AI"}}))
        .unwrap();
    assert_eq!(courses.count_documents(&json!({"category": "AI"})).unwrap(), 1);
    assert_eq!(courses.count_documents(&json!({"category": "Data Science"})).unwrap(), 1);

    courses.delete_many(&json!({"category": "AI"})).unwrap();
    assert_eq!(courses.count_documents(&json!({"category": "AI"})).unwrap(), 0);
}

#[test]
fn test_create_index_is_idempotent_and_droppable() {
    let db = courses_db();
    let courses = db.collection("courses").unwrap();
    courses.create_index(&json!({"courseId": 1}), true).unwrap();
    courses.create_index(&json!({"courseId": 1}), true).unwrap();
    assert_eq!(courses.list_indexes().len(), 2);

    assert!(courses.create_index(&json!({"courseId": 1}), false).is_err());
    courses.drop_index("courseId_1").unwrap();
    assert_eq!(courses.list_indexes(), vec!["_id_".to_string()]);
    assert!(courses.drop_index("courseId_1").is_err());
}
