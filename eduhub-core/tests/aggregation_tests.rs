// aggregation_tests.rs
// Pipelines that join collections through $lookup

use eduhub_core::{DatabaseCore, MemoryStorage};
use serde_json::json;

fn setup() -> DatabaseCore<MemoryStorage> {
    let db = DatabaseCore::in_memory();
    db.collection("users")
        .unwrap()
        .insert_many(vec![
            json!({"userId": "stu001", "firstName": "Anna", "role": "student"}),
            json!({"userId": "stu002", "firstName": "Bence", "role": "student"}),
            json!({"userId": "inst001", "firstName": "Ada", "role": "instructor"}),
        ])
        .unwrap();
    db.collection("courses")
        .unwrap()
        .insert_many(vec![
            json!({"courseId": "c001", "title": "Python", "instructorId": "inst001",
                   "category": "Programming", "price": 50.0, "isPublished": true}),
            json!({"courseId": "c002", "title": "Stats", "instructorId": "inst001",
                   "category": "Data Science", "price": 100.0, "isPublished": false}),
        ])
        .unwrap();
    db.collection("enrollments")
        .unwrap()
        .insert_many(vec![
            json!({"studentId": "stu001", "courseId": "c001", "progress": 100.0, "isCompleted": true,
                   "enrollDate": {"$date": "2025-02-01T00:00:00Z"}}),
            json!({"studentId": "stu002", "courseId": "c001", "progress": 40.0, "isCompleted": false,
                   "enrollDate": {"$date": "2025-02-02T00:00:00Z"}}),
            json!({"studentId": "stu001", "courseId": "c002", "progress": 10.0, "isCompleted": false,
                   "enrollDate": {"$date": "2025-03-05T00:00:00Z"}}),
        ])
        .unwrap();
    db
}

#[test]
fn test_published_courses_with_instructor() {
    let db = setup();
    let rows = db
        .collection("courses")
        .unwrap()
        .aggregate(&json!([
            {"$match": {"isPublished": true}},
            {"$lookup": {"from": "users", "localField": "instructorId", "foreignField": "userId", "as": "instructor"}},
            {"$unwind": "$instructor"},
            {"$project": {"_id": 0, "title": 1, "instructor.firstName": 1, "price": 1}}
        ]))
        .unwrap();
    assert_eq!(
        rows,
        vec![json!({"title": "Python", "instructor": {"firstName": "Ada"}, "price": 50.0})]
    );
}

#[test]
fn test_completion_rate_per_course() {
    let db = setup();
    let rows = db
        .collection("enrollments")
        .unwrap()
        .aggregate(&json!([
            {"$group": {
                "_id": "$courseId",
                "total": {"$sum": 1},
                "completed": {"$sum": {"$cond": [{"$eq": ["$isCompleted", true]}, 1, 0]}}
            }},
            {"$project": {
                "courseId": "$_id",
                "completionRate": {"$multiply": [{"$divide": ["$completed", "$total"]}, 100]}
            }},
            {"$sort": {"courseId": 1}}
        ]))
        .unwrap();
    assert_eq!(rows[0]["courseId"], "c001");
    assert_eq!(rows[0]["completionRate"], json!(50.0));
    assert_eq!(rows[1]["completionRate"], json!(0.0));
}

#[test]
fn test_instructor_revenue_and_distinct_students() {
    let db = setup();
    let rows = db
        .collection("courses")
        .unwrap()
        .aggregate(&json!([
            {"$lookup": {"from": "enrollments", "localField": "courseId", "foreignField": "courseId", "as": "enrollments"}},
            {"$unwind": "$enrollments"},
            {"$group": {
                "_id": "$instructorId",
                "students": {"$addToSet": "$enrollments.studentId"},
                "revenue": {"$sum": "$price"}
            }},
            {"$project": {"_id": 0, "instructorId": "$_id", "totalStudents": {"$size": "$students"}, "revenue": 1}}
        ]))
        .unwrap();
    assert_eq!(
        rows,
        vec![json!({"revenue": 200.0, "instructorId": "inst001", "totalStudents": 2})]
    );
}

#[test]
fn test_monthly_trend_and_top_categories() {
    let db = setup();
    let enrollments = db.collection("enrollments").unwrap();

    let trend = enrollments
        .aggregate(&json!([
            {"$group": {"_id": {"$dateToString": {"format": "%Y-%m", "date": "$enrollDate"}}, "count": {"$sum": 1}}},
            {"$sort": {"_id": 1}}
        ]))
        .unwrap();
    assert_eq!(
        trend,
        vec![json!({"_id": "2025-02", "count": 2}), json!({"_id": "2025-03", "count": 1})]
    );

    let top = enrollments
        .aggregate(&json!([
            {"$lookup": {"from": "courses", "localField": "courseId", "foreignField": "courseId", "as": "course"}},
            {"$unwind": "$course"},
            {"$group": {"_id": "$course.category", "count": {"$sum": 1}}},
            {"$sort": {"count": -1}},
            {"$limit": 3}
        ]))
        .unwrap();
    assert_eq!(
        top,
        vec![
            json!({"_id": "Programming", "count": 2}),
            json!({"_id": "Data Science", "count": 1}),
        ]
    );
}

#[test]
fn test_lookup_against_missing_collection() {
    let db = setup();
    let rows = db
        .collection("users")
        .unwrap()
        .aggregate(&json!([
            {"$lookup": {"from": "nothing_here", "localField": "userId", "foreignField": "x", "as": "joined"}},
            {"$unwind": "$joined"},
            {"$count": "n"}
        ]))
        .unwrap();
    assert!(rows.is_empty());
    assert!(!db.has_collection("nothing_here"));
}

#[test]
fn test_invalid_pipeline() {
    let db = setup();
    let users = db.collection("users").unwrap();
    assert!(users.aggregate(&json!({"$match": {}})).is_err());
    assert!(users.aggregate(&json!([{"$out": "x"}])).is_err());
}

#[test]
fn test_project_through_joined_array() {
    let db = setup();
    let rows = db
        .collection("courses")
        .unwrap()
        .aggregate(&json!([
            {"$match": {"courseId": "c001"}},
            {"$lookup": {"from": "users", "localField": "instructorId", "foreignField": "userId", "as": "instructor"}},
            {"$project": {"_id": 0, "title": 1, "instructor.firstName": 1}}
        ]))
        .unwrap();
    assert_eq!(
        rows,
        vec![json!({"title": "Python", "instructor": [{"firstName": "Ada"}]})]
    );
}

#[test]
fn test_group_and_lookup_treat_date_spellings_as_one_instant() {
    let db = DatabaseCore::in_memory();
    let events = db.collection("events").unwrap();
    events
        .insert_many(vec![
            json!({"kind": "a", "d": {"$date": "2025-02-01T00:00:00.000Z"}}),
            json!({"kind": "b", "d": {"$date": "2025-02-01T00:00:00Z"}}),
        ])
        .unwrap();
    db.collection("holidays")
        .unwrap()
        .insert_one(json!({"name": "launch", "day": {"$date": "2025-02-01T01:00:00+01:00"}}))
        .unwrap();

    assert_eq!(
        events
            .count_documents(&json!({"d": {"$date": "2025-02-01T00:00:00Z"}}))
            .unwrap(),
        2
    );

    let groups = events
        .aggregate(&json!([
            {"$group": {"_id": "$d", "n": {"$sum": 1}}}
        ]))
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["n"], 2);

    let joined = events
        .aggregate(&json!([
            {"$lookup": {"from": "holidays", "localField": "d", "foreignField": "day", "as": "holiday"}},
            {"$unwind": "$holiday"},
            {"$project": {"_id": 0, "kind": 1, "holiday.name": 1}}
        ]))
        .unwrap();
    assert_eq!(
        joined,
        vec![
            json!({"kind": "a", "holiday": {"name": "launch"}}),
            json!({"kind": "b", "holiday": {"name": "launch"}}),
        ]
    );
}
