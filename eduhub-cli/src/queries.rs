// eduhub-cli/src/queries.rs
//! Reporting catalogue: filter reads, joins and aggregate reports
//!
//! Every entry returns typed rows decoded from the documents the engine
//! produces. Pipeline stage order matters and is kept as written.

use chrono::{DateTime, Duration, Utc};
use eduhub_core::{date_value, DatabaseCore, FindOptions, Storage};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::{Assignment, Course, Record};

fn decode<T: DeserializeOwned>(docs: Vec<Value>) -> Result<Vec<T>> {
    docs.into_iter()
        .map(|doc| Ok(serde_json::from_value(doc)?))
        .collect()
}

fn find<S: Storage, T: DeserializeOwned>(
    db: &DatabaseCore<S>,
    collection: &str,
    filter: Value,
    options: &FindOptions,
) -> Result<Vec<T>> {
    decode(db.collection(collection)?.find_with_options(&filter, options)?)
}

fn aggregate<S: Storage, T: DeserializeOwned>(
    db: &DatabaseCore<S>,
    collection: &str,
    pipeline: Value,
) -> Result<Vec<T>> {
    decode(db.collection(collection)?.aggregate(&pipeline)?)
}

// ========== ROW TYPES ==========

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveStudent {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoursePrice {
    pub title: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CourseTitle {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserEmail {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    pub first_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CourseWithInstructor {
    pub title: String,
    pub price: f64,
    pub instructor: PersonName,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnrolledStudent {
    pub student: PersonName,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverage {
    #[serde(rename = "_id")]
    pub category: String,
    pub avg_enrollments: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGrade {
    #[serde(rename = "_id")]
    pub student_id: String,
    pub avg_grade: f64,
    pub student: StudentSummary,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRate {
    #[serde(rename = "_id")]
    pub course_id: String,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorStats {
    #[serde(rename = "_id")]
    pub instructor_id: String,
    pub total_students: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonthlyCount {
    #[serde(rename = "_id")]
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    #[serde(rename = "_id")]
    pub category: String,
    pub enroll_count: i64,
}

// ========== FILTER READS ==========

/// Active students, `userId` and `email` only
pub fn active_students<S: Storage>(db: &DatabaseCore<S>) -> Result<Vec<ActiveStudent>> {
    find(
        db,
        "users",
        json!({"role": "student", "isActive": true}),
        &FindOptions::new().with_projection([("_id", 0), ("userId", 1), ("email", 1)]),
    )
}

pub fn courses_by_category<S: Storage>(db: &DatabaseCore<S>, category: &str) -> Result<Vec<Course>> {
    find(db, Course::COLLECTION, json!({"category": category}), &FindOptions::new())
}

/// Courses priced within `[min, max]`
pub fn courses_in_price_range<S: Storage>(
    db: &DatabaseCore<S>,
    min: f64,
    max: f64,
) -> Result<Vec<CoursePrice>> {
    find(
        db,
        "courses",
        json!({"price": {"$gte": min, "$lte": max}}),
        &FindOptions::new().with_projection([("_id", 0), ("title", 1), ("price", 1)]),
    )
}

/// Users who joined at most `days` days before `reference`
pub fn recent_users<S: Storage>(
    db: &DatabaseCore<S>,
    reference: DateTime<Utc>,
    days: i64,
) -> Result<Vec<UserEmail>> {
    let since = reference - Duration::days(days);
    find(
        db,
        "users",
        json!({"dateJoined": {"$gte": date_value(&since)}}),
        &FindOptions::new().with_projection([("_id", 0), ("email", 1)]),
    )
}

pub fn courses_with_tag<S: Storage>(db: &DatabaseCore<S>, tag: &str) -> Result<Vec<CourseTitle>> {
    find(
        db,
        "courses",
        json!({"tags": {"$in": [tag]}}),
        &FindOptions::new().with_projection([("_id", 0), ("title", 1)]),
    )
}

/// Assignments due between `reference` and `reference + days`
pub fn assignments_due_within<S: Storage>(
    db: &DatabaseCore<S>,
    reference: DateTime<Utc>,
    days: i64,
) -> Result<Vec<Assignment>> {
    let until = reference + Duration::days(days);
    find(
        db,
        Assignment::COLLECTION,
        json!({"dueDate": {"$lte": date_value(&until), "$gte": date_value(&reference)}}),
        &FindOptions::new(),
    )
}

/// Case-insensitive regex match on course titles
pub fn search_courses_by_title<S: Storage>(db: &DatabaseCore<S>, pattern: &str) -> Result<Vec<Course>> {
    find(
        db,
        Course::COLLECTION,
        json!({"title": {"$regex": pattern, "$options": "i"}}),
        &FindOptions::new(),
    )
}

/// `$text` search; needs the courses text index
pub fn text_search_courses<S: Storage>(db: &DatabaseCore<S>, terms: &str) -> Result<Vec<Course>> {
    find(
        db,
        Course::COLLECTION,
        json!({"$text": {"$search": terms}}),
        &FindOptions::new(),
    )
}

// ========== JOINS ==========

pub fn published_courses_with_instructor<S: Storage>(
    db: &DatabaseCore<S>,
) -> Result<Vec<CourseWithInstructor>> {
    aggregate(
        db,
        "courses",
        json!([
            {"$match": {"isPublished": true}},
            {"$lookup": {"from": "users", "localField": "instructorId", "foreignField": "userId", "as": "instructor"}},
            {"$unwind": "$instructor"},
            {"$project": {"title": 1, "instructor.firstName": 1, "price": 1}}
        ]),
    )
}

pub fn students_in_course<S: Storage>(
    db: &DatabaseCore<S>,
    course_id: &str,
) -> Result<Vec<EnrolledStudent>> {
    aggregate(
        db,
        "enrollments",
        json!([
            {"$match": {"courseId": course_id}},
            {"$lookup": {"from": "users", "localField": "studentId", "foreignField": "userId", "as": "student"}},
            {"$unwind": "$student"},
            {"$project": {"student.firstName": 1, "progress": 1, "_id": 0}}
        ]),
    )
}

// ========== AGGREGATE REPORTS ==========

/// Mean number of enrollments per course, by course category
pub fn average_enrollments_by_category<S: Storage>(
    db: &DatabaseCore<S>,
) -> Result<Vec<CategoryAverage>> {
    aggregate(
        db,
        "enrollments",
        json!([
            {"$group": {"_id": "$courseId", "totalEnrollments": {"$sum": 1}}},
            {"$lookup": {"from": "courses", "localField": "_id", "foreignField": "courseId", "as": "course"}},
            {"$unwind": "$course"},
            {"$group": {"_id": "$course.category", "avgEnrollments": {"$avg": "$totalEnrollments"}}}
        ]),
    )
}

pub fn top_students_by_grade<S: Storage>(
    db: &DatabaseCore<S>,
    limit: u32,
) -> Result<Vec<StudentGrade>> {
    aggregate(
        db,
        "submissions",
        json!([
            {"$group": {"_id": "$studentId", "avgGrade": {"$avg": "$grade"}}},
            {"$lookup": {"from": "users", "localField": "_id", "foreignField": "userId", "as": "student"}},
            {"$unwind": "$student"},
            {"$sort": {"avgGrade": -1}},
            {"$limit": limit}
        ]),
    )
}

/// Percentage of completed enrollments per course
pub fn completion_rates<S: Storage>(db: &DatabaseCore<S>) -> Result<Vec<CompletionRate>> {
    aggregate(
        db,
        "enrollments",
        json!([
            {"$group": {
                "_id": "$courseId",
                "total": {"$sum": 1},
                "completed": {"$sum": {"$cond": [{"$eq": ["$isCompleted", true]}, 1, 0]}}
            }},
            {"$project": {"completionRate": {"$multiply": [{"$divide": ["$completed", "$total"]}, 100]}}}
        ]),
    )
}

/// Distinct students and summed course price per instructor
pub fn instructor_stats<S: Storage>(db: &DatabaseCore<S>) -> Result<Vec<InstructorStats>> {
    aggregate(
        db,
        "courses",
        json!([
            {"$lookup": {"from": "enrollments", "localField": "courseId", "foreignField": "courseId", "as": "enrolls"}},
            {"$unwind": "$enrolls"},
            {"$group": {
                "_id": "$instructorId",
                "totalStudents": {"$addToSet": "$enrolls.studentId"},
                "revenue": {"$sum": "$price"}
            }},
            {"$project": {"totalStudents": {"$size": "$totalStudents"}, "totalRevenue": "$revenue"}}
        ]),
    )
}

/// Enrollments per `YYYY-MM`, oldest first
pub fn monthly_enrollment_trend<S: Storage>(db: &DatabaseCore<S>) -> Result<Vec<MonthlyCount>> {
    aggregate(
        db,
        "enrollments",
        json!([
            {"$group": {"_id": {"$dateToString": {"format": "%Y-%m", "date": "$enrollDate"}}, "count": {"$sum": 1}}},
            {"$sort": {"_id": 1}}
        ]),
    )
}

pub fn popular_categories<S: Storage>(
    db: &DatabaseCore<S>,
    limit: u32,
) -> Result<Vec<CategoryCount>> {
    aggregate(
        db,
        "enrollments",
        json!([
            {"$lookup": {"from": "courses", "localField": "courseId", "foreignField": "courseId", "as": "course"}},
            {"$unwind": "$course"},
            {"$group": {"_id": "$course.category", "enrollCount": {"$sum": 1}}},
            {"$sort": {"enrollCount": -1}},
            {"$limit": limit}
        ]),
    )
}

/// Run the whole catalogue and log a one-line summary per entry
pub fn run_catalogue<S: Storage>(db: &DatabaseCore<S>, reference: DateTime<Utc>) -> Result<()> {
    let active = active_students(db)?;
    tracing::info!(rows = active.len(), "active students");

    let programming = courses_by_category(db, "Programming")?;
    tracing::info!(rows = programming.len(), "programming courses");

    let mid_price = courses_in_price_range(db, 50.0, 200.0)?;
    tracing::info!(rows = mid_price.len(), "courses priced 50 to 200");

    let recent = recent_users(db, reference, 180)?;
    tracing::info!(rows = recent.len(), "users joined in the last 180 days");

    let tagged = courses_with_tag(db, "python")?;
    tracing::info!(rows = tagged.len(), "courses tagged python");

    let due = assignments_due_within(db, reference, 7)?;
    tracing::info!(rows = due.len(), "assignments due within a week");

    let found = search_courses_by_title(db, "Python")?;
    tracing::info!(rows = found.len(), "courses with Python in the title");

    for row in published_courses_with_instructor(db)? {
        tracing::info!(title = %row.title, instructor = %row.instructor.first_name, price = row.price, "published course");
    }
    for row in students_in_course(db, "c001")? {
        tracing::info!(student = %row.student.first_name, progress = row.progress, "enrolled in c001");
    }
    for row in average_enrollments_by_category(db)? {
        tracing::info!(category = %row.category, avg = row.avg_enrollments, "average enrollments");
    }
    for row in top_students_by_grade(db, 5)? {
        tracing::info!(student = %row.student_id, name = %row.student.first_name, avg_grade = row.avg_grade, "top student");
    }
    for row in completion_rates(db)? {
        tracing::info!(course = %row.course_id, rate = row.completion_rate, "completion rate");
    }
    for row in instructor_stats(db)? {
        tracing::info!(
            instructor = %row.instructor_id,
            students = row.total_students,
            revenue = row.total_revenue,
            "instructor analytics"
        );
    }
    for row in monthly_enrollment_trend(db)? {
        tracing::info!(month = %row.month, count = row.count, "monthly enrollments");
    }
    for row in popular_categories(db, 3)? {
        tracing::info!(category = %row.category, enrollments = row.enroll_count, "popular category");
    }

    Ok(())
}
