// eduhub-cli/src/crud.rs
//! Create, update and delete walkthrough over the seeded data

use chrono::{DateTime, Utc};
use eduhub_core::{date_value, DatabaseCore, Storage};
use serde_json::json;

use crate::error::Result;
use crate::models::{Course, Enrollment, Lesson, Level, Profile, Record, Role, User};

/// Counts reported by one write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub action: &'static str,
    pub collection: &'static str,
    pub inserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub deleted: u64,
}

impl WriteOutcome {
    fn new(action: &'static str, collection: &'static str) -> Self {
        WriteOutcome {
            action,
            collection,
            ..Default::default()
        }
    }

    fn log(self) -> Self {
        tracing::info!(
            action = self.action,
            collection = self.collection,
            inserted = self.inserted,
            matched = self.matched,
            modified = self.modified,
            deleted = self.deleted,
            "write completed"
        );
        self
    }
}

fn insert<S: Storage, R: Record>(
    db: &DatabaseCore<S>,
    action: &'static str,
    record: &R,
) -> Result<WriteOutcome> {
    let id = db.collection(R::COLLECTION)?.insert_one(record.to_document()?)?;
    tracing::debug!(collection = R::COLLECTION, id = ?id, "document inserted");
    Ok(WriteOutcome {
        inserted: 1,
        ..WriteOutcome::new(action, R::COLLECTION)
    }
    .log())
}

fn update<S: Storage>(
    db: &DatabaseCore<S>,
    action: &'static str,
    collection: &'static str,
    filter: serde_json::Value,
    change: serde_json::Value,
) -> Result<WriteOutcome> {
    let (matched, modified) = db.collection(collection)?.update_one(&filter, &change)?;
    Ok(WriteOutcome {
        matched,
        modified,
        ..WriteOutcome::new(action, collection)
    }
    .log())
}

fn delete<S: Storage>(
    db: &DatabaseCore<S>,
    action: &'static str,
    collection: &'static str,
    filter: serde_json::Value,
) -> Result<WriteOutcome> {
    let deleted = db.collection(collection)?.delete_one(&filter)?;
    Ok(WriteOutcome {
        deleted,
        ..WriteOutcome::new(action, collection)
    }
    .log())
}

/// Insert a new student, an unpublished course, an enrollment and a lesson
pub fn run_create<S: Storage>(db: &DatabaseCore<S>, now: DateTime<Utc>) -> Result<Vec<WriteOutcome>> {
    let student = User {
        user_id: "stu021".to_string(),
        email: "newstudent@example.com".to_string(),
        first_name: "New".to_string(),
        last_name: "User".to_string(),
        role: Role::Student,
        date_joined: now,
        profile: Profile::default(),
        is_active: true,
    };
    let course = Course {
        course_id: "c009".to_string(),
        title: "Advanced MongoDB".to_string(),
        description: "Deep dive".to_string(),
        instructor_id: "inst001".to_string(),
        category: "Database".to_string(),
        level: Level::Advanced,
        duration: 15.0,
        price: 99.99,
        tags: vec!["mongodb".to_string()],
        created_at: now,
        updated_at: now,
        is_published: false,
    };
    let enrollment = Enrollment {
        enrollment_id: "e016".to_string(),
        student_id: "stu021".to_string(),
        course_id: "c009".to_string(),
        enroll_date: now,
        progress: 0.0,
        is_completed: false,
    };
    let lesson = Lesson {
        lesson_id: "l026".to_string(),
        title: "Mongo Queries".to_string(),
        course_id: "c009".to_string(),
        content: "Query basics".to_string(),
        order: 1,
        duration: 2.0,
    };

    Ok(vec![
        insert(db, "add student", &student)?,
        insert(db, "create course", &course)?,
        insert(db, "enroll student", &enrollment)?,
        insert(db, "add lesson", &lesson)?,
    ])
}

/// Profile edit, course publication, regrade and a tag push
pub fn run_updates<S: Storage>(db: &DatabaseCore<S>, now: DateTime<Utc>) -> Result<Vec<WriteOutcome>> {
    Ok(vec![
        update(
            db,
            "update profile",
            "users",
            json!({"userId": "stu001"}),
            json!({"$set": {"profile.bio": "Updated bio", "profile.skills": ["Python", "SQL"]}}),
        )?,
        update(
            db,
            "publish course",
            "courses",
            json!({"courseId": "c009"}),
            json!({"$set": {"isPublished": true, "updatedAt": date_value(&now)}}),
        )?,
        update(
            db,
            "grade submission",
            "submissions",
            json!({"submissionId": "s001"}),
            json!({"$set": {"grade": 95.0, "feedback": "Excellent!"}}),
        )?,
        update(
            db,
            "tag course",
            "courses",
            json!({"courseId": "c001"}),
            json!({"$push": {"tags": "beginner-friendly"}}),
        )?,
    ])
}

/// Deactivate the new student, then remove their enrollment and the new lesson
pub fn run_deletes<S: Storage>(db: &DatabaseCore<S>) -> Result<Vec<WriteOutcome>> {
    Ok(vec![
        update(
            db,
            "soft delete user",
            "users",
            json!({"userId": "stu021"}),
            json!({"$set": {"isActive": false}}),
        )?,
        delete(db, "delete enrollment", "enrollments", json!({"enrollmentId": "e016"}))?,
        delete(db, "remove lesson", "lessons", json!({"lessonId": "l026"}))?,
    ])
}
