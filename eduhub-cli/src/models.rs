// eduhub-cli/src/models.rs
//! Typed records stored in the six EduHub collections
//!
//! Field names are camelCase in the documents. Dates are written in the
//! `{"$date": "<RFC 3339>"}` form so the engine can type-check and compare them.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A record kind bound to its collection
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;

    fn to_document(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a stored document; `_id` and unknown fields are ignored
    fn from_document(doc: Value) -> Result<Self> {
        Ok(serde_json::from_value(doc)?)
    }
}

/// Serde adapter for `{"$date": ...}` values
pub mod extended_date {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        eduhub_core::date_value(dt).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        eduhub_core::parse_date(&value)
            .ok_or_else(|| D::Error::custom(format!("expected a {{\"$date\": ...}} value, found {}", value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub bio: String,
    pub avatar: String,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(with = "extended_date")]
    pub date_joined: DateTime<Utc>,
    #[serde(default)]
    pub profile: Profile,
    pub is_active: bool,
}

impl Record for User {
    const COLLECTION: &'static str = "users";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_id: String,
    pub title: String,
    pub description: String,
    /// `userId` of an instructor; not enforced
    pub instructor_id: String,
    pub category: String,
    pub level: Level,
    pub duration: f64,
    pub price: f64,
    pub tags: Vec<String>,
    #[serde(with = "extended_date")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "extended_date")]
    pub updated_at: DateTime<Utc>,
    pub is_published: bool,
}

impl Record for Course {
    const COLLECTION: &'static str = "courses";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub enrollment_id: String,
    pub student_id: String,
    pub course_id: String,
    #[serde(with = "extended_date")]
    pub enroll_date: DateTime<Utc>,
    /// Percentage, 0 to 100
    pub progress: f64,
    pub is_completed: bool,
}

impl Record for Enrollment {
    const COLLECTION: &'static str = "enrollments";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub lesson_id: String,
    pub title: String,
    pub course_id: String,
    pub content: String,
    pub order: i64,
    pub duration: f64,
}

impl Record for Lesson {
    const COLLECTION: &'static str = "lessons";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub assignment_id: String,
    pub title: String,
    pub course_id: String,
    #[serde(with = "extended_date")]
    pub due_date: DateTime<Utc>,
    pub max_score: f64,
}

impl Record for Assignment {
    const COLLECTION: &'static str = "assignments";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub submission_id: String,
    pub student_id: String,
    pub assignment_id: String,
    #[serde(with = "extended_date")]
    pub submission_date: DateTime<Utc>,
    pub file_url: String,
    pub grade: f64,
    pub feedback: String,
}

impl Record for Submission {
    const COLLECTION: &'static str = "submissions";
}
