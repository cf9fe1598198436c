// eduhub-cli/src/seed.rs
//! Fixed sample data and the seeding run

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use eduhub_core::{DatabaseCore, FindOptions, Storage};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::utc_date;
use crate::error::Result;
use crate::models::{
    Assignment, Course, Enrollment, Lesson, Level, Profile, Record, Role, Submission, User,
};
use crate::schemas::COLLECTIONS;

/// Document count per collection after a seeding run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub counts: Vec<(String, u64)>,
}

impl SeedSummary {
    pub fn count(&self, collection: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|(name, _)| name == collection)
            .map(|(_, n)| *n)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleCount {
    #[serde(rename = "_id")]
    pub role: String,
    pub count: i64,
}

const STUDENT_NAMES: [(&str, &str); 15] = [
    ("Alice", "Smith"),
    ("Bob", "Brown"),
    ("Charlie", "Davis"),
    ("David", "Evans"),
    ("Eva", "Garcia"),
    ("Frank", "Harris"),
    ("Grace", "Johnson"),
    ("Hank", "King"),
    ("Ivy", "Lee"),
    ("Jack", "Miller"),
    ("Kathy", "Wilson"),
    ("Leo", "Martinez"),
    ("Mia", "Garcia"),
    ("Noah", "Rodriguez"),
    ("Olivia", "Martinez"),
];

const INSTRUCTORS: [(&str, &str, &str, &[&str]); 5] = [
    ("Dr. Bob", "Johnson", "Expert in AI", &["MongoDB", "PyMongo"]),
    ("Dr. Alice", "Smith", "Expert in Data Science", &["Pandas", "NumPy"]),
    ("Dr. Charlie", "Brown", "Expert in Web Development", &["HTML", "CSS", "JavaScript"]),
    ("Dr. David", "Wilson", "Expert in Cybersecurity", &["Network Security", "Ethical Hacking"]),
    ("Dr. Eva", "Garcia", "Expert in Cloud Computing", &["AWS", "Azure"]),
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 15 students followed by 5 instructors
pub fn users() -> Vec<User> {
    let mut users = Vec::with_capacity(20);

    for (i, (first, last)) in STUDENT_NAMES.iter().enumerate() {
        let n = i + 1;
        let (bio, skills) = match i % 3 {
            0 => ("Beginner learner", &["Python"][..]),
            1 => ("Intermediate learner", &["Python", "Data Science"][..]),
            _ => ("Advanced learner", &["Python", "Machine Learning"][..]),
        };
        users.push(User {
            user_id: format!("stu{:03}", n),
            email: format!("student{}@example.com", n),
            first_name: first.to_string(),
            last_name: last.to_string(),
            role: Role::Student,
            date_joined: utc_date(2025, 1, 14 + n as u32),
            profile: Profile {
                bio: bio.to_string(),
                avatar: format!("avatar{}.jpg", n),
                skills: strings(skills),
            },
            is_active: true,
        });
    }

    for (i, (first, last, bio, skills)) in INSTRUCTORS.iter().enumerate() {
        let n = i + 1;
        users.push(User {
            user_id: format!("inst{:03}", n),
            email: format!("instructor{}@example.com", n),
            first_name: first.to_string(),
            last_name: last.to_string(),
            role: Role::Instructor,
            date_joined: utc_date(2024, 12, n as u32),
            profile: Profile {
                bio: bio.to_string(),
                avatar: format!("inst{}.jpg", n),
                skills: strings(skills),
            },
            is_active: true,
        });
    }

    users
}

/// Eight published courses; `updated_at` is the run's reference instant
pub fn courses(updated_at: DateTime<Utc>) -> Vec<Course> {
    #[rustfmt::skip]
    let rows: [(&str, &str, &str, &str, &str, Level, f64, f64, &[&str], u32); 8] = [
        ("c001", "Intro to Python", "Basics of Python", "inst001", "Programming", Level::Beginner, 10.5, 49.99, &["python", "coding"], 10),
        ("c002", "Data Science with Python", "Learn Data Science", "inst002", "Data Science", Level::Intermediate, 15.0, 79.99, &["data science", "python"], 12),
        ("c003", "Web Development Basics", "HTML, CSS, JS", "inst003", "Web Development", Level::Beginner, 12.0, 59.99, &["web", "html", "css", "javascript"], 14),
        ("c004", "Advanced Python", "Deep dive into Python", "inst001", "Programming", Level::Advanced, 20.0, 99.99, &["python", "advanced"], 16),
        ("c005", "Machine Learning", "Intro to ML", "inst002", "Data Science", Level::Advanced, 18.0, 89.99, &["machine learning", "python"], 18),
        ("c006", "Frontend Development", "React and Vue", "inst003", "Web Development", Level::Intermediate, 14.0, 69.99, &["react", "vue", "javascript"], 20),
        ("c007", "Cybersecurity Fundamentals", "Basics of Cybersecurity", "inst004", "Cybersecurity", Level::Beginner, 11.0, 54.99, &["cybersecurity", "network"], 22),
        ("c008", "Cloud Computing 101", "Intro to Cloud", "inst005", "Cloud Computing", Level::Beginner, 13.0, 64.99, &["cloud", "aws", "azure"], 24),
    ];

    rows.iter()
        .map(
            |&(id, title, description, instructor, category, level, duration, price, tags, day)| Course {
                course_id: id.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                instructor_id: instructor.to_string(),
                category: category.to_string(),
                level,
                duration,
                price,
                tags: strings(tags),
                created_at: utc_date(2025, 1, day),
                updated_at,
                is_published: true,
            },
        )
        .collect()
}

/// Student N enrols in course ((N-1) mod 8)+1 on February N
pub fn enrollments() -> Vec<Enrollment> {
    const PROGRESS: [f64; 15] = [
        75.0, 50.0, 20.0, 90.0, 60.0, 30.0, 80.0, 40.0, 10.0, 55.0, 70.0, 85.0, 25.0, 95.0, 15.0,
    ];
    const COMPLETED: [u32; 3] = [4, 12, 14];

    PROGRESS
        .iter()
        .enumerate()
        .map(|(i, &progress)| {
            let n = i as u32 + 1;
            Enrollment {
                enrollment_id: format!("e{:03}", n),
                student_id: format!("stu{:03}", n),
                course_id: format!("c{:03}", i % 8 + 1),
                enroll_date: utc_date(2025, 2, n),
                progress,
                is_completed: COMPLETED.contains(&n),
            }
        })
        .collect()
}

/// Lessons 1..=3 belong to c001, the rest to c002
pub fn lessons() -> Vec<Lesson> {
    (1..=25)
        .map(|i| Lesson {
            lesson_id: format!("l{:03}", i),
            title: format!("Lesson {}", i),
            course_id: if i < 4 { "c001" } else { "c002" }.to_string(),
            content: "Sample content".to_string(),
            order: i,
            duration: 1.0,
        })
        .collect()
}

pub fn assignments() -> Vec<Assignment> {
    let rows: [(&str, &str, &str, (u32, u32)); 10] = [
        ("a001", "Python Homework 1", "c001", (3, 15)),
        ("a002", "Data Science Project", "c002", (3, 20)),
        ("a003", "Web Dev Assignment", "c003", (3, 25)),
        ("a004", "Advanced Python Quiz", "c004", (3, 30)),
        ("a005", "ML Case Study", "c005", (4, 5)),
        ("a006", "Frontend Project", "c006", (4, 10)),
        ("a007", "Cybersecurity Report", "c007", (4, 15)),
        ("a008", "Cloud Deployment", "c008", (4, 20)),
        ("a009", "Python Homework 2", "c001", (4, 25)),
        ("a010", "Data Science Final Project", "c002", (4, 30)),
    ];

    rows.iter()
        .map(|&(id, title, course, (month, day))| Assignment {
            assignment_id: id.to_string(),
            title: title.to_string(),
            course_id: course.to_string(),
            due_date: utc_date(2025, month, day),
            max_score: 100.0,
        })
        .collect()
}

pub fn submissions() -> Vec<Submission> {
    let rows: [(&str, &str, (u32, u32), f64, &str); 12] = [
        ("stu001", "a001", (3, 10), 85.0, "Good work"),
        ("stu002", "a002", (3, 18), 90.0, "Excellent"),
        ("stu003", "a003", (3, 22), 75.0, "Needs improvement"),
        ("stu004", "a004", (3, 28), 88.0, "Well done"),
        ("stu005", "a005", (4, 2), 92.0, "Great job"),
        ("stu006", "a006", (4, 8), 80.0, "Good effort"),
        ("stu007", "a007", (4, 12), 78.0, "Satisfactory"),
        ("stu008", "a008", (4, 18), 95.0, "Outstanding"),
        ("stu009", "a009", (4, 22), 82.0, "Good job"),
        ("stu010", "a010", (4, 29), 89.0, "Very good"),
        ("stu011", "a001", (3, 11), 84.0, ""),
        ("stu012", "a002", (3, 19), 91.0, ""),
    ];

    rows.iter()
        .enumerate()
        .map(|(i, &(student, assignment, (month, day), grade, feedback))| Submission {
            submission_id: format!("s{:03}", i + 1),
            student_id: student.to_string(),
            assignment_id: assignment.to_string(),
            submission_date: utc_date(2025, month, day),
            file_url: format!("submit{}.pdf", i + 1),
            grade,
            feedback: feedback.to_string(),
        })
        .collect()
}

/// Delete every document from every collection, keeping collections and indexes
pub fn reset_collections<S: Storage>(db: &DatabaseCore<S>) -> Result<u64> {
    let mut removed = 0;
    for name in db.list_collection_names() {
        let deleted = db.collection(&name)?.delete_many(&json!({}))?;
        tracing::debug!(collection = %name, deleted, "collection cleared");
        removed += deleted;
    }
    Ok(removed)
}

fn insert_all<S: Storage, R: Record>(db: &DatabaseCore<S>, records: &[R]) -> Result<u64> {
    let documents = records
        .iter()
        .map(R::to_document)
        .collect::<Result<Vec<_>>>()?;
    let result = db.collection(R::COLLECTION)?.insert_many(documents)?;
    tracing::info!(collection = R::COLLECTION, inserted = result.inserted_count, "sample data inserted");
    Ok(result.inserted_count as u64)
}

/// Clear all collections and insert the fixed sample data
///
/// The first failing insert aborts the run.
pub fn seed<S: Storage>(db: &DatabaseCore<S>, reference_time: DateTime<Utc>) -> Result<SeedSummary> {
    let removed = reset_collections(db)?;
    if removed > 0 {
        tracing::info!(removed, "existing documents removed before seeding");
    }

    insert_all(db, &users())?;
    insert_all(db, &courses(reference_time))?;
    insert_all(db, &enrollments())?;
    insert_all(db, &lessons())?;
    insert_all(db, &assignments())?;
    insert_all(db, &submissions())?;

    let mut summary = SeedSummary::default();
    for name in COLLECTIONS {
        let count = db.collection(name)?.count_documents(&json!({}))?;
        summary.counts.push((name.to_string(), count));
    }
    Ok(summary)
}

/// Users grouped by role, in first-seen order
pub fn user_role_counts<S: Storage>(db: &DatabaseCore<S>) -> Result<Vec<RoleCount>> {
    let rows = db
        .collection("users")?
        .aggregate(&json!([{"$group": {"_id": "$role", "count": {"$sum": 1}}}]))?;
    rows.into_iter()
        .map(|row| Ok(serde_json::from_value(row)?))
        .collect()
}

/// Write the first five users and all courses, without `_id`, as pretty JSON
pub fn export_sample<S: Storage>(db: &DatabaseCore<S>, path: &Path) -> Result<Value> {
    let no_id = FindOptions::new().with_projection([("_id", 0)]);
    let users = db
        .collection("users")?
        .find_with_options(&json!({}), &no_id.clone().with_limit(5))?;
    let courses = db
        .collection("courses")?
        .find_with_options(&json!({}), &no_id)?;
    let sample = json!({ "users": users, "courses": courses });

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(&sample)?)?;
    tracing::info!(path = %path.display(), "sample data exported");
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_sizes() {
        assert_eq!(users().len(), 20);
        assert_eq!(courses(utc_date(2025, 1, 1)).len(), 8);
        assert_eq!(enrollments().len(), 15);
        assert_eq!(lessons().len(), 25);
        assert_eq!(assignments().len(), 10);
        assert_eq!(submissions().len(), 12);
    }

    #[test]
    fn test_student_pattern() {
        let users = users();
        assert_eq!(users[0].user_id, "stu001");
        assert_eq!(users[0].date_joined, utc_date(2025, 1, 15));
        assert_eq!(users[14].email, "student15@example.com");
        assert_eq!(users[14].profile.bio, "Advanced learner");
        assert_eq!(users[15].user_id, "inst001");
        assert_eq!(users[15].role, Role::Instructor);
        assert_eq!(users.iter().filter(|u| u.role == Role::Student).count(), 15);
    }

    #[test]
    fn test_enrollment_pattern() {
        let enrollments = enrollments();
        assert_eq!(enrollments[8].course_id, "c001");
        assert_eq!(enrollments[14].course_id, "c007");
        let completed: Vec<_> = enrollments
            .iter()
            .filter(|e| e.is_completed)
            .map(|e| e.enrollment_id.as_str())
            .collect();
        assert_eq!(completed, vec!["e004", "e012", "e014"]);
    }

    #[test]
    fn test_lessons_split_between_two_courses() {
        let lessons = lessons();
        assert_eq!(lessons.iter().filter(|l| l.course_id == "c001").count(), 3);
        assert_eq!(lessons[24].order, 25);
    }
}
