// catalogue_tests.rs
// Query catalogue and index measurements over the seeded sample data

use eduhub::config::utc_date;
use eduhub::indexes::{self, Phase};
use eduhub::{queries, schemas, seed, AppConfig};
use eduhub_core::{DatabaseCore, MemoryStorage};

fn seeded() -> DatabaseCore<MemoryStorage> {
    let db = DatabaseCore::in_memory();
    schemas::define_collections(&db).unwrap();
    seed::seed(&db, AppConfig::default().reference_time).unwrap();
    db
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_filter_reads() {
    let db = seeded();

    assert_eq!(queries::active_students(&db).unwrap().len(), 15);
    assert_eq!(queries::courses_by_category(&db, "Programming").unwrap().len(), 2);

    let mid = queries::courses_in_price_range(&db, 50.0, 200.0).unwrap();
    assert_eq!(mid.len(), 7);
    assert!(mid.iter().all(|c| c.title != "Intro to Python"));

    let recent = queries::recent_users(&db, AppConfig::default().reference_time, 180).unwrap();
    assert_eq!(recent.len(), 20);
    let recent = queries::recent_users(&db, utc_date(2025, 7, 20), 180).unwrap();
    assert_eq!(recent.len(), 9);

    let tagged = queries::courses_with_tag(&db, "python").unwrap();
    assert_eq!(tagged.len(), 4);

    let found = queries::search_courses_by_title(&db, "python").unwrap();
    let ids: Vec<_> = found.iter().map(|c| c.course_id.as_str()).collect();
    assert_eq!(ids, vec!["c001", "c002", "c004"]);
}

#[test]
fn test_text_search_needs_index() {
    let db = seeded();
    assert!(queries::text_search_courses(&db, "Python").is_err());
    indexes::create_indexes(&db).unwrap();
    assert_eq!(queries::text_search_courses(&db, "Python").unwrap().len(), 3);
}

#[test]
fn test_join_reads() {
    let db = seeded();

    let published = queries::published_courses_with_instructor(&db).unwrap();
    assert_eq!(published.len(), 8);
    assert_eq!(published[0].title, "Intro to Python");
    assert_eq!(published[0].instructor.first_name, "Dr. Bob");

    let enrolled = queries::students_in_course(&db, "c001").unwrap();
    let rows: Vec<_> = enrolled
        .iter()
        .map(|e| (e.student.first_name.as_str(), e.progress))
        .collect();
    assert_eq!(rows, vec![("Alice", 75.0), ("Ivy", 10.0)]);
}

#[test]
fn test_completion_rates() {
    let db = seeded();
    let rates = queries::completion_rates(&db).unwrap();
    assert_eq!(rates.len(), 8);
    let rate = |course: &str| {
        rates
            .iter()
            .find(|r| r.course_id == course)
            .map(|r| r.completion_rate)
            .unwrap()
    };
    // c006 has two enrollments, one completed
    assert!(approx(rate("c006"), 50.0));
    assert!(approx(rate("c004"), 100.0));
    assert!(approx(rate("c001"), 0.0));
}

#[test]
fn test_enrollment_reports() {
    let db = seeded();

    let averages = queries::average_enrollments_by_category(&db).unwrap();
    assert_eq!(averages.len(), 5);
    let cloud = averages.iter().find(|a| a.category == "Cloud Computing").unwrap();
    assert!(approx(cloud.avg_enrollments, 1.0));
    let programming = averages.iter().find(|a| a.category == "Programming").unwrap();
    assert!(approx(programming.avg_enrollments, 2.0));

    let trend = queries::monthly_enrollment_trend(&db).unwrap();
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0].month, "2025-02");
    assert_eq!(trend[0].count, 15);

    let popular = queries::popular_categories(&db, 3).unwrap();
    assert_eq!(popular.len(), 3);
    assert!(popular.iter().all(|p| p.enroll_count == 4));
}

#[test]
fn test_grades_and_instructors() {
    let db = seeded();

    let top = queries::top_students_by_grade(&db, 5).unwrap();
    let ids: Vec<_> = top.iter().map(|s| s.student_id.as_str()).collect();
    assert_eq!(ids, vec!["stu008", "stu005", "stu012", "stu002", "stu010"]);
    assert_eq!(top[0].student.first_name, "Hank");

    let stats = queries::instructor_stats(&db).unwrap();
    assert_eq!(stats.len(), 5);
    let inst001 = stats.iter().find(|s| s.instructor_id == "inst001").unwrap();
    assert_eq!(inst001.total_students, 4);
    assert!((inst001.total_revenue - 299.96).abs() < 1e-6);
    let inst005 = stats.iter().find(|s| s.instructor_id == "inst005").unwrap();
    assert_eq!(inst005.total_students, 1);
}

#[test]
fn test_indexes_reduce_documents_examined() {
    let db = seeded();

    let before = indexes::measure(&db, Phase::BeforeIndexes).unwrap();
    assert!(before.iter().all(|m| m.stage == "COLLSCAN"));
    assert_eq!(before[0].docs_examined, 8);
    assert_eq!(before[1].docs_examined, 15);
    assert_eq!(before[2].docs_examined, 10);

    let report = indexes::optimize(&db).unwrap();
    let after = &report.after;
    assert_eq!(after[0].stage, "TEXT");
    assert_eq!(after[0].returned, 3);
    assert_eq!(after[1].stage, "IXSCAN");
    assert_eq!(after[1].index_name.as_deref(), Some("studentId_1_courseId_1"));
    assert_eq!(after[1].docs_examined, 1);
    assert_eq!(after[2].index_name.as_deref(), Some("dueDate_1"));
    assert_eq!(after[2].returned, 4);

    let (total_before, total_after) = report.total_docs_examined();
    assert!(total_after < total_before);
    assert_eq!(report.pairs().count(), 3);
}
