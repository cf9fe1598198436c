// eduhub-cli/src/indexes.rs
//! Duplicate-email cleanup, index creation and before/after plan statistics

use std::time::{Duration, Instant};

use eduhub_core::{DatabaseCore, Storage};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;

/// One index the application relies on
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub collection: &'static str,
    pub keys: Value,
    pub unique: bool,
}

pub fn index_definitions() -> Vec<IndexDefinition> {
    fn def(collection: &'static str, keys: Value, unique: bool) -> IndexDefinition {
        IndexDefinition {
            collection,
            keys,
            unique,
        }
    }
    vec![
        def("users", json!({"email": 1}), true),
        def("users", json!({"userId": 1}), false),
        def("courses", json!({"title": "text", "category": 1}), false),
        def("courses", json!({"tags": 1}), false),
        def("assignments", json!({"dueDate": 1}), false),
        def("enrollments", json!({"studentId": 1, "courseId": 1}), false),
    ]
}

#[derive(Debug, Deserialize)]
struct EmailGroup {
    #[serde(rename = "_id")]
    email: Value,
    ids: Vec<Value>,
}

/// Delete every user sharing an email with an earlier user
///
/// Within each duplicate group the first document in storage order is kept.
/// Returns the number of documents removed.
pub fn remove_duplicate_emails<S: Storage>(db: &DatabaseCore<S>) -> Result<u64> {
    let users = db.collection("users")?;
    let groups = users.aggregate(&json!([
        {"$group": {"_id": "$email", "ids": {"$push": "$_id"}, "count": {"$sum": 1}}},
        {"$match": {"count": {"$gt": 1}}}
    ]))?;

    let mut removed = 0;
    for group in groups {
        let group: EmailGroup = serde_json::from_value(group)?;
        let extra = group.ids.get(1..).unwrap_or_default();
        let deleted = users.delete_many(&json!({"_id": {"$in": extra}}))?;
        tracing::info!(email = %group.email, deleted, "duplicate users removed");
        removed += deleted;
    }
    Ok(removed)
}

/// Create every index in [`index_definitions`]; returns `collection.index` names
///
/// Existing identical indexes are kept, so this is safe to repeat.
pub fn create_indexes<S: Storage>(db: &DatabaseCore<S>) -> Result<Vec<String>> {
    let mut created = Vec::new();
    for def in index_definitions() {
        let name = db.collection(def.collection)?.create_index(&def.keys, def.unique)?;
        tracing::info!(collection = def.collection, index = %name, unique = def.unique, "index ready");
        created.push(format!("{}.{}", def.collection, name));
    }
    Ok(created)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BeforeIndexes,
    AfterIndexes,
}

/// Plan statistics for one query shape
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMeasurement {
    pub query: &'static str,
    pub collection: &'static str,
    pub filter: Value,
    pub stage: String,
    pub index_name: Option<String>,
    pub docs_examined: u64,
    pub keys_examined: u64,
    pub returned: u64,
    pub elapsed: Duration,
}

fn probes(phase: Phase) -> Vec<(&'static str, &'static str, Value)> {
    let title_search = match phase {
        Phase::BeforeIndexes => json!({"title": {"$regex": "Python"}}),
        Phase::AfterIndexes => json!({"$text": {"$search": "Python"}}),
    };
    vec![
        ("course title search", "courses", title_search),
        (
            "enrollment by student and course",
            "enrollments",
            json!({"studentId": "stu004", "courseId": "c004"}),
        ),
        (
            "assignments due before April",
            "assignments",
            json!({"dueDate": {"$lt": {"$date": "2025-04-01T00:00:00Z"}}}),
        ),
    ]
}

fn stat(explain: &Value, key: &str) -> u64 {
    explain["executionStats"][key].as_u64().unwrap_or(0)
}

/// Explain each probe query and record what the planner did
pub fn measure<S: Storage>(db: &DatabaseCore<S>, phase: Phase) -> Result<Vec<QueryMeasurement>> {
    let mut results = Vec::new();
    for (query, collection, filter) in probes(phase) {
        let coll = db.collection(collection)?;
        let start = Instant::now();
        let explain = coll.explain(&filter)?;
        let elapsed = start.elapsed();

        let plan = &explain["queryPlanner"]["winningPlan"];
        let measurement = QueryMeasurement {
            query,
            collection,
            filter,
            stage: plan["stage"].as_str().unwrap_or("UNKNOWN").to_string(),
            index_name: plan["indexName"].as_str().map(str::to_string),
            docs_examined: stat(&explain, "totalDocsExamined"),
            keys_examined: stat(&explain, "totalKeysExamined"),
            returned: stat(&explain, "nReturned"),
            elapsed,
        };
        tracing::info!(
            phase = ?phase,
            query,
            stage = %measurement.stage,
            docs_examined = measurement.docs_examined,
            elapsed_us = elapsed.as_micros() as u64,
            "query measured"
        );
        results.push(measurement);
    }
    Ok(results)
}

/// Before/after measurements, paired by query
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub before: Vec<QueryMeasurement>,
    pub after: Vec<QueryMeasurement>,
}

impl PerformanceReport {
    pub fn pairs(&self) -> impl Iterator<Item = (&QueryMeasurement, &QueryMeasurement)> {
        self.before
            .iter()
            .filter_map(|b| self.after.iter().find(|a| a.query == b.query).map(|a| (b, a)))
    }

    pub fn total_docs_examined(&self) -> (u64, u64) {
        let sum = |ms: &[QueryMeasurement]| -> u64 { ms.iter().map(|m| m.docs_examined).sum() };
        (sum(&self.before), sum(&self.after))
    }

    pub fn log(&self) {
        for (before, after) in self.pairs() {
            tracing::info!(
                query = before.query,
                before_stage = %before.stage,
                after_stage = %after.stage,
                before_docs = before.docs_examined,
                after_docs = after.docs_examined,
                "index effect"
            );
        }
    }
}

/// Measure, clean duplicates, create indexes, measure again
pub fn optimize<S: Storage>(db: &DatabaseCore<S>) -> Result<PerformanceReport> {
    let before = measure(db, Phase::BeforeIndexes)?;
    let removed = remove_duplicate_emails(db)?;
    if removed > 0 {
        tracing::warn!(removed, "duplicate emails removed before creating the unique index");
    }
    create_indexes(db)?;
    let after = measure(db, Phase::AfterIndexes)?;
    let report = PerformanceReport { before, after };
    report.log();
    Ok(report)
}
