// eduhub-core/src/query_planner.rs
//! Index selection for `find`, `count_documents` and `explain`

use std::ops::Bound;

use serde_json::{Map, Value};

use crate::error::{EduHubError, Result};
use crate::index::{Index, IndexKey, IndexManager, IndexProbe};
use crate::query::operators::is_operator_object;
use crate::query::TextSearch;

/// Key bounds used to probe an ordered index
#[derive(Debug, Clone, PartialEq)]
pub enum IndexBounds {
    /// Union of exact keys (`$eq`, `$in`, full compound equality)
    Exact(Vec<IndexKey>),
    /// Leading components of a compound key
    Prefix(Vec<IndexKey>),
    Range(Bound<IndexKey>, Bound<IndexKey>),
}

/// Chosen access path
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    CollectionScan,
    IndexScan { index: String, bounds: IndexBounds },
    TextSearch { index: String, terms: Vec<String> },
}

impl QueryPlan {
    /// Stage name as reported by `explain`
    pub fn stage(&self) -> &'static str {
        match self {
            QueryPlan::CollectionScan => "COLLSCAN",
            QueryPlan::IndexScan { .. } => "IXSCAN",
            QueryPlan::TextSearch { .. } => "TEXT",
        }
    }

    pub fn index_name(&self) -> Option<&str> {
        match self {
            QueryPlan::CollectionScan => None,
            QueryPlan::IndexScan { index, .. } | QueryPlan::TextSearch { index, .. } => {
                Some(index.as_str())
            }
        }
    }

    /// Describe the winning plan as JSON
    pub fn to_json(&self) -> Value {
        let mut plan = Map::new();
        plan.insert("stage".to_string(), Value::from(self.stage()));
        if let Some(name) = self.index_name() {
            plan.insert("indexName".to_string(), Value::from(name));
        }
        if let QueryPlan::TextSearch { terms, .. } = self {
            plan.insert("terms".to_string(), Value::from(terms.clone()));
        }
        Value::Object(plan)
    }
}

/// Probe the chosen index; `None` for a collection scan
pub fn execute_plan(plan: &QueryPlan, indexes: &IndexManager) -> Result<Option<IndexProbe>> {
    let lookup = |name: &str| -> Result<&Index> {
        indexes
            .get(name)
            .ok_or_else(|| EduHubError::IndexError(format!("Index not found: {}", name)))
    };

    match plan {
        QueryPlan::CollectionScan => Ok(None),
        QueryPlan::TextSearch { index, terms } => Ok(Some(lookup(index)?.text_search(terms))),
        QueryPlan::IndexScan { index, bounds } => {
            let index = lookup(index)?;
            let probe = match bounds {
                IndexBounds::Exact(keys) => {
                    let mut merged = IndexProbe::default();
                    for key in keys {
                        let part = index.lookup(key);
                        merged.keys_examined += part.keys_examined;
                        for id in part.ids {
                            if !merged.ids.contains(&id) {
                                merged.ids.push(id);
                            }
                        }
                    }
                    merged
                }
                IndexBounds::Prefix(prefix) => index.lookup_prefix(prefix),
                IndexBounds::Range(lower, upper) => index.range(lower.clone(), upper.clone()),
            };
            Ok(Some(probe))
        }
    }
}

/// Equality value of a condition (`v` or `{"$eq": v}`), excluding array literals
fn equality_value(condition: &Value) -> Option<&Value> {
    let value = if is_operator_object(condition) {
        let obj = condition.as_object()?;
        if obj.len() != 1 {
            return None;
        }
        obj.get("$eq")?
    } else {
        condition
    };
    if value.is_array() {
        None
    } else {
        Some(value)
    }
}

fn in_values(condition: &Value) -> Option<Vec<IndexKey>> {
    if !is_operator_object(condition) {
        return None;
    }
    let obj = condition.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    let values = obj.get("$in")?.as_array()?;
    Some(values.iter().map(IndexKey::from).collect())
}

fn range_bounds(condition: &Value) -> Option<(Bound<IndexKey>, Bound<IndexKey>)> {
    if !is_operator_object(condition) {
        return None;
    }
    let obj = condition.as_object()?;
    let mut lower = Bound::Unbounded;
    let mut upper = Bound::Unbounded;
    for (op, value) in obj {
        let key = IndexKey::from(value);
        match op.as_str() {
            "$gt" => lower = Bound::Excluded(key),
            "$gte" => lower = Bound::Included(key),
            "$lt" => upper = Bound::Excluded(key),
            "$lte" => upper = Bound::Included(key),
            _ => return None,
        }
    }
    Some((lower, upper))
}

/// Candidate plan for one ordered index, with a preference score
fn plan_for_index(index: &Index, filter: &Map<String, Value>) -> Option<(u32, IndexBounds)> {
    let fields = index.spec.fields();

    let mut prefix = Vec::new();
    for field in &fields {
        match filter.get(*field).and_then(equality_value) {
            Some(value) => prefix.push(IndexKey::from(value)),
            None => break,
        }
    }

    if !prefix.is_empty() {
        let score = 10 * prefix.len() as u32;
        let bounds = if fields.len() == 1 {
            IndexBounds::Exact(prefix)
        } else if prefix.len() == fields.len() {
            IndexBounds::Exact(vec![IndexKey::Compound(prefix)])
        } else {
            IndexBounds::Prefix(prefix)
        };
        return Some((score, bounds));
    }

    if fields.len() != 1 {
        return None;
    }
    let condition = filter.get(fields[0])?;
    if let Some(keys) = in_values(condition) {
        return Some((5, IndexBounds::Exact(keys)));
    }
    range_bounds(condition).map(|(lower, upper)| (1, IndexBounds::Range(lower, upper)))
}

/// Pick the access path for a filter
///
/// `$text` always uses the text index; otherwise the ordered index with the
/// longest equality prefix wins, then `$in`, then a single-field range.
pub fn choose_plan(
    filter: &Value,
    text: Option<&TextSearch>,
    indexes: &IndexManager,
) -> Result<QueryPlan> {
    if let Some(text) = text {
        let index = indexes.text_index().ok_or_else(|| {
            EduHubError::InvalidQuery("text index required for $text query".to_string())
        })?;
        return Ok(QueryPlan::TextSearch {
            index: index.name().to_string(),
            terms: text.terms.clone(),
        });
    }

    let Some(filter_obj) = filter.as_object() else {
        return Ok(QueryPlan::CollectionScan);
    };

    let mut best: Option<(u32, String, IndexBounds)> = None;
    for index in indexes.iter().filter(|i| !i.spec.is_text()) {
        if let Some((score, bounds)) = plan_for_index(index, filter_obj) {
            if best.as_ref().map(|(s, _, _)| score > *s).unwrap_or(true) {
                best = Some((score, index.name().to_string(), bounds));
            }
        }
    }

    Ok(match best {
        Some((_, index, bounds)) => QueryPlan::IndexScan { index, bounds },
        None => QueryPlan::CollectionScan,
    })
}
