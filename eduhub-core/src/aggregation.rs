// src/aggregation.rs
// Aggregation pipeline implementation

pub mod expression;

use ahash::AHashMap;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{EduHubError, Result};
use crate::find_options::apply_sort;
use crate::query::matches_filter;
use crate::value_utils::{
    as_number, canonical_json_string, compare_values_total, get_nested_value,
    remove_nested_value, set_nested_value, values_equal,
};
pub use expression::Expression;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn agg_err(msg: impl Into<String>) -> EduHubError {
    EduHubError::AggregationError(msg.into())
}

/// Parse a `"$field"` reference into a plain path
fn parse_field_path(value: &Value, op_name: &str) -> Result<String> {
    match value.as_str() {
        Some(s) if s.starts_with('$') && s.len() > 1 => Ok(s[1..].to_string()),
        Some(_) => Err(agg_err(format!(
            "{} field path must start with $",
            op_name
        ))),
        None => Err(agg_err(format!("{} must be a field path", op_name))),
    }
}

/// Single-key stage or accumulator object
fn single_entry<'a>(spec: &'a Value, what: &str) -> Result<(&'a String, &'a Value)> {
    let obj = spec
        .as_object()
        .ok_or_else(|| agg_err(format!("{} must be an object", what)))?;
    if obj.len() != 1 {
        return Err(agg_err(format!("{} must have exactly one operator", what)));
    }
    obj.iter()
        .next()
        .ok_or_else(|| agg_err(format!("{} must have exactly one operator", what)))
}

/// Documents of other collections, used by `$lookup`
pub trait LookupSource {
    /// All documents of `collection`, empty when it does not exist
    fn lookup_documents(&self, collection: &str) -> Result<Vec<Value>>;
}

impl LookupSource for HashMap<String, Vec<Value>> {
    fn lookup_documents(&self, collection: &str) -> Result<Vec<Value>> {
        Ok(self.get(collection).cloned().unwrap_or_default())
    }
}

/// Aggregation pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

/// Pipeline stage
#[derive(Debug, Clone)]
pub enum Stage {
    Match(MatchStage),
    Project(ProjectStage),
    Group(GroupStage),
    Sort(SortStage),
    Limit(LimitStage),
    Skip(SkipStage),
    Lookup(LookupStage),
    Unwind(UnwindStage),
    Count(CountStage),
}

/// $match stage - filter documents
#[derive(Debug, Clone)]
pub struct MatchStage {
    filter: Value,
}

/// $project stage - reshape documents
#[derive(Debug, Clone)]
pub struct ProjectStage {
    fields: Vec<(String, ProjectField)>,
    include_mode: bool,
}

#[derive(Debug, Clone)]
pub enum ProjectField {
    Include,
    Exclude,
    Computed(Expression),
}

/// $group stage - group documents and compute aggregates
#[derive(Debug, Clone)]
pub struct GroupStage {
    id: Expression,
    accumulators: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorOp {
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    Push,
    AddToSet,
}

#[derive(Debug, Clone)]
pub struct Accumulator {
    op: AccumulatorOp,
    expr: Expression,
}

/// $sort stage - sort documents
#[derive(Debug, Clone)]
pub struct SortStage {
    fields: Vec<(String, i32)>,
}

/// $limit stage - limit number of documents
#[derive(Debug, Clone)]
pub struct LimitStage {
    limit: usize,
}

/// $skip stage - skip documents
#[derive(Debug, Clone)]
pub struct SkipStage {
    skip: usize,
}

/// $lookup stage - left outer join with another collection
#[derive(Debug, Clone)]
pub struct LookupStage {
    from: String,
    local_field: String,
    foreign_field: String,
    as_field: String,
}

/// $unwind stage - one output document per array element
#[derive(Debug, Clone)]
pub struct UnwindStage {
    path: String,
    preserve_null_and_empty: bool,
}

/// $count stage - a single document holding the number of inputs
#[derive(Debug, Clone)]
pub struct CountStage {
    field: String,
}

impl Pipeline {
    /// Create pipeline from JSON array
    pub fn from_json(pipeline_json: &Value) -> Result<Self> {
        let Value::Array(stages_array) = pipeline_json else {
            return Err(agg_err("Pipeline must be an array"));
        };
        if stages_array.is_empty() {
            return Err(agg_err("Pipeline cannot be empty"));
        }

        let stages = stages_array
            .iter()
            .map(Stage::from_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(Pipeline { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Collections referenced by `$lookup` stages
    pub fn foreign_collections(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter_map(|s| match s {
                Stage::Lookup(l) => Some(l.from.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Execute pipeline on documents
    pub fn execute(&self, mut docs: Vec<Value>, source: &dyn LookupSource) -> Result<Vec<Value>> {
        for stage in &self.stages {
            docs = stage.execute(docs, source)?;
        }
        Ok(docs)
    }
}

impl Stage {
    /// Parse stage from JSON
    fn from_json(stage_json: &Value) -> Result<Self> {
        if !stage_json.is_object() {
            return Err(agg_err("Stage must be an object"));
        }
        let (stage_name, stage_spec) = single_entry(stage_json, "Stage")?;

        match stage_name.as_str() {
            "$match" => Ok(Stage::Match(MatchStage::from_json(stage_spec)?)),
            "$project" => Ok(Stage::Project(ProjectStage::from_json(stage_spec)?)),
            "$group" => Ok(Stage::Group(GroupStage::from_json(stage_spec)?)),
            "$sort" => Ok(Stage::Sort(SortStage::from_json(stage_spec)?)),
            "$limit" => Ok(Stage::Limit(LimitStage::from_json(stage_spec)?)),
            "$skip" => Ok(Stage::Skip(SkipStage::from_json(stage_spec)?)),
            "$lookup" => Ok(Stage::Lookup(LookupStage::from_json(stage_spec)?)),
            "$unwind" => Ok(Stage::Unwind(UnwindStage::from_json(stage_spec)?)),
            "$count" => Ok(Stage::Count(CountStage::from_json(stage_spec)?)),
            _ => Err(agg_err(format!("Unknown pipeline stage: {}", stage_name))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Project(_) => "$project",
            Stage::Group(_) => "$group",
            Stage::Sort(_) => "$sort",
            Stage::Limit(_) => "$limit",
            Stage::Skip(_) => "$skip",
            Stage::Lookup(_) => "$lookup",
            Stage::Unwind(_) => "$unwind",
            Stage::Count(_) => "$count",
        }
    }

    /// Execute this stage
    fn execute(&self, docs: Vec<Value>, source: &dyn LookupSource) -> Result<Vec<Value>> {
        match self {
            Stage::Match(stage) => stage.execute(docs),
            Stage::Project(stage) => stage.execute(docs),
            Stage::Group(stage) => stage.execute(docs),
            Stage::Sort(stage) => stage.execute(docs),
            Stage::Limit(stage) => Ok(docs.into_iter().take(stage.limit).collect()),
            Stage::Skip(stage) => Ok(docs.into_iter().skip(stage.skip).collect()),
            Stage::Lookup(stage) => stage.execute(docs, source),
            Stage::Unwind(stage) => stage.execute(docs),
            Stage::Count(stage) => stage.execute(docs),
        }
    }
}

impl MatchStage {
    fn from_json(spec: &Value) -> Result<Self> {
        if !spec.is_object() {
            return Err(agg_err("$match must be an object"));
        }
        if spec.get("$text").is_some() {
            return Err(agg_err("$text is not allowed in $match"));
        }
        Ok(MatchStage {
            filter: spec.clone(),
        })
    }

    fn execute(&self, docs: Vec<Value>) -> Result<Vec<Value>> {
        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            if matches_filter(&doc, &self.filter)? {
                results.push(doc);
            }
        }
        Ok(results)
    }
}

impl ProjectStage {
    fn from_json(spec: &Value) -> Result<Self> {
        let Value::Object(obj) = spec else {
            return Err(agg_err("$project must be an object"));
        };
        if obj.is_empty() {
            return Err(agg_err("$project requires at least one field"));
        }

        let mut fields = Vec::new();
        Self::collect_fields(obj, "", &mut fields)?;

        let include_mode = fields
            .iter()
            .any(|(_, f)| !matches!(f, ProjectField::Exclude));
        if include_mode {
            if let Some((field, _)) = fields
                .iter()
                .find(|(field, f)| matches!(f, ProjectField::Exclude) && field != "_id")
            {
                return Err(agg_err(format!(
                    "Cannot do exclusion on field {} in inclusion projection",
                    field
                )));
            }
        }

        Ok(ProjectStage {
            fields,
            include_mode,
        })
    }

    /// Flatten `{"a": {"b": 1}}` into `a.b`
    fn collect_fields(
        obj: &Map<String, Value>,
        prefix: &str,
        out: &mut Vec<(String, ProjectField)>,
    ) -> Result<()> {
        for (key, value) in obj {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            let field = match value {
                Value::Bool(b) => {
                    if *b {
                        ProjectField::Include
                    } else {
                        ProjectField::Exclude
                    }
                }
                Value::Number(n) => {
                    if n.as_f64() == Some(0.0) {
                        ProjectField::Exclude
                    } else {
                        ProjectField::Include
                    }
                }
                Value::Object(inner) if inner.is_empty() => {
                    return Err(agg_err(format!(
                        "An empty sub-projection is not allowed for field {}",
                        path
                    )))
                }
                Value::Object(inner) if !inner.keys().any(|k| k.starts_with('$')) => {
                    Self::collect_fields(inner, &path, out)?;
                    continue;
                }
                other => ProjectField::Computed(Expression::parse(other)?),
            };
            out.push((path, field));
        }
        Ok(())
    }

    fn execute(&self, docs: Vec<Value>) -> Result<Vec<Value>> {
        docs.iter().map(|doc| self.project_document(doc)).collect()
    }

    fn project_document(&self, doc: &Value) -> Result<Value> {
        if !self.include_mode {
            let mut result = doc.clone();
            for (field, _) in &self.fields {
                remove_nested_value(&mut result, field);
            }
            return Ok(result);
        }

        let mut result = Map::new();
        let id_listed = self.fields.iter().any(|(field, _)| field == "_id");
        if !id_listed {
            if let Some(id) = doc.get("_id") {
                result.insert("_id".to_string(), id.clone());
            }
        }

        let Value::Object(source) = doc else {
            return Ok(Value::Object(result));
        };
        let mut result = Value::Object(result);
        for (field, action) in &self.fields {
            match action {
                ProjectField::Include => {
                    let parts: Vec<&str> = field.split('.').collect();
                    if let Value::Object(target) = &mut result {
                        include_path(target, source, &parts);
                    }
                }
                ProjectField::Computed(expr) => {
                    if let Some(value) = expr.evaluate(doc)? {
                        set_nested_value(&mut result, field, value)?;
                    }
                }
                ProjectField::Exclude => {}
            }
        }
        Ok(result)
    }
}

/// Copy one inclusion path from `source` into `target`
///
/// Arrays along the path are projected element by element; non-document
/// elements drop out, as they have no field to include.
fn include_path(target: &mut Map<String, Value>, source: &Map<String, Value>, parts: &[&str]) {
    let Some((first, rest)) = parts.split_first() else {
        return;
    };
    let Some(value) = source.get(*first) else {
        return;
    };
    if rest.is_empty() {
        target.insert(first.to_string(), value.clone());
        return;
    }

    match value {
        Value::Object(inner) => {
            let slot = target
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(slot) = slot {
                include_path(slot, inner, rest);
            }
        }
        Value::Array(items) => {
            let slot = target
                .entry(first.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(out) = slot else {
                return;
            };
            for (pos, inner) in items.iter().filter_map(Value::as_object).enumerate() {
                if out.len() <= pos {
                    out.push(Value::Object(Map::new()));
                }
                if let Value::Object(element) = &mut out[pos] {
                    include_path(element, inner, rest);
                }
            }
        }
        _ => {}
    }
}

impl GroupStage {
    fn from_json(spec: &Value) -> Result<Self> {
        let Value::Object(obj) = spec else {
            return Err(agg_err("$group must be an object"));
        };
        let id_value = obj
            .get("_id")
            .ok_or_else(|| agg_err("Group stage must have _id field"))?;
        let id = Expression::parse(id_value)?;

        let mut accumulators = Vec::new();
        for (field, acc_spec) in obj {
            if field == "_id" {
                continue;
            }
            accumulators.push((field.clone(), Accumulator::from_json(acc_spec)?));
        }

        Ok(GroupStage { id, accumulators })
    }

    fn execute(&self, docs: Vec<Value>) -> Result<Vec<Value>> {
        // groups come out in order of first appearance
        let mut positions: AHashMap<String, usize> = AHashMap::new();
        let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();

        for doc in docs {
            let key = self.id.evaluate(&doc)?.unwrap_or(Value::Null);
            let canonical = canonical_json_string(&key);
            match positions.get(&canonical) {
                Some(&pos) => groups[pos].1.push(doc),
                None => {
                    positions.insert(canonical, groups.len());
                    groups.push((key, vec![doc]));
                }
            }
        }

        let mut results = Vec::with_capacity(groups.len());
        for (key, group_docs) in groups {
            let mut result = Map::new();
            result.insert("_id".to_string(), key);
            for (field, accumulator) in &self.accumulators {
                result.insert(field.clone(), accumulator.compute(&group_docs)?);
            }
            results.push(Value::Object(result));
        }
        Ok(results)
    }
}

impl Accumulator {
    fn from_json(spec: &Value) -> Result<Self> {
        let (op, value) = single_entry(spec, "Accumulator")?;
        let op = match op.as_str() {
            "$sum" => AccumulatorOp::Sum,
            "$avg" => AccumulatorOp::Avg,
            "$min" => AccumulatorOp::Min,
            "$max" => AccumulatorOp::Max,
            "$first" => AccumulatorOp::First,
            "$last" => AccumulatorOp::Last,
            "$push" => AccumulatorOp::Push,
            "$addToSet" => AccumulatorOp::AddToSet,
            _ => return Err(agg_err(format!("Unknown accumulator: {}", op))),
        };
        Ok(Accumulator {
            op,
            expr: Expression::parse(value)?,
        })
    }

    fn compute(&self, docs: &[Value]) -> Result<Value> {
        let mut values = Vec::with_capacity(docs.len());
        for doc in docs {
            values.push(self.expr.evaluate(doc)?);
        }

        Ok(match self.op {
            AccumulatorOp::Sum => {
                let mut sum_int: i64 = 0;
                let mut sum_float = 0.0;
                let mut has_float = false;
                for value in values.iter().flatten() {
                    if let Some(n) = value.as_i64() {
                        sum_int = sum_int.saturating_add(n);
                    } else if let Some(f) = value.as_f64() {
                        sum_float += f;
                        has_float = true;
                    }
                }
                if has_float {
                    Value::from(sum_float + sum_int as f64)
                } else {
                    Value::from(sum_int)
                }
            }
            AccumulatorOp::Avg => {
                let nums: Vec<f64> = values.iter().flatten().filter_map(as_number).collect();
                if nums.is_empty() {
                    Value::Null
                } else {
                    Value::from(nums.iter().sum::<f64>() / nums.len() as f64)
                }
            }
            AccumulatorOp::Min | AccumulatorOp::Max => {
                let want = if self.op == AccumulatorOp::Min {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                };
                values
                    .into_iter()
                    .flatten()
                    .filter(|v| !v.is_null())
                    .reduce(|best, v| {
                        if compare_values_total(&v, &best) == want {
                            v
                        } else {
                            best
                        }
                    })
                    .unwrap_or(Value::Null)
            }
            AccumulatorOp::First => values.into_iter().next().flatten().unwrap_or(Value::Null),
            AccumulatorOp::Last => values.into_iter().last().flatten().unwrap_or(Value::Null),
            AccumulatorOp::Push => Value::Array(values.into_iter().flatten().collect()),
            AccumulatorOp::AddToSet => {
                let mut set: Vec<Value> = Vec::new();
                for value in values.into_iter().flatten() {
                    if !set.iter().any(|existing| values_equal(existing, &value)) {
                        set.push(value);
                    }
                }
                Value::Array(set)
            }
        })
    }
}

impl SortStage {
    fn from_json(spec: &Value) -> Result<Self> {
        let Value::Object(obj) = spec else {
            return Err(agg_err("$sort must be an object"));
        };
        if obj.is_empty() {
            return Err(agg_err("$sort must have at least one field"));
        }

        let mut fields = Vec::with_capacity(obj.len());
        for (field, value) in obj {
            match value.as_i64() {
                Some(n @ (1 | -1)) => fields.push((field.clone(), n as i32)),
                _ => return Err(agg_err("Sort direction must be 1 or -1")),
            }
        }
        Ok(SortStage { fields })
    }

    fn execute(&self, mut docs: Vec<Value>) -> Result<Vec<Value>> {
        apply_sort(&mut docs, &self.fields);
        Ok(docs)
    }
}

impl LimitStage {
    fn from_json(spec: &Value) -> Result<Self> {
        match spec.as_u64() {
            Some(n) if n > 0 => Ok(LimitStage { limit: n as usize }),
            _ => Err(agg_err("$limit must be a positive number")),
        }
    }
}

impl SkipStage {
    fn from_json(spec: &Value) -> Result<Self> {
        match spec.as_u64() {
            Some(n) => Ok(SkipStage { skip: n as usize }),
            None => Err(agg_err("$skip must be a non-negative number")),
        }
    }
}

/// Join keys of a value: array elements individually, missing as null
fn join_keys(value: Option<&Value>) -> Vec<String> {
    match value {
        None => vec![canonical_json_string(&Value::Null)],
        Some(Value::Array(items)) if !items.is_empty() => {
            items.iter().map(canonical_json_string).collect()
        }
        Some(other) => vec![canonical_json_string(other)],
    }
}

impl LookupStage {
    fn from_json(spec: &Value) -> Result<Self> {
        if !spec.is_object() {
            return Err(agg_err("$lookup must be an object"));
        }
        let field = |name: &str| -> Result<String> {
            spec.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| agg_err(format!("$lookup requires string field '{}'", name)))
        };
        let stage = LookupStage {
            from: field("from")?,
            local_field: field("localField")?,
            foreign_field: field("foreignField")?,
            as_field: field("as")?,
        };
        if stage.as_field.is_empty() || stage.as_field.starts_with('$') {
            return Err(agg_err("$lookup 'as' must be a field name"));
        }
        Ok(stage)
    }

    fn execute(&self, docs: Vec<Value>, source: &dyn LookupSource) -> Result<Vec<Value>> {
        let foreign = source.lookup_documents(&self.from)?;

        let mut by_key: AHashMap<String, Vec<usize>> = AHashMap::new();
        for (pos, doc) in foreign.iter().enumerate() {
            for key in join_keys(get_nested_value(doc, &self.foreign_field)) {
                let slots = by_key.entry(key).or_default();
                if slots.last() != Some(&pos) {
                    slots.push(pos);
                }
            }
        }

        let mut results = Vec::with_capacity(docs.len());
        for mut doc in docs {
            let mut hits: Vec<usize> = join_keys(get_nested_value(&doc, &self.local_field))
                .iter()
                .filter_map(|key| by_key.get(key))
                .flatten()
                .copied()
                .collect();
            hits.sort_unstable();
            hits.dedup();

            let joined = hits.into_iter().map(|pos| foreign[pos].clone()).collect();
            set_nested_value(&mut doc, &self.as_field, Value::Array(joined))?;
            results.push(doc);
        }
        Ok(results)
    }
}

impl UnwindStage {
    fn from_json(spec: &Value) -> Result<Self> {
        match spec {
            Value::String(_) => Ok(UnwindStage {
                path: parse_field_path(spec, "$unwind")?,
                preserve_null_and_empty: false,
            }),
            Value::Object(obj) => {
                let path = obj
                    .get("path")
                    .ok_or_else(|| agg_err("$unwind requires a path"))?;
                let preserve = match obj.get("preserveNullAndEmptyArrays") {
                    None => false,
                    Some(Value::Bool(b)) => *b,
                    Some(_) => {
                        return Err(agg_err(
                            "$unwind preserveNullAndEmptyArrays must be a boolean",
                        ))
                    }
                };
                Ok(UnwindStage {
                    path: parse_field_path(path, "$unwind")?,
                    preserve_null_and_empty: preserve,
                })
            }
            _ => Err(agg_err("$unwind must be a field path or an object")),
        }
    }

    fn execute(&self, docs: Vec<Value>) -> Result<Vec<Value>> {
        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            let target = get_nested_value(&doc, &self.path).cloned();
            match target {
                Some(Value::Array(items)) if !items.is_empty() => {
                    for item in items {
                        let mut copy = doc.clone();
                        set_nested_value(&mut copy, &self.path, item)?;
                        results.push(copy);
                    }
                }
                Some(Value::Array(_)) => {
                    if self.preserve_null_and_empty {
                        let mut copy = doc;
                        remove_nested_value(&mut copy, &self.path);
                        results.push(copy);
                    }
                }
                None | Some(Value::Null) => {
                    if self.preserve_null_and_empty {
                        results.push(doc);
                    }
                }
                // a scalar unwinds to itself
                Some(_) => results.push(doc),
            }
        }
        Ok(results)
    }
}

impl CountStage {
    fn from_json(spec: &Value) -> Result<Self> {
        match spec.as_str() {
            Some(field) if !field.is_empty() && !field.starts_with('$') && !field.contains('.') => {
                Ok(CountStage {
                    field: field.to_string(),
                })
            }
            _ => Err(agg_err(
                "$count must be a non-empty field name without $ or .",
            )),
        }
    }

    fn execute(&self, docs: Vec<Value>) -> Result<Vec<Value>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let mut result = Map::new();
        result.insert(self.field.clone(), Value::from(docs.len() as i64));
        Ok(vec![Value::Object(result)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(pipeline: Value, docs: Vec<Value>) -> Vec<Value> {
        Pipeline::from_json(&pipeline)
            .unwrap()
            .execute(docs, &HashMap::new())
            .unwrap()
    }

    // ========== Pipeline tests ==========

    #[test]
    fn test_pipeline_not_array() {
        let err = Pipeline::from_json(&json!({"$match": {}})).unwrap_err();
        assert!(err.to_string().contains("must be an array"));
    }

    #[test]
    fn test_pipeline_empty() {
        let err = Pipeline::from_json(&json!([])).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_stage_errors() {
        assert!(Pipeline::from_json(&json!(["$match"])).is_err());
        let err = Pipeline::from_json(&json!([{"$match": {}, "$limit": 1}])).unwrap_err();
        assert!(err.to_string().contains("exactly one operator"));
        let err = Pipeline::from_json(&json!([{"$bucket": {}}])).unwrap_err();
        assert!(err.to_string().contains("Unknown pipeline stage"));
    }

    // ========== ProjectStage tests ==========

    #[test]
    fn test_project_include_with_computed() {
        let docs = vec![json!({"_id": 1, "title": "Intro", "price": 49.99, "tags": ["a", "b"]})];
        let out = run(
            json!([{"$project": {"title": 1, "tagCount": {"$size": "$tags"}}}]),
            docs,
        );
        assert_eq!(out, vec![json!({"_id": 1, "title": "Intro", "tagCount": 2})]);
    }

    #[test]
    fn test_project_nested_paths_and_id_exclusion() {
        let docs = vec![json!({"_id": 1, "student": {"firstName": "Alice", "email": "a@x"}})];
        let out = run(
            json!([{"$project": {"_id": 0, "student.firstName": 1, "course": {"name": "$student.email"}}}]),
            docs,
        );
        assert_eq!(
            out,
            vec![json!({"student": {"firstName": "Alice"}, "course": {"name": "a@x"}})]
        );
    }

    #[test]
    fn test_project_exclude() {
        let docs = vec![json!({"_id": 1, "a": 1, "b": 2})];
        assert_eq!(run(json!([{"$project": {"b": 0}}]), docs), vec![json!({"_id": 1, "a": 1})]);
    }

    #[test]
    fn test_project_mixed_modes_rejected() {
        let err = Pipeline::from_json(&json!([{"$project": {"a": 1, "b": 0}}])).unwrap_err();
        assert!(err.to_string().contains("Cannot do exclusion"));
        assert!(Pipeline::from_json(&json!([{"$project": "a"}])).is_err());
    }

    // ========== GroupStage tests ==========

    #[test]
    fn test_group_null_id() {
        let docs = vec![json!({"value": 10}), json!({"value": 20}), json!({"value": 30})];
        let out = run(json!([{"$group": {"_id": null, "total": {"$sum": "$value"}}}]), docs);
        assert_eq!(out, vec![json!({"_id": null, "total": 60})]);
    }

    #[test]
    fn test_group_missing_id() {
        let err = GroupStage::from_json(&json!({"count": {"$sum": 1}})).unwrap_err();
        assert!(err.to_string().contains("must have _id field"));
    }

    #[test]
    fn test_group_preserves_first_seen_order() {
        let docs = vec![
            json!({"city": "Budapest"}),
            json!({"city": "Pécs"}),
            json!({}),
            json!({"city": "Budapest"}),
        ];
        let out = run(json!([{"$group": {"_id": "$city", "count": {"$sum": 1}}}]), docs);
        assert_eq!(
            out,
            vec![
                json!({"_id": "Budapest", "count": 2}),
                json!({"_id": "Pécs", "count": 1}),
                json!({"_id": null, "count": 1}),
            ]
        );
    }

    #[test]
    fn test_group_completion_rate() {
        let docs = vec![
            json!({"courseId": "c001", "isCompleted": true}),
            json!({"courseId": "c001", "isCompleted": false}),
        ];
        let out = run(
            json!([
                {"$group": {
                    "_id": "$courseId",
                    "total": {"$sum": 1},
                    "completed": {"$sum": {"$cond": [{"$eq": ["$isCompleted", true]}, 1, 0]}}
                }},
                {"$project": {
                    "_id": 0,
                    "courseId": "$_id",
                    "completionRate": {"$multiply": [{"$divide": ["$completed", "$total"]}, 100]}
                }}
            ]),
            docs,
        );
        assert_eq!(out, vec![json!({"courseId": "c001", "completionRate": 50.0})]);
    }

    #[test]
    fn test_accumulators() {
        let docs = vec![
            json!({"g": 1, "v": 3, "s": "x"}),
            json!({"g": 1, "v": 1, "s": "y"}),
            json!({"g": 1, "v": 2, "s": "x"}),
            json!({"g": 1, "s": "z"}),
        ];
        let out = run(
            json!([{"$group": {
                "_id": "$g",
                "avg": {"$avg": "$v"},
                "min": {"$min": "$v"},
                "max": {"$max": "$v"},
                "first": {"$first": "$s"},
                "last": {"$last": "$v"},
                "all": {"$push": "$v"},
                "unique": {"$addToSet": "$s"}
            }}]),
            docs,
        );
        assert_eq!(
            out[0],
            json!({
                "_id": 1,
                "avg": 2.0,
                "min": 1,
                "max": 3,
                "first": "x",
                "last": null,
                "all": [3, 1, 2],
                "unique": ["x", "y", "z"]
            })
        );
    }

    #[test]
    fn test_group_by_expression() {
        let docs = vec![
            json!({"d": {"$date": "2025-01-15T00:00:00Z"}}),
            json!({"d": {"$date": "2025-02-01T00:00:00Z"}}),
            json!({"d": {"$date": "2025-02-20T00:00:00Z"}}),
        ];
        let out = run(
            json!([
                {"$group": {"_id": {"$dateToString": {"format": "%Y-%m", "date": "$d"}}, "n": {"$sum": 1}}},
                {"$sort": {"_id": 1}}
            ]),
            docs,
        );
        assert_eq!(out, vec![json!({"_id": "2025-01", "n": 1}), json!({"_id": "2025-02", "n": 2})]);
    }

    #[test]
    fn test_unknown_accumulator() {
        let err = GroupStage::from_json(&json!({"_id": null, "x": {"$median": "$v"}})).unwrap_err();
        assert!(err.to_string().contains("Unknown accumulator"));
    }

    // ========== Sort / limit / skip / count ==========

    #[test]
    fn test_sort_limit_skip() {
        let docs: Vec<Value> = (1..=5).map(|i| json!({"n": i})).collect();
        let out = run(json!([{"$sort": {"n": -1}}, {"$skip": 1}, {"$limit": 2}]), docs);
        assert_eq!(out, vec![json!({"n": 4}), json!({"n": 3})]);
        assert!(Pipeline::from_json(&json!([{"$sort": {"n": 2}}])).is_err());
        assert!(Pipeline::from_json(&json!([{"$limit": 0}])).is_err());
    }

    #[test]
    fn test_count() {
        let docs: Vec<Value> = (1..=3).map(|i| json!({"n": i})).collect();
        assert_eq!(run(json!([{"$count": "total"}]), docs), vec![json!({"total": 3})]);
        assert!(run(json!([{"$count": "total"}]), vec![]).is_empty());
        assert!(Pipeline::from_json(&json!([{"$count": "$x"}])).is_err());
    }

    // ========== Lookup / unwind ==========

    #[test]
    fn test_lookup_and_unwind() {
        let mut source: HashMap<String, Vec<Value>> = HashMap::new();
        source.insert(
            "users".to_string(),
            vec![
                json!({"userId": "inst001", "firstName": "Ada"}),
                json!({"userId": "inst002", "firstName": "Bob"}),
            ],
        );
        let courses = vec![
            json!({"courseId": "c001", "instructorId": "inst002"}),
            json!({"courseId": "c002", "instructorId": "nobody"}),
        ];

        let pipeline = Pipeline::from_json(&json!([
            {"$lookup": {"from": "users", "localField": "instructorId", "foreignField": "userId", "as": "instructor"}},
            {"$unwind": "$instructor"},
            {"$project": {"_id": 0, "courseId": 1, "name": "$instructor.firstName"}}
        ]))
        .unwrap();
        assert_eq!(pipeline.foreign_collections(), vec!["users"]);

        let out = pipeline.execute(courses.clone(), &source).unwrap();
        assert_eq!(out, vec![json!({"courseId": "c001", "name": "Bob"})]);

        let preserve = Pipeline::from_json(&json!([
            {"$lookup": {"from": "users", "localField": "instructorId", "foreignField": "userId", "as": "instructor"}},
            {"$unwind": {"path": "$instructor", "preserveNullAndEmptyArrays": true}}
        ]))
        .unwrap();
        let out = preserve.execute(courses, &source).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[1].get("instructor").is_none());
    }

    #[test]
    fn test_lookup_missing_collection_yields_empty_arrays() {
        let out = run(
            json!([{"$lookup": {"from": "ghosts", "localField": "a", "foreignField": "b", "as": "joined"}}]),
            vec![json!({"a": 1})],
        );
        assert_eq!(out, vec![json!({"a": 1, "joined": []})]);
    }

    #[test]
    fn test_lookup_matches_array_elements() {
        let mut source: HashMap<String, Vec<Value>> = HashMap::new();
        source.insert(
            "tags".to_string(),
            vec![json!({"name": "python"}), json!({"name": "rust"}), json!({"name": "web"})],
        );
        let out = Pipeline::from_json(&json!([
            {"$lookup": {"from": "tags", "localField": "tags", "foreignField": "name", "as": "t"}},
            {"$project": {"_id": 0, "n": {"$size": "$t"}}}
        ]))
        .unwrap()
        .execute(vec![json!({"tags": ["web", "python"]})], &source)
        .unwrap();
        assert_eq!(out, vec![json!({"n": 2})]);
    }

    #[test]
    fn test_match_stage() {
        let docs = vec![json!({"level": "beginner"}), json!({"level": "advanced"})];
        let out = run(json!([{"$match": {"level": {"$in": ["advanced"]}}}]), docs);
        assert_eq!(out, vec![json!({"level": "advanced"})]);
        assert!(Pipeline::from_json(&json!([{"$match": {"$text": {"$search": "x"}}}])).is_err());
    }
}
