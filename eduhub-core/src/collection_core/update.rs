// eduhub-core/src/collection_core/update.rs
// Update operators: $set, $unset, $inc, $push

use serde_json::{Map, Value};

use crate::error::{EduHubError, Result};
use crate::value_utils::{get_nested_value, remove_nested_value, set_nested_value};

#[derive(Debug, Clone, PartialEq)]
enum UpdateOp {
    Set(String, Value),
    Unset(String),
    Inc(String, Value),
    Push(String, Vec<Value>),
}

/// A parsed update document, validated before any document is touched
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    ops: Vec<UpdateOp>,
}

fn invalid(msg: impl Into<String>) -> EduHubError {
    EduHubError::InvalidUpdate(msg.into())
}

fn operand_fields<'a>(op: &str, fields: &'a Value) -> Result<&'a Map<String, Value>> {
    match fields {
        Value::Object(map) if !map.is_empty() => Ok(map),
        _ => Err(invalid(format!("{} requires a non-empty object", op))),
    }
}

impl UpdateSpec {
    pub fn parse(update: &Value) -> Result<Self> {
        let Value::Object(update_ops) = update else {
            return Err(invalid("Update must be an object"));
        };
        if update_ops.is_empty() {
            return Err(invalid("Update document is empty"));
        }

        let mut ops = Vec::new();
        for (op, fields) in update_ops {
            if !op.starts_with('$') {
                return Err(invalid(format!(
                    "Update document must only contain operators, found '{}'",
                    op
                )));
            }
            for (field, value) in operand_fields(op, fields)? {
                if field == "_id" || field.starts_with("_id.") {
                    return Err(invalid("Performing an update on the path '_id' is not allowed"));
                }
                let parsed = match op.as_str() {
                    "$set" => UpdateOp::Set(field.clone(), value.clone()),
                    "$unset" => UpdateOp::Unset(field.clone()),
                    "$inc" => {
                        if !value.is_number() {
                            return Err(invalid(format!(
                                "Cannot increment with non-numeric argument: {{{}: {}}}",
                                field, value
                            )));
                        }
                        UpdateOp::Inc(field.clone(), value.clone())
                    }
                    "$push" => {
                        let items = match value.get("$each") {
                            Some(Value::Array(items)) => items.clone(),
                            Some(_) => {
                                return Err(invalid(format!(
                                    "The argument to $each in $push must be an array for field '{}'",
                                    field
                                )))
                            }
                            None => vec![value.clone()],
                        };
                        UpdateOp::Push(field.clone(), items)
                    }
                    other => return Err(invalid(format!("Unknown update operator: {}", other))),
                };
                ops.push(parsed);
            }
        }
        Ok(UpdateSpec { ops })
    }

    /// Apply to a document in place; returns whether anything changed
    pub fn apply(&self, document: &mut Value) -> Result<bool> {
        let before = document.clone();

        for op in &self.ops {
            match op {
                UpdateOp::Set(field, value) => set_nested_value(document, field, value.clone())?,
                UpdateOp::Unset(field) => {
                    remove_nested_value(document, field);
                }
                UpdateOp::Inc(field, by) => {
                    let next = match get_nested_value(document, field) {
                        None => by.clone(),
                        Some(current) => add_numbers(field, current, by)?,
                    };
                    set_nested_value(document, field, next)?;
                }
                UpdateOp::Push(field, items) => {
                    let mut array = match get_nested_value(document, field) {
                        Some(Value::Array(arr)) => arr.clone(),
                        None => Vec::new(),
                        Some(_) => {
                            return Err(invalid(format!(
                                "$push: field '{}' is not an array",
                                field
                            )))
                        }
                    };
                    array.extend(items.iter().cloned());
                    set_nested_value(document, field, Value::Array(array))?;
                }
            }
        }

        Ok(*document != before)
    }
}

fn add_numbers(field: &str, current: &Value, by: &Value) -> Result<Value> {
    if let (Some(a), Some(b)) = (current.as_i64(), by.as_i64()) {
        return a
            .checked_add(b)
            .map(Value::from)
            .ok_or_else(|| invalid(format!("$inc overflow on field '{}'", field)));
    }
    match (current.as_f64(), by.as_f64()) {
        (Some(a), Some(b)) if current.is_number() => Ok(Value::from(a + b)),
        _ => Err(invalid(format!(
            "Cannot apply $inc to a value of non-numeric type at '{}'",
            field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(update: Value, mut doc: Value) -> (Value, bool) {
        let changed = UpdateSpec::parse(&update).unwrap().apply(&mut doc).unwrap();
        (doc, changed)
    }

    #[test]
    fn test_set_nested_fields() {
        let (doc, changed) = apply(
            json!({"$set": {"profile.bio": "Loves Rust", "profile.skills": ["rust"]}}),
            json!({"_id": 1, "profile": {"bio": "", "avatar": "a.png"}}),
        );
        assert!(changed);
        assert_eq!(
            doc,
            json!({"_id": 1, "profile": {"bio": "Loves Rust", "avatar": "a.png", "skills": ["rust"]}})
        );
    }

    #[test]
    fn test_set_same_value_is_not_a_modification() {
        let (_, changed) = apply(json!({"$set": {"isActive": false}}), json!({"isActive": false}));
        assert!(!changed);
    }

    #[test]
    fn test_unset_and_inc() {
        let (doc, _) = apply(
            json!({"$unset": {"feedback": ""}, "$inc": {"views": 1, "score": 0.5}}),
            json!({"feedback": "ok", "views": 2, "score": 1}),
        );
        assert_eq!(doc, json!({"views": 3, "score": 1.5}));

        let (doc, _) = apply(json!({"$inc": {"n": 5}}), json!({}));
        assert_eq!(doc, json!({"n": 5}));
    }

    #[test]
    fn test_inc_on_string_fails() {
        let spec = UpdateSpec::parse(&json!({"$inc": {"title": 1}})).unwrap();
        assert!(spec.apply(&mut json!({"title": "x"})).is_err());
    }

    #[test]
    fn test_push_and_each() {
        let (doc, _) = apply(json!({"$push": {"tags": "mongodb"}}), json!({"tags": ["python"]}));
        assert_eq!(doc, json!({"tags": ["python", "mongodb"]}));

        let (doc, _) = apply(json!({"$push": {"tags": {"$each": ["a", "b"]}}}), json!({}));
        assert_eq!(doc, json!({"tags": ["a", "b"]}));

        let spec = UpdateSpec::parse(&json!({"$push": {"title": 1}})).unwrap();
        assert!(spec.apply(&mut json!({"title": "x"})).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(UpdateSpec::parse(&json!({"title": "replacement"})).is_err());
        assert!(UpdateSpec::parse(&json!({})).is_err());
        assert!(UpdateSpec::parse(&json!({"$rename": {"a": "b"}})).is_err());
        assert!(UpdateSpec::parse(&json!({"$set": {"_id": 5}})).is_err());
        assert!(UpdateSpec::parse(&json!({"$inc": {"n": "1"}})).is_err());
        assert!(UpdateSpec::parse(&json!({"$set": {}})).is_err());
    }
}
