use regex::Regex;
use serde_json::Value;

use crate::error::{EduHubError, Result, SchemaViolation};
use crate::value_utils::{compare_values, is_date, type_name};

/// `bsonType` keywords understood by the validator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BsonType {
    Object,
    Array,
    String,
    Bool,
    Int,
    Long,
    Double,
    Number,
    Date,
    Null,
}

impl BsonType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "string" => Some(Self::String),
            "bool" => Some(Self::Bool),
            "int" => Some(Self::Int),
            "long" => Some(Self::Long),
            "double" => Some(Self::Double),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            BsonType::Object => value.is_object() && !is_date(value),
            BsonType::Array => value.is_array(),
            BsonType::String => value.is_string(),
            BsonType::Bool => value.is_boolean(),
            BsonType::Int => value
                .as_i64()
                .map(|n| i32::try_from(n).is_ok())
                .unwrap_or(false),
            BsonType::Long => value.is_i64() || value.is_u64(),
            BsonType::Double => value.is_f64(),
            BsonType::Number => value.is_number(),
            BsonType::Date => is_date(value),
            BsonType::Null => value.is_null(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::String => "string",
            BsonType::Bool => "bool",
            BsonType::Int => "int",
            BsonType::Long => "long",
            BsonType::Double => "double",
            BsonType::Number => "number",
            BsonType::Date => "date",
            BsonType::Null => "null",
        }
    }
}

/// One compiled node of a `$jsonSchema` document
#[derive(Clone, Debug, Default)]
pub struct NodeSchema {
    bson_types: Vec<BsonType>,
    required: Vec<String>,
    properties: Vec<(String, NodeSchema)>,
    items: Option<Box<NodeSchema>>,
    enum_values: Option<Vec<Value>>,
    pattern: Option<Regex>,
    minimum: Option<Value>,
    maximum: Option<Value>,
}

/// Compiled collection validator
#[derive(Clone, Debug)]
pub struct CompiledSchema {
    root: NodeSchema,
}

fn schema_err(path: &str, msg: &str) -> EduHubError {
    if path.is_empty() {
        EduHubError::SchemaError(msg.to_string())
    } else {
        EduHubError::SchemaError(format!("'{}': {}", path, msg))
    }
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

impl NodeSchema {
    fn compile(spec: &Value, path: &str) -> Result<Self> {
        let obj = spec
            .as_object()
            .ok_or_else(|| schema_err(path, "schema must be a JSON object"))?;
        let mut node = NodeSchema::default();

        if let Some(types) = obj.get("bsonType") {
            let names: Vec<&Value> = match types {
                Value::Array(arr) => arr.iter().collect(),
                single => vec![single],
            };
            for name in names {
                let type_str = name
                    .as_str()
                    .ok_or_else(|| schema_err(path, "bsonType must be a string"))?;
                let parsed = BsonType::from_str(type_str).ok_or_else(|| {
                    schema_err(path, &format!("unsupported bsonType '{}'", type_str))
                })?;
                node.bson_types.push(parsed);
            }
        }

        if let Some(required) = obj.get("required") {
            let arr = required
                .as_array()
                .ok_or_else(|| schema_err(path, "required must be an array of field names"))?;
            for entry in arr {
                let field = entry
                    .as_str()
                    .ok_or_else(|| schema_err(path, "required entries must be strings"))?;
                node.required.push(field.to_string());
            }
        }

        if let Some(props) = obj.get("properties") {
            let props_obj = props
                .as_object()
                .ok_or_else(|| schema_err(path, "properties must be an object"))?;
            for (field, field_spec) in props_obj {
                let child_path = join_path(path, field);
                node.properties
                    .push((field.clone(), NodeSchema::compile(field_spec, &child_path)?));
            }
        }

        if let Some(items) = obj.get("items") {
            let items_path = join_path(path, "items");
            node.items = Some(Box::new(NodeSchema::compile(items, &items_path)?));
        }

        if let Some(enum_value) = obj.get("enum") {
            let values = enum_value
                .as_array()
                .ok_or_else(|| schema_err(path, "enum must be an array"))?;
            node.enum_values = Some(values.clone());
        }

        if let Some(pattern_value) = obj.get("pattern") {
            let pattern_str = pattern_value
                .as_str()
                .ok_or_else(|| schema_err(path, "pattern must be a string"))?;
            let regex = Regex::new(pattern_str).map_err(|e| {
                schema_err(path, &format!("invalid regex pattern: {}", e))
            })?;
            node.pattern = Some(regex);
        }

        for (keyword, slot) in [("minimum", &mut node.minimum), ("maximum", &mut node.maximum)] {
            if let Some(bound) = obj.get(keyword) {
                if !bound.is_number() {
                    return Err(schema_err(path, &format!("{} must be a number", keyword)));
                }
                *slot = Some(bound.clone());
            }
        }

        Ok(node)
    }

    fn validate(&self, value: &Value, path: &str) -> std::result::Result<(), SchemaViolation> {
        if !self.bson_types.is_empty() && !self.bson_types.iter().any(|t| t.matches(value)) {
            let expected: Vec<&str> = self.bson_types.iter().map(BsonType::as_str).collect();
            return Err(SchemaViolation::TypeMismatch {
                field: path.to_string(),
                expected: expected.join("|"),
                found: type_name(value).to_string(),
            });
        }

        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(value) {
                return Err(SchemaViolation::EnumMismatch {
                    field: path.to_string(),
                    value: value.to_string(),
                });
            }
        }

        if let (Some(pattern), Some(s)) = (&self.pattern, value.as_str()) {
            if !pattern.is_match(s) {
                return Err(SchemaViolation::PatternMismatch {
                    field: path.to_string(),
                    value: value.to_string(),
                    pattern: pattern.as_str().to_string(),
                });
            }
        }

        if value.is_number() {
            if let Some(min) = &self.minimum {
                if compare_values(value, min) == Some(std::cmp::Ordering::Less) {
                    return Err(SchemaViolation::OutOfRange {
                        field: path.to_string(),
                        value: value.to_string(),
                        bound: format!("minimum {}", min),
                    });
                }
            }
            if let Some(max) = &self.maximum {
                if compare_values(value, max) == Some(std::cmp::Ordering::Greater) {
                    return Err(SchemaViolation::OutOfRange {
                        field: path.to_string(),
                        value: value.to_string(),
                        bound: format!("maximum {}", max),
                    });
                }
            }
        }

        if let Some(obj) = value.as_object() {
            for field in &self.required {
                if !obj.contains_key(field) {
                    return Err(SchemaViolation::MissingField {
                        field: join_path(path, field),
                    });
                }
            }
            for (field, child) in &self.properties {
                if let Some(child_value) = obj.get(field) {
                    child.validate(child_value, &join_path(path, field))?;
                }
            }
        }

        if let (Some(items), Some(arr)) = (&self.items, value.as_array()) {
            for (i, element) in arr.iter().enumerate() {
                items.validate(element, &join_path(path, &i.to_string()))?;
            }
        }

        Ok(())
    }
}

impl CompiledSchema {
    /// Compile a validator document: `{"$jsonSchema": {...}}` or a bare schema
    pub fn from_validator(validator: &Value) -> Result<Self> {
        let schema = validator.get("$jsonSchema").unwrap_or(validator);
        let root = NodeSchema::compile(schema, "")?;
        if root.bson_types.iter().any(|t| *t != BsonType::Object) {
            return Err(EduHubError::SchemaError(
                "Only object schemas are supported at the top level".to_string(),
            ));
        }
        Ok(CompiledSchema { root })
    }

    pub fn validate(&self, document: &Value) -> std::result::Result<(), SchemaViolation> {
        self.root.validate(document, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users_schema() -> CompiledSchema {
        CompiledSchema::from_validator(&json!({
            "$jsonSchema": {
                "bsonType": "object",
                "required": ["email", "firstName", "role"],
                "properties": {
                    "email": {"bsonType": "string", "pattern": "^.+@.+$"},
                    "firstName": {"bsonType": "string"},
                    "role": {"enum": ["student", "instructor"]},
                    "dateJoined": {"bsonType": "date"},
                    "profile": {
                        "bsonType": "object",
                        "properties": {
                            "skills": {"bsonType": "array", "items": {"bsonType": "string"}}
                        }
                    },
                    "progress": {"bsonType": "double", "minimum": 0, "maximum": 100}
                }
            }
        }))
        .unwrap()
    }

    fn valid_user() -> Value {
        json!({
            "email": "a@example.com",
            "firstName": "Alice",
            "role": "student",
            "dateJoined": {"$date": "2025-01-15T00:00:00Z"},
            "profile": {"skills": ["Python"]}
        })
    }

    #[test]
    fn test_bson_type_from_str() {
        assert_eq!(BsonType::from_str("double"), Some(BsonType::Double));
        assert_eq!(BsonType::from_str("date"), Some(BsonType::Date));
        assert!(BsonType::from_str("decimal").is_none());
    }

    #[test]
    fn test_int_and_double_are_distinct() {
        assert!(BsonType::Int.matches(&json!(3)));
        assert!(!BsonType::Int.matches(&json!(3.0)));
        assert!(BsonType::Double.matches(&json!(3.0)));
        assert!(!BsonType::Double.matches(&json!(3)));
        assert!(BsonType::Number.matches(&json!(3)));
        assert!(!BsonType::Object.matches(&json!({"$date": "2025-01-01T00:00:00Z"})));
    }

    #[test]
    fn test_valid_document_passes() {
        assert!(users_schema().validate(&valid_user()).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let mut doc = valid_user();
        doc.as_object_mut().unwrap().remove("firstName");
        assert_eq!(
            users_schema().validate(&doc),
            Err(SchemaViolation::MissingField {
                field: "firstName".to_string()
            })
        );
    }

    #[test]
    fn test_enum_violation() {
        let mut doc = valid_user();
        doc["role"] = json!("admin");
        assert!(matches!(
            users_schema().validate(&doc),
            Err(SchemaViolation::EnumMismatch { field, .. }) if field == "role"
        ));
    }

    #[test]
    fn test_pattern_violation() {
        let mut doc = valid_user();
        doc["email"] = json!("not-an-email");
        assert!(matches!(
            users_schema().validate(&doc),
            Err(SchemaViolation::PatternMismatch { .. })
        ));
    }

    #[test]
    fn test_nested_array_item_type() {
        let mut doc = valid_user();
        doc["profile"]["skills"] = json!(["Python", 7]);
        match users_schema().validate(&doc) {
            Err(SchemaViolation::TypeMismatch { field, expected, found }) => {
                assert_eq!(field, "profile.skills.1");
                assert_eq!(expected, "string");
                assert_eq!(found, "int");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_date_type_mismatch() {
        let mut doc = valid_user();
        doc["dateJoined"] = json!("2025-01-15");
        assert!(matches!(
            users_schema().validate(&doc),
            Err(SchemaViolation::TypeMismatch { field, .. }) if field == "dateJoined"
        ));
    }

    #[test]
    fn test_range_bounds() {
        let mut doc = valid_user();
        doc["progress"] = json!(100.0);
        assert!(users_schema().validate(&doc).is_ok());
        doc["progress"] = json!(120.5);
        assert!(matches!(
            users_schema().validate(&doc),
            Err(SchemaViolation::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_invalid_schemas_rejected() {
        assert!(CompiledSchema::from_validator(&json!({"bsonType": "fancy"})).is_err());
        assert!(CompiledSchema::from_validator(&json!({"required": "email"})).is_err());
        assert!(CompiledSchema::from_validator(&json!({"bsonType": "array"})).is_err());
        assert!(CompiledSchema::from_validator(&json!({
            "properties": {"email": {"pattern": "("}}
        }))
        .is_err());
    }
}
