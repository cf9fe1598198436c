// eduhub-core/src/index.rs
// Ordered and text secondary indexes

use crate::document::DocumentId;
use crate::error::{EduHubError, Result};
use crate::query::tokenize;
use crate::value_utils::{get_nested_value, parse_date};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Index key - supported types for indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat),
    String(String),
    /// Milliseconds since the epoch
    Date(i64),
    /// Compound key for multi-field indexes (e.g., ["studentId", "courseId"])
    Compound(Vec<IndexKey>),
}

/// OrderedFloat wrapper for f64 to enable Ord
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl IndexKey {
    fn rank(&self) -> u8 {
        match self {
            IndexKey::Null => 0,
            IndexKey::Bool(_) => 1,
            IndexKey::Int(_) | IndexKey::Float(_) => 2,
            IndexKey::String(_) => 3,
            IndexKey::Date(_) => 4,
            IndexKey::Compound(_) => 5,
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Numbers compare numerically across Int/Float so that range scans see both
impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use IndexKey::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.cmp(b),
            (Int(a), Float(b)) => OrderedFloat(*a as f64).cmp(b),
            (Float(a), Int(b)) => a.cmp(&OrderedFloat(*b as f64)),
            (String(a), String(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Compound(a), Compound(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Convert a scalar JSON value to an IndexKey
///
/// Integral floats become `Int` so `100` and `100.0` share a key.
impl From<&Value> for IndexKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => IndexKey::Null,
            Value::Bool(b) => IndexKey::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    IndexKey::Int(i)
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => IndexKey::Int(f as i64),
                        Some(f) => IndexKey::Float(OrderedFloat(f)),
                        None => IndexKey::Null,
                    }
                }
            }
            Value::String(s) => IndexKey::String(s.clone()),
            Value::Object(_) => match parse_date(value) {
                Some(dt) => IndexKey::Date(dt.timestamp_millis()),
                None => IndexKey::String(crate::value_utils::canonical_json_string(value)),
            },
            Value::Array(_) => IndexKey::String(crate::value_utils::canonical_json_string(value)),
        }
    }
}

/// Key direction of one indexed field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexDirection {
    Ascending,
    Text,
}

/// Persisted description of an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<(String, IndexDirection)>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Parse a key document such as `{"email": 1}` or `{"title": "text", "category": 1}`
    ///
    /// The name follows the usual `<field>_<direction>` joining, e.g. `title_text_category_1`.
    pub fn from_keys(keys: &Value, unique: bool) -> Result<Self> {
        let obj = keys.as_object().filter(|o| !o.is_empty()).ok_or_else(|| {
            EduHubError::IndexError("Index keys must be a non-empty object".to_string())
        })?;

        let mut parsed = Vec::with_capacity(obj.len());
        let mut name_parts = Vec::with_capacity(obj.len() * 2);
        for (field, direction) in obj {
            let dir = match direction {
                Value::String(s) if s == "text" => IndexDirection::Text,
                Value::Number(n) if n.as_i64() == Some(1) => IndexDirection::Ascending,
                other => {
                    return Err(EduHubError::IndexError(format!(
                        "Unsupported index direction {} for field '{}'",
                        other, field
                    )))
                }
            };
            name_parts.push(field.clone());
            name_parts.push(match dir {
                IndexDirection::Text => "text".to_string(),
                IndexDirection::Ascending => "1".to_string(),
            });
            parsed.push((field.clone(), dir));
        }

        let spec = IndexSpec {
            name: name_parts.join("_"),
            keys: parsed,
            unique,
        };
        if spec.is_text() && unique {
            return Err(EduHubError::IndexError(
                "Text indexes cannot be unique".to_string(),
            ));
        }
        Ok(spec)
    }

    pub fn is_text(&self) -> bool {
        self.keys.iter().any(|(_, d)| *d == IndexDirection::Text)
    }

    pub fn fields(&self) -> Vec<&str> {
        self.keys.iter().map(|(f, _)| f.as_str()).collect()
    }

    pub fn text_fields(&self) -> Vec<&str> {
        self.keys
            .iter()
            .filter(|(_, d)| *d == IndexDirection::Text)
            .map(|(f, _)| f.as_str())
            .collect()
    }

    /// Key document in the same shape accepted by [`IndexSpec::from_keys`]
    pub fn key_document(&self) -> Value {
        let mut map = Map::new();
        for (field, dir) in &self.keys {
            let v = match dir {
                IndexDirection::Ascending => Value::from(1),
                IndexDirection::Text => Value::from("text"),
            };
            map.insert(field.clone(), v);
        }
        Value::Object(map)
    }
}

/// Values under `path`, with arrays expanded element-wise (multikey)
fn field_keys(doc: &Value, path: &str) -> Vec<IndexKey> {
    match get_nested_value(doc, path) {
        None => vec![IndexKey::Null],
        Some(Value::Array(arr)) if arr.is_empty() => vec![IndexKey::Null],
        Some(Value::Array(arr)) => {
            let mut keys: Vec<IndexKey> = arr.iter().map(IndexKey::from).collect();
            keys.sort();
            keys.dedup();
            keys
        }
        Some(v) => vec![IndexKey::from(v)],
    }
}

/// A live index over one collection
#[derive(Debug, Clone)]
pub struct Index {
    pub spec: IndexSpec,
    entries: BTreeMap<IndexKey, Vec<DocumentId>>,
}

/// Result of probing an index: candidate ids plus how many keys were read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexProbe {
    pub ids: Vec<DocumentId>,
    pub keys_examined: u64,
}

impl IndexProbe {
    fn push_all(&mut self, ids: &[DocumentId]) {
        self.keys_examined += ids.len() as u64;
        for id in ids {
            if !self.ids.contains(id) {
                self.ids.push(id.clone());
            }
        }
    }
}

impl Index {
    pub fn new(spec: IndexSpec) -> Self {
        Index {
            spec,
            entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Every key a document contributes to this index
    pub fn keys_for(&self, doc: &Value) -> Vec<IndexKey> {
        if self.spec.is_text() {
            let mut tokens: Vec<IndexKey> = self
                .spec
                .text_fields()
                .into_iter()
                .filter_map(|f| get_nested_value(doc, f))
                .flat_map(|v| match v {
                    Value::String(s) => tokenize(s),
                    Value::Array(arr) => arr
                        .iter()
                        .filter_map(Value::as_str)
                        .flat_map(tokenize)
                        .collect(),
                    _ => Vec::new(),
                })
                .map(IndexKey::String)
                .collect();
            tokens.sort();
            tokens.dedup();
            return tokens;
        }

        let fields = self.spec.fields();
        if fields.len() == 1 {
            return field_keys(doc, fields[0]);
        }

        let mut combos: Vec<Vec<IndexKey>> = vec![Vec::new()];
        for field in fields {
            let values = field_keys(doc, field);
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    values.iter().map(move |v| {
                        let mut next = prefix.clone();
                        next.push(v.clone());
                        next
                    })
                })
                .collect();
        }
        combos.into_iter().map(IndexKey::Compound).collect()
    }

    /// Fail if `doc` would collide with another document on a unique index
    pub fn check_unique(&self, collection: &str, id: &DocumentId, doc: &Value) -> Result<()> {
        if !self.spec.unique {
            return Ok(());
        }
        for key in self.keys_for(doc) {
            if let Some(owners) = self.entries.get(&key) {
                if owners.iter().any(|owner| owner != id) {
                    return Err(EduHubError::DuplicateKey {
                        collection: collection.to_string(),
                        index: self.spec.name.clone(),
                        key: describe_key(&key),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, id: &DocumentId, doc: &Value) {
        for key in self.keys_for(doc) {
            let owners = self.entries.entry(key).or_default();
            if !owners.contains(id) {
                owners.push(id.clone());
            }
        }
    }

    pub fn remove(&mut self, id: &DocumentId, doc: &Value) {
        for key in self.keys_for(doc) {
            if let Some(owners) = self.entries.get_mut(&key) {
                owners.retain(|owner| owner != id);
                if owners.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact-match lookup of one key
    pub fn lookup(&self, key: &IndexKey) -> IndexProbe {
        let mut probe = IndexProbe::default();
        if let Some(ids) = self.entries.get(key) {
            probe.push_all(ids);
        }
        probe
    }

    /// Compound keys whose leading components equal `prefix`
    pub fn lookup_prefix(&self, prefix: &[IndexKey]) -> IndexProbe {
        let mut probe = IndexProbe::default();
        let start = IndexKey::Compound(prefix.to_vec());
        for (key, ids) in self.entries.range(start..) {
            match key {
                IndexKey::Compound(parts) if parts.starts_with(prefix) => probe.push_all(ids),
                _ => break,
            }
        }
        probe
    }

    /// Keys within the given bounds
    pub fn range(&self, lower: Bound<IndexKey>, upper: Bound<IndexKey>) -> IndexProbe {
        let mut probe = IndexProbe::default();
        let empty = match (&lower, &upper) {
            (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
            (Bound::Included(lo) | Bound::Excluded(lo), Bound::Included(hi) | Bound::Excluded(hi)) => {
                lo >= hi
            }
            _ => false,
        };
        if empty {
            return probe;
        }
        for (_, ids) in self.entries.range((lower, upper)) {
            probe.push_all(ids);
        }
        probe
    }

    /// Documents containing any of the search terms
    pub fn text_search(&self, terms: &[String]) -> IndexProbe {
        let mut probe = IndexProbe::default();
        for term in terms {
            if let Some(ids) = self.entries.get(&IndexKey::String(term.to_lowercase())) {
                probe.push_all(ids);
            }
        }
        probe
    }
}

fn describe_key(key: &IndexKey) -> String {
    match key {
        IndexKey::Null => "null".to_string(),
        IndexKey::Bool(b) => b.to_string(),
        IndexKey::Int(i) => i.to_string(),
        IndexKey::Float(f) => f.0.to_string(),
        IndexKey::String(s) => format!("\"{}\"", s),
        IndexKey::Date(ms) => format!("date({})", ms),
        IndexKey::Compound(parts) => format!(
            "{{ {} }}",
            parts.iter().map(describe_key).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Index Manager - all secondary indexes of one collection
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    indexes: BTreeMap<String, Index>,
}

/// Name reported for the implicit primary-key index
pub const ID_INDEX_NAME: &str = "_id_";

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an index unless one with the same name and spec exists
    ///
    /// Returns true when the index is new.
    pub fn create_index(&mut self, spec: IndexSpec) -> Result<bool> {
        if spec.name == ID_INDEX_NAME {
            return Err(EduHubError::IndexError(
                "The _id index is implicit".to_string(),
            ));
        }
        if let Some(existing) = self.indexes.get(&spec.name) {
            if existing.spec == spec {
                return Ok(false);
            }
            return Err(EduHubError::IndexError(format!(
                "Index already exists with different options: {}",
                spec.name
            )));
        }
        if spec.is_text() && self.text_index().is_some() {
            return Err(EduHubError::IndexError(
                "A collection can have at most one text index".to_string(),
            ));
        }
        self.indexes.insert(spec.name.clone(), Index::new(spec));
        Ok(true)
    }

    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        self.indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EduHubError::IndexError(format!("Index not found: {}", name)))
    }

    pub fn get(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Index> {
        self.indexes.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    pub fn text_index(&self) -> Option<&Index> {
        self.indexes.values().find(|i| i.spec.is_text())
    }

    pub fn specs(&self) -> Vec<IndexSpec> {
        self.indexes.values().map(|i| i.spec.clone()).collect()
    }

    /// All index names including the implicit `_id_`
    pub fn list_indexes(&self) -> Vec<String> {
        std::iter::once(ID_INDEX_NAME.to_string())
            .chain(self.indexes.keys().cloned())
            .collect()
    }

    pub fn check_unique(&self, collection: &str, id: &DocumentId, doc: &Value) -> Result<()> {
        for index in self.indexes.values() {
            index.check_unique(collection, id, doc)?;
        }
        Ok(())
    }

    pub fn insert_document(&mut self, id: &DocumentId, doc: &Value) {
        for index in self.indexes.values_mut() {
            index.insert(id, doc);
        }
    }

    pub fn remove_document(&mut self, id: &DocumentId, doc: &Value) {
        for index in self.indexes.values_mut() {
            index.remove(id, doc);
        }
    }

    pub fn clear_entries(&mut self) {
        for index in self.indexes.values_mut() {
            index.entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(n: i64) -> DocumentId {
        DocumentId::Int(n)
    }

    #[test]
    fn test_index_key_ordering() {
        assert!(IndexKey::Null < IndexKey::Bool(false));
        assert!(IndexKey::Bool(true) < IndexKey::Int(0));
        assert!(IndexKey::Int(10) < IndexKey::Float(OrderedFloat(10.5)));
        assert!(IndexKey::Float(OrderedFloat(9.5)) < IndexKey::Int(10));
        assert!(IndexKey::Float(OrderedFloat(10.5)) < IndexKey::String("a".to_string()));
        assert!(IndexKey::String("z".to_string()) < IndexKey::Date(0));
    }

    #[test]
    fn test_integral_float_shares_int_key() {
        assert_eq!(IndexKey::from(&json!(100.0)), IndexKey::Int(100));
        assert_eq!(
            IndexKey::from(&json!({"$date": "1970-01-01T00:00:01Z"})),
            IndexKey::Date(1000)
        );
    }

    #[test]
    fn test_spec_names() {
        let spec = IndexSpec::from_keys(&json!({"email": 1}), true).unwrap();
        assert_eq!(spec.name, "email_1");
        let spec = IndexSpec::from_keys(&json!({"title": "text", "category": 1}), false).unwrap();
        assert_eq!(spec.name, "title_text_category_1");
        assert!(spec.is_text());
        assert_eq!(spec.key_document(), json!({"title": "text", "category": 1}));
        let spec = IndexSpec::from_keys(&json!({"studentId": 1, "courseId": 1}), false).unwrap();
        assert_eq!(spec.name, "studentId_1_courseId_1");
    }

    #[test]
    fn test_spec_rejects_bad_input() {
        assert!(IndexSpec::from_keys(&json!({}), false).is_err());
        assert!(IndexSpec::from_keys(&json!({"a": -1}), false).is_err());
        assert!(IndexSpec::from_keys(&json!({"a": "text"}), true).is_err());
    }

    #[test]
    fn test_unique_violation() {
        let mut index = Index::new(IndexSpec::from_keys(&json!({"email": 1}), true).unwrap());
        let a = json!({"email": "a@x.com"});
        index.insert(&id(1), &a);

        assert!(index.check_unique("users", &id(1), &a).is_ok());
        let err = index.check_unique("users", &id(2), &a).unwrap_err();
        assert!(err.is_duplicate_key());
        assert!(err.to_string().contains("email_1"));
    }

    #[test]
    fn test_multikey_lookup_and_remove() {
        let mut index = Index::new(IndexSpec::from_keys(&json!({"tags": 1}), false).unwrap());
        let doc = json!({"tags": ["python", "coding"]});
        index.insert(&id(1), &doc);
        index.insert(&id(2), &json!({"tags": ["python"]}));

        let probe = index.lookup(&IndexKey::String("python".to_string()));
        assert_eq!(probe.ids, vec![id(1), id(2)]);
        assert_eq!(probe.keys_examined, 2);

        index.remove(&id(1), &doc);
        assert_eq!(index.lookup(&IndexKey::String("coding".to_string())).ids.len(), 0);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_compound_prefix_lookup() {
        let mut index = Index::new(
            IndexSpec::from_keys(&json!({"studentId": 1, "courseId": 1}), false).unwrap(),
        );
        index.insert(&id(1), &json!({"studentId": "stu001", "courseId": "c001"}));
        index.insert(&id(2), &json!({"studentId": "stu001", "courseId": "c002"}));
        index.insert(&id(3), &json!({"studentId": "stu002", "courseId": "c001"}));

        let prefix = [IndexKey::String("stu001".to_string())];
        assert_eq!(index.lookup_prefix(&prefix).ids, vec![id(1), id(2)]);

        let full = IndexKey::Compound(vec![
            IndexKey::String("stu002".to_string()),
            IndexKey::String("c001".to_string()),
        ]);
        assert_eq!(index.lookup(&full).ids, vec![id(3)]);
    }

    #[test]
    fn test_range_scan() {
        let mut index = Index::new(IndexSpec::from_keys(&json!({"price": 1}), false).unwrap());
        for (n, price) in [(1, 49.99), (2, 79.99), (3, 99.99)] {
            index.insert(&id(n), &json!({ "price": price }));
        }
        let probe = index.range(
            Bound::Included(IndexKey::Int(50)),
            Bound::Included(IndexKey::Int(90)),
        );
        assert_eq!(probe.ids, vec![id(2)]);
    }

    #[test]
    fn test_text_search() {
        let mut index = Index::new(
            IndexSpec::from_keys(&json!({"title": "text", "category": 1}), false).unwrap(),
        );
        index.insert(&id(1), &json!({"title": "Intro to Python", "category": "Programming"}));
        index.insert(&id(2), &json!({"title": "Machine Learning", "category": "Data Science"}));

        let probe = index.text_search(&["python".to_string()]);
        assert_eq!(probe.ids, vec![id(1)]);
        assert!(index.text_search(&["programming".to_string()]).ids.is_empty());
    }

    #[test]
    fn test_manager_create_is_idempotent() {
        let mut manager = IndexManager::new();
        let spec = IndexSpec::from_keys(&json!({"email": 1}), true).unwrap();
        assert!(manager.create_index(spec.clone()).unwrap());
        assert!(!manager.create_index(spec).unwrap());

        let conflicting = IndexSpec::from_keys(&json!({"email": 1}), false).unwrap();
        assert!(manager.create_index(conflicting).is_err());
        assert_eq!(manager.list_indexes(), vec!["_id_", "email_1"]);

        manager.drop_index("email_1").unwrap();
        assert!(manager.drop_index("email_1").is_err());
    }

    #[test]
    fn test_manager_single_text_index() {
        let mut manager = IndexManager::new();
        manager
            .create_index(IndexSpec::from_keys(&json!({"title": "text"}), false).unwrap())
            .unwrap();
        let second = IndexSpec::from_keys(&json!({"description": "text"}), false).unwrap();
        assert!(manager.create_index(second).is_err());
    }
}
