//! Schema-less documents and identity helpers
//!
//! A document is a plain JSON object. Identity lives in ordinary fields:
//! - `_id`: opaque key generated by the database
//! - `id`: integer key assigned by the JSON file store
//! - `legacyId`: the former `id` of a document imported into the database

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A schema-less record
pub type Document = Map<String, Value>;

/// Field holding the JSON file store identity
pub const FILE_ID: &str = "id";

/// Field holding the database identity
pub const DATABASE_ID: &str = "_id";

/// Field holding the origin identity of an imported document
pub const LEGACY_ID: &str = "legacyId";

/// Require a payload to be a JSON object
pub fn into_document(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::BadRequest(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Canonical string form of an identity value.
///
/// Empty, null, `false` and zero values do not identify anything.
pub fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Identity used for file store lookups: the first of `id`, `_id`,
/// `legacyId` that carries a value.
pub fn file_key(doc: &Document) -> Option<String> {
    [FILE_ID, DATABASE_ID, LEGACY_ID]
        .iter()
        .find_map(|field| doc.get(*field).and_then(key_of))
}

/// Legacy key of a document that has already been converted.
///
/// Any value the file carried counts, including `0` and `false`; only
/// null and the empty string are treated as absent.
pub fn legacy_key(doc: &Document) -> Option<String> {
    match doc.get(LEGACY_ID)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Next file store id: one above the largest numeric identity present.
///
/// Fails when that id would not fit in a `u64`.
pub fn next_file_id(docs: &[Document]) -> Result<u64> {
    let max = docs
        .iter()
        .filter_map(|doc| {
            [FILE_ID, DATABASE_ID, LEGACY_ID]
                .iter()
                .find_map(|field| doc.get(*field).filter(|v| key_of(v).is_some()))
        })
        .filter_map(numeric)
        .max()
        .unwrap_or(0);
    max.checked_add(1)
        .ok_or_else(|| Error::InvalidDataFile(format!("no id left above {}", max)))
}

/// Whole, non-negative value of a numeric identity
fn numeric(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(float_id)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| s.parse::<f64>().ok().and_then(float_id))
        }
        _ => None,
    }
}

fn float_id(f: f64) -> Option<u64> {
    // 2^64 itself is out of range
    (f.is_finite() && f >= 0.0 && f < u64::MAX as f64).then(|| f.floor() as u64)
}

/// Copy a file store document into its database shape: `id` becomes
/// `legacyId`. Documents already carrying `legacyId` keep it.
pub fn to_legacy(doc: &Document) -> Document {
    let mut copy = doc.clone();
    if let Some(id) = copy.remove(FILE_ID) {
        copy.insert(LEGACY_ID.to_string(), id);
    }
    copy
}

/// Shallow merge `partial` over `target`, skipping `protected` fields
pub fn merge(target: &mut Document, partial: &Document, protected: &[&str]) {
    for (key, value) in partial {
        if protected.contains(&key.as_str()) {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

/// Total order over optional JSON values used for sorting.
///
/// Missing and null sort first, then booleans, numbers, strings,
/// arrays and objects. Values of the same kind compare naturally;
/// arrays and objects compare by their serialized form.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ if rank(a) != rank(b) => rank(a).cmp(&rank(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        into_document(value).unwrap()
    }

    #[test]
    fn test_into_document_rejects_non_objects() {
        assert!(matches!(into_document(json!([1, 2])), Err(Error::BadRequest(_))));
        assert!(matches!(into_document(json!("x")), Err(Error::BadRequest(_))));
        assert!(into_document(json!({})).is_ok());
    }

    #[test]
    fn test_file_key_prefers_id() {
        assert_eq!(file_key(&doc(json!({"id": 3, "_id": "abc"}))), Some("3".into()));
        assert_eq!(file_key(&doc(json!({"_id": "abc", "legacyId": 2}))), Some("abc".into()));
        assert_eq!(file_key(&doc(json!({"legacyId": 2}))), Some("2".into()));
        assert_eq!(file_key(&doc(json!({"id": 0, "legacyId": 7}))), Some("7".into()));
        assert_eq!(file_key(&doc(json!({"name": "x"}))), None);
    }

    #[test]
    fn test_next_file_id() {
        assert_eq!(next_file_id(&[]).unwrap(), 1);
        let docs = vec![
            doc(json!({"id": 1})),
            doc(json!({"id": "7"})),
            doc(json!({"id": "abc"})),
            doc(json!({"legacyId": 4})),
        ];
        assert_eq!(next_file_id(&docs).unwrap(), 8);
        assert_eq!(next_file_id(&[doc(json!({"id": 2.5}))]).unwrap(), 3);
    }

    #[test]
    fn test_next_file_id_keeps_precision_and_refuses_overflow() {
        let big = doc(json!({"id": 9_007_199_254_740_993_u64}));
        assert_eq!(next_file_id(&[big]).unwrap(), 9_007_199_254_740_994);

        let last = doc(json!({"id": u64::MAX}));
        assert!(matches!(next_file_id(&[last]), Err(Error::InvalidDataFile(_))));

        // Too large for u64 is ignored rather than wrapped
        let huge = doc(json!({"id": 1e30}));
        assert_eq!(next_file_id(&[huge]).unwrap(), 1);
    }

    #[test]
    fn test_legacy_key_accepts_zero() {
        assert_eq!(legacy_key(&doc(json!({"legacyId": 0}))), Some("0".into()));
        assert_eq!(legacy_key(&doc(json!({"legacyId": "x"}))), Some("x".into()));
        assert_eq!(legacy_key(&doc(json!({"legacyId": ""}))), None);
        assert_eq!(legacy_key(&doc(json!({"legacyId": null}))), None);
        assert_eq!(legacy_key(&doc(json!({"name": "x"}))), None);
    }

    #[test]
    fn test_to_legacy_renames_id() {
        let converted = to_legacy(&doc(json!({"id": 5, "name": "Sylhet"})));
        assert_eq!(Value::Object(converted), json!({"name": "Sylhet", "legacyId": 5}));
    }

    #[test]
    fn test_merge_is_shallow_and_skips_protected() {
        let mut target = doc(json!({"_id": "k", "a": 0, "b": 2, "nested": {"x": 1}}));
        merge(&mut target, &doc(json!({"_id": "other", "a": 1, "nested": {"y": 2}})), &[DATABASE_ID]);
        assert_eq!(
            Value::Object(target),
            json!({"_id": "k", "a": 1, "b": 2, "nested": {"y": 2}})
        );
    }

    #[test]
    fn test_compare_values_orders_kinds() {
        assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
        assert_eq!(compare_values(None, Some(&json!(0))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(5)), Some(&json!("5"))), Ordering::Less);
    }
}
