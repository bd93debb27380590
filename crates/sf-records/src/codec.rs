//! JSON encoding and decoding of records.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::schema::{FieldType, SObjectSchema};
use crate::value::{parse_text, FieldValue};

/// Decode one REST API row.
///
/// `attributes` and keys the schema does not declare are skipped. Keys
/// matching a relationship name decode into a nested [`FieldValue::Related`].
/// A value that does not fit its field's type is a codec error naming the
/// field and the offending value.
pub fn decode_json(schema: &Arc<SObjectSchema>, row: &Value) -> Result<Record> {
    let Value::Object(object) = row else {
        return Err(Error::codec(schema.name(), row.to_string(), "expected a JSON object"));
    };

    let mut record = Record::new(schema.clone());
    for (key, value) in object {
        if key == "attributes" {
            continue;
        }
        if let Some(field) = schema.field(key) {
            record.load(key.clone(), coerce_json(key, &field.field_type, value)?);
        } else if schema.relationship(key).is_some() {
            record.load(key.clone(), loose_json(value));
        }
    }
    Ok(record)
}

/// Decode a page of rows, stopping at the first failure.
pub fn decode_json_rows(schema: &Arc<SObjectSchema>, rows: &[Value]) -> Result<Vec<Record>> {
    rows.iter().map(|row| decode_json(schema, row)).collect()
}

fn coerce_json(field: &str, field_type: &FieldType, value: &Value) -> Result<FieldValue> {
    let mismatch = |reason: &str| Error::codec(field, value.to_string(), reason);

    match (field_type, value) {
        (_, Value::Null) => Ok(FieldValue::Null),
        (FieldType::Int, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(FieldValue::Int)
            .ok_or_else(|| mismatch("not an integer")),
        (FieldType::Number, Value::Number(n)) => n
            .as_f64()
            .map(FieldValue::Number)
            .ok_or_else(|| mismatch("not a finite number")),
        (FieldType::Boolean, Value::Bool(b)) => Ok(FieldValue::Boolean(*b)),
        (_, Value::String(s)) => {
            parse_text(field_type, s).map_err(|reason| Error::codec(field, s.clone(), reason))
        }
        (expected, _) => Err(mismatch(&format!("expected {}", expected.name()))),
    }
}

/// Decode without a schema: used for related records and untyped rows.
fn loose_json(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Boolean(*b),
        Value::Number(n) => n
            .as_i64()
            .map(FieldValue::Int)
            .or_else(|| n.as_f64().map(FieldValue::Number))
            .unwrap_or(FieldValue::Null),
        Value::String(s) => FieldValue::Text(s.clone()),
        Value::Object(object) => FieldValue::Related(
            object
                .iter()
                .filter(|(key, _)| key.as_str() != "attributes")
                .map(|(key, value)| (key.clone(), loose_json(value)))
                .collect::<BTreeMap<_, _>>(),
        ),
        Value::Array(_) => FieldValue::Text(value.to_string()),
    }
}

/// Encode a record's set fields, or only its dirty ones.
pub fn encode_json(record: &Record, only_changes: bool) -> Map<String, Value> {
    record
        .entries()
        .into_iter()
        .filter(|(name, _)| !only_changes || record.dirty_fields().contains(*name))
        .map(|(name, value)| (name.to_string(), value.to_json()))
        .collect()
}

/// Encode for the sObject Collections API, which needs the entity type on
/// every row.
pub fn encode_json_typed(record: &Record, only_changes: bool) -> Value {
    let mut object = Map::new();
    object.insert(
        "attributes".to_string(),
        serde_json::json!({ "type": record.sobject() }),
    );
    object.extend(encode_json(record, only_changes));
    Value::Object(object)
}
