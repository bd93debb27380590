//! Field values and their text forms.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::collections::BTreeMap;

use crate::schema::FieldType;

/// Salesforce's wire format for date-time values.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";
/// Salesforce's wire format for time values.
pub const TIME_FORMAT: &str = "%H:%M:%S%.3fZ";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A typed field value.
///
/// `Null` is an explicit "clear this field"; a field that is simply not
/// present on a record is left untouched by updates.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Int(i64),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Time(NaiveTime),
    MultiPicklist(Vec<String>),
    /// A nested related record, keyed by field name.
    Related(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Text(_) => "text",
            FieldValue::Int(_) => "int",
            FieldValue::Number(_) => "number",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Date(_) => "date",
            FieldValue::DateTime(_) => "datetime",
            FieldValue::Time(_) => "time",
            FieldValue::MultiPicklist(_) => "multipicklist",
            FieldValue::Related(_) => "related record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_related(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Related(map) => Some(map),
            _ => None,
        }
    }

    /// Walk a dotted path (`Owner.Name`) through related values.
    pub fn lookup(&self, path: &str) -> Option<&FieldValue> {
        let mut current = self;
        for segment in path.split('.') {
            current = current.as_related()?.get(segment)?;
        }
        Some(current)
    }

    /// Whether this value can be stored in a field of `field_type`.
    pub fn fits(&self, field_type: &FieldType) -> bool {
        match (field_type, self) {
            (_, FieldValue::Null) => true,
            (FieldType::Text | FieldType::Picklist | FieldType::Blob, FieldValue::Text(_)) => true,
            (FieldType::Id | FieldType::Reference(_), FieldValue::Text(id)) => is_record_id(id),
            (FieldType::Int, FieldValue::Int(_)) => true,
            (FieldType::Number, FieldValue::Number(_) | FieldValue::Int(_)) => true,
            (FieldType::Boolean, FieldValue::Boolean(_)) => true,
            (FieldType::Date, FieldValue::Date(_)) => true,
            (FieldType::DateTime, FieldValue::DateTime(_)) => true,
            (FieldType::Time, FieldValue::Time(_)) => true,
            (FieldType::MultiPicklist, FieldValue::MultiPicklist(_)) => true,
            _ => false,
        }
    }

    /// Text form used in CSV cells and error messages. `Null` is empty here;
    /// the CSV writer substitutes its own null marker.
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Int(n) => n.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Date(d) => d.format(DATE_FORMAT).to_string(),
            FieldValue::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
            FieldValue::Time(t) => t.format(TIME_FORMAT).to_string(),
            FieldValue::MultiPicklist(values) => values.join(";"),
            FieldValue::Related(map) => serde_json::to_string(&related_to_json(map))
                .unwrap_or_default(),
        }
    }

    /// JSON form for REST payloads.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Int(n) => Value::from(*n),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Related(map) => related_to_json(map),
            other => Value::String(other.to_text()),
        }
    }
}

fn related_to_json(map: &BTreeMap<String, FieldValue>) -> serde_json::Value {
    serde_json::Value::Object(
        map.iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect(),
    )
}

/// 15 or 18 ASCII alphanumerics.
pub fn is_record_id(value: &str) -> bool {
    sf_toolkit_client::security::url::is_valid_salesforce_id(value)
}

/// Parse the text form of a value for a field of `field_type`.
///
/// Returns the reason on failure; callers attach the field name.
pub fn parse_text(field_type: &FieldType, raw: &str) -> std::result::Result<FieldValue, String> {
    match field_type {
        FieldType::Text | FieldType::Picklist | FieldType::Blob => Ok(FieldValue::Text(raw.to_string())),
        FieldType::Id | FieldType::Reference(_) => {
            if is_record_id(raw) {
                Ok(FieldValue::Text(raw.to_string()))
            } else {
                Err("not a 15 or 18 character record id".to_string())
            }
        }
        FieldType::Int => raw
            .trim()
            .parse::<i64>()
            .map(FieldValue::Int)
            .or_else(|_| {
                // Bulk results render integers as "5.0".
                raw.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.fract() == 0.0 && n.abs() < i64::MAX as f64)
                    .map(|n| FieldValue::Int(n as i64))
                    .ok_or_else(|| "not an integer".to_string())
            }),
        FieldType::Number => raw
            .trim()
            .parse::<f64>()
            .map(FieldValue::Number)
            .map_err(|e| e.to_string()),
        FieldType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(FieldValue::Boolean(true)),
            "false" => Ok(FieldValue::Boolean(false)),
            _ => Err("expected true or false".to_string()),
        },
        FieldType::Date => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .map(FieldValue::Date)
            .map_err(|e| e.to_string()),
        FieldType::DateTime => parse_datetime(raw.trim()).map(FieldValue::DateTime),
        FieldType::Time => parse_time(raw.trim()).map(FieldValue::Time),
        FieldType::MultiPicklist => Ok(FieldValue::MultiPicklist(
            raw.split(';').map(str::to_string).collect(),
        )),
    }
}

/// Accepts RFC 3339 and Salesforce's `+0000` offset form.
fn parse_datetime(raw: &str) -> std::result::Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc().fixed_offset())
        })
        .map_err(|e| e.to_string())
}

fn parse_time(raw: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim_end_matches('Z'), "%H:%M:%S%.f").map_err(|e| e.to_string())
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        FieldValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::DateTime(value.fixed_offset())
    }
}

impl From<NaiveTime> for FieldValue {
    fn from(value: NaiveTime) -> Self {
        FieldValue::Time(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::MultiPicklist(values)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
