//! Reading and writing record lists as CSV or JSON files.
//!
//! CSV files use the same cell conventions as Bulk API payloads: explicit
//! nulls are written as [`NULL_MARKER`](crate::NULL_MARKER) and related
//! values are flattened into dotted columns.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::codec::{decode_json, decode_json_rows, encode_json};
use crate::delimited::{decode_csv, upload_columns, CsvDialect, CsvEncoder};
use crate::error::{Error, ErrorKind, Result};
use crate::record::Record;
use crate::schema::SObjectSchema;

/// File formats chosen by extension in [`read_file`] and [`write_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            _ => Err(Error::new(ErrorKind::Io(format!(
                "unknown file extension for {}",
                path.display()
            )))),
        }
    }
}

/// Load records of `schema` from a CSV file with a header row.
///
/// Every header must name a field of the schema or a path under one of its
/// relationships.
pub fn read_csv_file(
    path: impl AsRef<Path>,
    schema: &Arc<SObjectSchema>,
    dialect: CsvDialect,
) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .from_reader(data.as_bytes());
    for header in reader.headers()? {
        let known = match header.split_once('.') {
            Some((parent, _)) => schema.relationship(parent).is_some(),
            None => schema.field(header).is_some(),
        };
        if !known {
            return Err(Error::new(ErrorKind::UnknownField {
                sobject: schema.name().to_string(),
                field: header.to_string(),
            }));
        }
    }

    let records = decode_csv(Some(schema), schema.name(), &data, dialect)?;
    debug!(path = %path.display(), records = records.len(), "Read CSV file");
    Ok(records)
}

/// Load records of `schema` from a JSON file holding one object or an
/// array of objects.
pub fn read_json_file(path: impl AsRef<Path>, schema: &Arc<SObjectSchema>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)?;
    let records = match serde_json::from_str::<Value>(&data)? {
        Value::Array(rows) => decode_json_rows(schema, &rows)?,
        row @ Value::Object(_) => vec![decode_json(schema, &row)?],
        other => {
            return Err(Error::new(ErrorKind::Json(format!(
                "expected an object or an array in {}, found {}",
                path.display(),
                json_kind(&other)
            ))));
        }
    };
    debug!(path = %path.display(), records = records.len(), "Read JSON file");
    Ok(records)
}

/// Write records as CSV: a header of every set field and related path, then
/// one line per record. An empty list writes an empty file.
pub fn write_csv_file(path: impl AsRef<Path>, records: &[Record], dialect: CsvDialect) -> Result<()> {
    let path = path.as_ref();
    let data = if records.is_empty() {
        String::new()
    } else {
        CsvEncoder::new(upload_columns(records), dialect).encode(records)?
    };
    std::fs::write(path, data)?;
    debug!(path = %path.display(), records = records.len(), "Wrote CSV file");
    Ok(())
}

/// Write records as a pretty-printed JSON array of their set fields.
pub fn write_json_file(path: impl AsRef<Path>, records: &[Record]) -> Result<()> {
    let path = path.as_ref();
    let rows: Vec<Value> = records
        .iter()
        .map(|record| Value::Object(encode_json(record, false)))
        .collect();
    std::fs::write(path, serde_json::to_string_pretty(&rows)?)?;
    debug!(path = %path.display(), records = records.len(), "Wrote JSON file");
    Ok(())
}

/// Write records as JSON lines, one object per line.
pub fn write_json_lines(path: impl AsRef<Path>, records: &[Record]) -> Result<()> {
    let path = path.as_ref();
    let mut data = String::new();
    for record in records {
        data.push_str(&serde_json::to_string(&encode_json(record, false))?);
        data.push('\n');
    }
    std::fs::write(path, data)?;
    debug!(path = %path.display(), records = records.len(), "Wrote JSON lines file");
    Ok(())
}

/// [`read_csv_file`] or [`read_json_file`], by the file's extension.
pub fn read_file(path: impl AsRef<Path>, schema: &Arc<SObjectSchema>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    match FileFormat::from_path(path)? {
        FileFormat::Csv => read_csv_file(path, schema, CsvDialect::default()),
        FileFormat::Json => read_json_file(path, schema),
    }
}

/// [`write_csv_file`] or [`write_json_file`], by the file's extension.
pub fn write_file(path: impl AsRef<Path>, records: &[Record]) -> Result<()> {
    let path = path.as_ref();
    match FileFormat::from_path(path)? {
        FileFormat::Csv => write_csv_file(path, records, CsvDialect::default()),
        FileFormat::Json => write_json_file(path, records),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
