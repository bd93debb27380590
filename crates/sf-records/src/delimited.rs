//! Delimited-text encoding and decoding used by the Bulk API.

use std::collections::BTreeMap;
use std::sync::Arc;

use csv::{ReaderBuilder, Terminator, WriterBuilder};

use crate::error::{Error, Result};
use crate::record::Record;
use crate::schema::SObjectSchema;
use crate::value::{parse_text, FieldValue};

/// Cell value Bulk API 2.0 reads as "set this field to null".
pub const NULL_MARKER: &str = "#N/A";

/// Delimiter and line ending of a CSV payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub crlf: bool,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            crlf: false,
        }
    }
}

impl CsvDialect {
    pub fn new(delimiter: u8, crlf: bool) -> Self {
        Self { delimiter, crlf }
    }

    fn terminator(&self) -> Terminator {
        if self.crlf {
            Terminator::CRLF
        } else {
            Terminator::Any(b'\n')
        }
    }
}

/// Read raw rows keyed by header. Used for job result files, whose
/// `sf__*` columns are not part of any entity schema.
pub fn read_rows(data: &str, dialect: CsvDialect) -> Result<Vec<BTreeMap<String, String>>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .flexible(false)
        .from_reader(data.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    reader
        .records()
        .map(|row| {
            let row = row?;
            Ok(headers
                .iter()
                .cloned()
                .zip(row.iter().map(str::to_string))
                .collect())
        })
        .collect()
}

/// Decode a CSV page into records.
///
/// With no schema, an all-text schema is derived from the header row. Empty
/// cells and [`NULL_MARKER`] decode to `Null`; dotted headers (`Owner.Name`) become nested
/// related values; columns the schema does not know are ignored.
pub fn decode_csv(
    schema: Option<&Arc<SObjectSchema>>,
    sobject: &str,
    data: &str,
    dialect: CsvDialect,
) -> Result<Vec<Record>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .from_reader(data.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let schema = match schema {
        Some(schema) => schema.clone(),
        None => Arc::new(SObjectSchema::untyped(sobject, &headers)),
    };

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = Record::new(schema.clone());
        let mut related: BTreeMap<String, BTreeMap<String, FieldValue>> = BTreeMap::new();

        for (header, cell) in headers.iter().zip(row.iter()) {
            if let Some((parent, child)) = header.split_once('.') {
                if schema.relationship(parent).is_some() {
                    let value = if is_null_cell(cell) {
                        FieldValue::Null
                    } else {
                        FieldValue::Text(cell.to_string())
                    };
                    insert_path(related.entry(parent.to_string()).or_default(), child, value);
                }
                continue;
            }

            let Some(field) = schema.field(header) else {
                continue;
            };
            let value = if is_null_cell(cell) {
                FieldValue::Null
            } else {
                parse_text(&field.field_type, cell)
                    .map_err(|reason| Error::codec(header, cell, reason))?
            };
            record.load(header.clone(), value);
        }

        for (parent, values) in related {
            record.load(parent, related_or_null(values));
        }
        records.push(record);
    }
    Ok(records)
}

fn is_null_cell(cell: &str) -> bool {
    cell.is_empty() || cell == NULL_MARKER
}

fn insert_path(target: &mut BTreeMap<String, FieldValue>, path: &str, value: FieldValue) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| FieldValue::Related(BTreeMap::new()));
            if let FieldValue::Related(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

/// A related record whose columns are all empty was not present at all.
fn related_or_null(values: BTreeMap<String, FieldValue>) -> FieldValue {
    fn all_null(values: &BTreeMap<String, FieldValue>) -> bool {
        values.values().all(|value| match value {
            FieldValue::Null => true,
            FieldValue::Related(child) => all_null(child),
            _ => false,
        })
    }

    if all_null(&values) {
        FieldValue::Null
    } else {
        FieldValue::Related(values)
    }
}

/// The upload columns for a set of records: every set field in schema
/// order, then every related path, flattened with dots.
pub fn upload_columns(records: &[Record]) -> Vec<String> {
    let Some(first) = records.first() else {
        return Vec::new();
    };

    let mut columns: Vec<String> = first
        .schema()
        .field_names()
        .filter(|name| records.iter().any(|r| r.is_set(name)))
        .map(str::to_string)
        .collect();

    let mut related = Vec::new();
    for record in records {
        for (name, value) in record.entries() {
            if first.schema().field(name).is_none() {
                flatten_paths(name, value, &mut related);
            }
        }
    }
    related.sort();
    related.dedup();
    columns.extend(related);
    columns
}

fn flatten_paths(prefix: &str, value: &FieldValue, out: &mut Vec<String>) {
    match value {
        FieldValue::Related(map) => {
            for (key, child) in map {
                flatten_paths(&format!("{prefix}.{key}"), child, out);
            }
        }
        _ => out.push(prefix.to_string()),
    }
}

/// Writes a fixed set of columns, one line at a time.
#[derive(Debug, Clone)]
pub struct CsvEncoder {
    columns: Vec<String>,
    dialect: CsvDialect,
}

impl CsvEncoder {
    pub fn new(columns: Vec<String>, dialect: CsvDialect) -> Self {
        Self { columns, dialect }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The header line, including its terminator.
    pub fn header(&self) -> Result<String> {
        self.write_line(self.columns.iter().map(String::as_str))
    }

    /// One data line, including its terminator.
    ///
    /// Absent fields are empty cells; explicit nulls become [`NULL_MARKER`].
    pub fn row(&self, record: &Record) -> Result<String> {
        let cells = self.cells(record);
        self.write_line(cells.iter().map(String::as_str))
    }

    /// The unquoted cell texts of one row, in column order.
    pub fn cells(&self, record: &Record) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| cell_text(record, column))
            .collect()
    }

    /// Header plus every row.
    pub fn encode(&self, records: &[Record]) -> Result<String> {
        let mut out = self.header()?;
        for record in records {
            out.push_str(&self.row(record)?);
        }
        Ok(out)
    }

    fn write_line<'a>(&self, cells: impl Iterator<Item = &'a str>) -> Result<String> {
        let mut writer = WriterBuilder::new()
            .delimiter(self.dialect.delimiter)
            .terminator(self.dialect.terminator())
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(cells)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| Error::codec("<row>", "", e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| Error::codec("<row>", "", e.to_string()))
    }
}

fn cell_text(record: &Record, column: &str) -> String {
    let value = match column.split_once('.') {
        None => record.get(column),
        Some((parent, rest)) => record.get(parent).and_then(|related| related.lookup(rest)),
    };
    match value {
        None => String::new(),
        Some(FieldValue::Null) => NULL_MARKER.to_string(),
        Some(value) => value.to_text(),
    }
}
