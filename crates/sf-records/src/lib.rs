//! # sf-toolkit-records
//!
//! Typed Salesforce records without reflection: an entity's shape lives in
//! an explicit [`SObjectSchema`], looked up by name through a
//! [`SchemaRegistry`], and records are validated against it.
//!
//! ## Codecs
//!
//! - JSON rows from the REST API: [`decode_json`], [`encode_json`]
//! - Delimited text for Bulk API 2.0: [`decode_csv`], [`CsvEncoder`]
//! - Record lists in CSV or JSON files: [`read_file`], [`write_file`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sf_toolkit_records::{FieldSchema, FieldType, Record, SObjectSchema, SchemaRegistry};
//!
//! let registry = SchemaRegistry::new();
//! let account = registry.register(SObjectSchema::new(
//!     "Account",
//!     vec![
//!         FieldSchema::new("Id", FieldType::Id).readonly(),
//!         FieldSchema::new("Name", FieldType::Text),
//!         FieldSchema::new("AnnualRevenue", FieldType::Number),
//!     ],
//! )?);
//!
//! let mut record = Record::new(Arc::clone(&account));
//! record.set("Name", "Acme")?;
//! record.set("AnnualRevenue", 1_500_000.0)?;
//! assert!(record.set("Name", 42).is_err());
//! # Ok::<(), sf_toolkit_records::Error>(())
//! ```

mod codec;
mod delimited;
mod error;
mod io;
mod record;
mod schema;
mod value;

pub use codec::{decode_json, decode_json_rows, encode_json, encode_json_typed};
pub use delimited::{decode_csv, read_rows, upload_columns, CsvDialect, CsvEncoder, NULL_MARKER};
pub use error::{Error, ErrorKind, Result};
pub use io::{
    read_csv_file, read_file, read_json_file, write_csv_file, write_file, write_json_file,
    write_json_lines, FileFormat,
};
pub use record::{is_single_type, Record};
pub use schema::{FieldFlags, FieldSchema, FieldType, SObjectSchema, SchemaRegistry};
pub use value::{is_record_id, parse_text, FieldValue};
