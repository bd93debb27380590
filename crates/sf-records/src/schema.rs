//! Entity schemas and the registry that resolves them by name.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde::Deserialize;
use sf_toolkit_client::security::soql;
use tracing::debug;

use crate::error::{Error, ErrorKind, Result};

/// Declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Text,
    /// 15 or 18 character record id.
    Id,
    Int,
    Number,
    Boolean,
    Date,
    DateTime,
    Time,
    Picklist,
    /// `;`-separated on the wire.
    MultiPicklist,
    /// Lookup holding an id; the entities it may point to.
    Reference(Vec<String>),
    /// Base64 content; kept as text.
    Blob,
}

impl FieldType {
    /// Map a describe `type` value.
    pub fn from_describe(kind: &str, reference_to: &[String]) -> Self {
        match kind {
            "id" => FieldType::Id,
            "reference" => FieldType::Reference(reference_to.to_vec()),
            "int" | "long" => FieldType::Int,
            "double" | "currency" | "percent" => FieldType::Number,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "datetime" => FieldType::DateTime,
            "time" => FieldType::Time,
            "picklist" => FieldType::Picklist,
            "multipicklist" => FieldType::MultiPicklist,
            "base64" => FieldType::Blob,
            _ => FieldType::Text,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Id => "id",
            FieldType::Int => "int",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Time => "time",
            FieldType::Picklist => "picklist",
            FieldType::MultiPicklist => "multipicklist",
            FieldType::Reference(_) => "reference",
            FieldType::Blob => "blob",
        }
    }
}

/// Field properties that influence client-side behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldFlags {
    pub nillable: bool,
    pub unique: bool,
    /// Can be assigned once (on load); later writes are rejected.
    pub readonly: bool,
    pub createable: bool,
    pub updateable: bool,
    pub external_id: bool,
    pub calculated: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub groupable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub flags: FieldFlags,
    /// For lookups: the name under which the related record is nested (`Owner` for `OwnerId`).
    pub relationship_name: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            flags: FieldFlags {
                nillable: true,
                createable: true,
                updateable: true,
                filterable: true,
                ..FieldFlags::default()
            },
            relationship_name: None,
        }
    }

    pub fn readonly(mut self) -> Self {
        self.flags.readonly = true;
        self.flags.createable = false;
        self.flags.updateable = false;
        self
    }

    pub fn external_id(mut self) -> Self {
        self.flags.external_id = true;
        self.flags.unique = true;
        self
    }

    pub fn with_flags(mut self, flags: FieldFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_relationship(mut self, relationship_name: impl Into<String>) -> Self {
        self.relationship_name = Some(relationship_name.into());
        self
    }
}

/// Shape of one entity: its fields in declaration order.
#[derive(Debug, Clone)]
pub struct SObjectSchema {
    name: String,
    id_field: String,
    tooling: bool,
    fields: Vec<FieldSchema>,
    by_name: HashMap<String, usize>,
}

impl PartialEq for SObjectSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.id_field == other.id_field
            && self.tooling == other.tooling
            && self.fields == other.fields
    }
}

impl SObjectSchema {
    /// Build a schema; names are validated as SOQL identifiers.
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Result<Self> {
        let name = name.into();
        if !soql::is_safe_sobject_name(&name) {
            return Err(Error::new(ErrorKind::InvalidSchema(format!(
                "invalid entity name '{name}'"
            ))));
        }

        let mut by_name = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            if !soql::is_safe_field_name(&field.name) {
                return Err(Error::new(ErrorKind::InvalidSchema(format!(
                    "invalid field name '{}' on {name}",
                    field.name
                ))));
            }
            if by_name.insert(field.name.clone(), index).is_some() {
                return Err(Error::new(ErrorKind::InvalidSchema(format!(
                    "duplicate field '{}' on {name}",
                    field.name
                ))));
            }
        }

        Ok(Self {
            name,
            id_field: "Id".to_string(),
            tooling: false,
            fields,
            by_name,
        })
    }

    /// An all-text schema derived from column headers, for rows without a
    /// registered schema. Dotted headers become relationship names.
    pub fn untyped(name: impl Into<String>, headers: &[String]) -> Self {
        let mut fields: Vec<FieldSchema> = Vec::new();
        let mut by_name = HashMap::new();
        for header in headers {
            let top = header.split('.').next().unwrap_or(header.as_str());
            if by_name.contains_key(top) {
                continue;
            }
            let field = if header.contains('.') {
                FieldSchema::new(top, FieldType::Text).with_relationship(top)
            } else {
                FieldSchema::new(top, FieldType::Text)
            };
            by_name.insert(top.to_string(), fields.len());
            fields.push(field);
        }

        Self {
            name: name.into(),
            id_field: "Id".to_string(),
            tooling: false,
            fields,
            by_name,
        }
    }

    /// Mark the entity as served by the Tooling API.
    pub fn with_tooling(mut self, tooling: bool) -> Self {
        self.tooling = tooling;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn is_tooling(&self) -> bool {
        self.tooling
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// The lookup field whose relationship is named `relationship`.
    pub fn relationship(&self, relationship: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| f.relationship_name.as_deref() == Some(relationship))
    }

    /// Build a schema from a describe response (`GET sobjects/{name}/describe`).
    pub fn from_describe(describe: &serde_json::Value) -> Result<Self> {
        let describe: DescribeResult = serde_json::from_value(describe.clone())?;

        let fields = describe
            .fields
            .into_iter()
            .map(|f| {
                let flags = FieldFlags {
                    nillable: f.nillable,
                    unique: f.unique,
                    readonly: f.calculated || f.auto_number || (!f.createable && !f.updateable),
                    createable: f.createable,
                    updateable: f.updateable,
                    external_id: f.external_id,
                    calculated: f.calculated,
                    filterable: f.filterable,
                    sortable: f.sortable,
                    groupable: f.groupable,
                };
                FieldSchema {
                    field_type: FieldType::from_describe(&f.kind, &f.reference_to),
                    name: f.name,
                    flags,
                    relationship_name: f.relationship_name,
                }
            })
            .collect();

        Self::new(describe.name, fields)
    }
}

#[derive(Debug, Deserialize)]
struct DescribeResult {
    name: String,
    fields: Vec<DescribeField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeField {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    nillable: bool,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    createable: bool,
    #[serde(default)]
    updateable: bool,
    #[serde(default)]
    external_id: bool,
    #[serde(default)]
    calculated: bool,
    #[serde(default)]
    auto_number: bool,
    #[serde(default)]
    filterable: bool,
    #[serde(default)]
    sortable: bool,
    #[serde(default)]
    groupable: bool,
    #[serde(default)]
    reference_to: Vec<String>,
    #[serde(default)]
    relationship_name: Option<String>,
}

/// Name-to-schema lookup. Read-mostly; registration happens at startup or
/// after a describe call.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<SObjectSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static SchemaRegistry {
        static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SchemaRegistry::new)
    }

    /// Register (or replace) a schema, returning the shared handle.
    pub fn register(&self, schema: SObjectSchema) -> Arc<SObjectSchema> {
        let schema = Arc::new(schema);
        debug!(sobject = schema.name(), fields = schema.fields().len(), "Registering schema");
        self.schemas
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(schema.name().to_string(), schema.clone());
        schema
    }

    pub fn get(&self, name: &str) -> Result<Arc<SObjectSchema>> {
        self.find(name)
            .ok_or_else(|| Error::new(ErrorKind::SchemaUnknown(name.to_string())))
    }

    pub fn find(&self, name: &str) -> Option<Arc<SObjectSchema>> {
        self.schemas
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<SObjectSchema>> {
        self.schemas
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name)
    }
}
