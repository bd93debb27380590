//! Schema-backed records with dirty-field tracking.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::schema::SObjectSchema;
use crate::value::FieldValue;

/// One Salesforce record.
///
/// Values are validated against the schema on assignment. Every assignment
/// through [`Record::set`] marks the field dirty; values produced by the
/// decoders start clean.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<SObjectSchema>,
    values: HashMap<String, FieldValue>,
    dirty: BTreeSet<String>,
}

impl Record {
    pub fn new(schema: Arc<SObjectSchema>) -> Self {
        Self {
            schema,
            values: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Entity name, e.g. `Account`.
    pub fn sobject(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<SObjectSchema> {
        &self.schema
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// True if the field holds a value, including an explicit `Null`.
    pub fn is_set(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Assign a field, marking it dirty.
    ///
    /// Fails for fields the schema does not declare, for values of the wrong
    /// kind, and for read-only fields that already hold a value.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        let Some(schema) = self.schema.field(field) else {
            return Err(Error::new(ErrorKind::UnknownField {
                sobject: self.schema.name().to_string(),
                field: field.to_string(),
            }));
        };

        if !value.fits(&schema.field_type) {
            return Err(Error::new(ErrorKind::TypeMismatch {
                field: field.to_string(),
                expected: schema.field_type.name().to_string(),
                actual: match &value {
                    FieldValue::Text(text) => format!("text {text:?}"),
                    other => other.kind_name().to_string(),
                },
            }));
        }

        if schema.flags.readonly && self.values.contains_key(field) {
            return Err(Error::new(ErrorKind::ReadOnly(field.to_string())));
        }

        self.values.insert(field.to_string(), value);
        self.dirty.insert(field.to_string());
        Ok(())
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Result<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Attach a nested related record under a relationship name such as
    /// `Owner` or `Account__r` (used for upserts keyed by an external id).
    pub fn set_related(
        &mut self,
        relationship: &str,
        values: BTreeMap<String, FieldValue>,
    ) -> Result<()> {
        if self.schema.relationship(relationship).is_none() {
            return Err(Error::new(ErrorKind::UnknownField {
                sobject: self.schema.name().to_string(),
                field: relationship.to_string(),
            }));
        }
        self.values
            .insert(relationship.to_string(), FieldValue::Related(values));
        self.dirty.insert(relationship.to_string());
        Ok(())
    }

    /// Remove a field entirely (as opposed to setting it to `Null`).
    pub fn unset(&mut self, field: &str) -> Option<FieldValue> {
        self.dirty.remove(field);
        self.values.remove(field)
    }

    /// The record id, if present.
    pub fn id(&self) -> Option<&str> {
        self.values.get(self.schema.id_field()).and_then(FieldValue::as_str)
    }

    /// Store an id assigned by the server. Does not mark the record dirty.
    pub fn assign_id(&mut self, id: impl Into<String>) {
        let id_field = self.schema.id_field().to_string();
        self.values.insert(id_field, FieldValue::Text(id.into()));
    }

    /// Drop the id, e.g. after the record was deleted remotely.
    pub fn clear_id(&mut self) {
        let id_field = self.schema.id_field().to_string();
        self.unset(&id_field);
    }

    pub fn dirty_fields(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Forget pending changes after a successful save.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Set fields in schema order, followed by related values in name order.
    pub fn entries(&self) -> Vec<(&str, &FieldValue)> {
        let mut entries: Vec<(&str, &FieldValue)> = self
            .schema
            .field_names()
            .filter_map(|name| self.values.get_key_value(name))
            .map(|(name, value)| (name.as_str(), value))
            .collect();

        let mut related: Vec<(&str, &FieldValue)> = self
            .values
            .iter()
            .filter(|(name, _)| self.schema.position(name).is_none())
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        related.sort_by(|a, b| a.0.cmp(b.0));
        entries.extend(related);
        entries
    }

    /// Store a decoded value: no validation, not dirty.
    pub(crate) fn load(&mut self, field: String, value: FieldValue) {
        self.values.insert(field, value);
    }
}

/// True when every record belongs to the same entity.
pub fn is_single_type(records: &[Record]) -> bool {
    records
        .windows(2)
        .all(|pair| pair[0].sobject() == pair[1].sobject())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, FieldType};

    fn account_schema() -> Arc<SObjectSchema> {
        Arc::new(
            SObjectSchema::new(
                "Account",
                vec![
                    FieldSchema::new("Id", FieldType::Id).readonly(),
                    FieldSchema::new("Name", FieldType::Text),
                    FieldSchema::new("NumberOfEmployees", FieldType::Int),
                    FieldSchema::new("OwnerId", FieldType::Reference(vec!["User".into()]))
                        .with_relationship("Owner"),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_set_marks_dirty_and_validates() {
        let mut account = Record::new(account_schema());
        account.set("Name", "Acme").unwrap();
        account.set("NumberOfEmployees", 12).unwrap();

        assert_eq!(account.get("Name"), Some(&FieldValue::from("Acme")));
        assert_eq!(
            account.dirty_fields().iter().collect::<Vec<_>>(),
            vec!["Name", "NumberOfEmployees"]
        );

        let err = account.set("Nmae", "typo").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownField { .. }));

        let err = account.set("NumberOfEmployees", "twelve").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn test_null_is_distinct_from_absent() {
        let mut account = Record::new(account_schema());
        account.set("Name", FieldValue::Null).unwrap();
        assert!(account.is_set("Name"));
        assert!(!account.is_set("NumberOfEmployees"));

        account.unset("Name");
        assert!(!account.is_set("Name"));
        assert!(!account.is_dirty());
    }

    #[test]
    fn test_readonly_id_can_be_set_once() {
        let mut account = Record::new(account_schema());
        account.set("Id", "001000000000001AAA").unwrap();
        let err = account.set("Id", "001000000000002AAA").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ReadOnly(_)));

        account.clear_id();
        assert_eq!(account.id(), None);
        account.assign_id("001000000000003AAA");
        assert_eq!(account.id(), Some("001000000000003AAA"));
    }

    #[test]
    fn test_entries_follow_schema_order() {
        let mut account = Record::new(account_schema());
        account.set("NumberOfEmployees", 3).unwrap();
        account.set("Name", "Acme").unwrap();
        let mut owner = BTreeMap::new();
        owner.insert("Email".to_string(), FieldValue::from("a@example.com"));
        account.set_related("Owner", owner).unwrap();

        let names: Vec<&str> = account.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Name", "NumberOfEmployees", "Owner"]);

        assert!(account.set_related("Parent", BTreeMap::new()).is_err());
    }

    #[test]
    fn test_single_type_check() {
        let schema = account_schema();
        let contact = Arc::new(SObjectSchema::new("Contact", vec![]).unwrap());
        let same = vec![Record::new(schema.clone()), Record::new(schema.clone())];
        assert!(is_single_type(&same));
        assert!(!is_single_type(&[Record::new(schema), Record::new(contact)]));
    }
}
