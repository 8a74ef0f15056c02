use super::{FieldValue, Record};
use crate::errors::FieldResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A schema-agnostic record backed by a field map.
///
/// Used where record types are only known at runtime, e.g. when the batch
/// tooling reads its types from a schema file. Any field name is accepted;
/// fields never set read as null.
///
/// # Examples
///
/// ```
/// use fieldcrypt::record::{Document, FieldValue, Record};
///
/// let mut doc = Document::new("User", "42");
/// doc.insert("secret", "hello");
/// assert_eq!(doc.field("secret"), Some(FieldValue::Text("hello".to_string())));
/// assert_eq!(doc.field("missing"), Some(FieldValue::Null));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    record_type: String,
    key: String,
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    embedded: BTreeMap<String, Document>,
}

impl Document {
    /// Creates an empty document.
    pub fn new(record_type: &str, key: &str) -> Self {
        Self {
            record_type: record_type.to_string(),
            key: key.to_string(),
            fields: BTreeMap::new(),
            embedded: BTreeMap::new(),
        }
    }

    /// Persisted key of the document.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Sets a field value, builder style.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field value.
    pub fn insert(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Attaches a nested document under an embedded field.
    pub fn embed(&mut self, name: &str, document: Document) {
        self.embedded.insert(name.to_string(), document);
    }

    /// Borrow a field value without cloning.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

impl Record for Document {
    fn record_type(&self) -> &str {
        &self.record_type
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(self.fields.get(name).cloned().unwrap_or_default())
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> FieldResult<()> {
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    fn embedded(&self, name: &str) -> Option<&dyn Record> {
        self.embedded.get(name).map(|doc| doc as &dyn Record)
    }

    fn embedded_mut(&mut self, name: &str) -> Option<&mut dyn Record> {
        self.embedded.get_mut(name).map(|doc| doc as &mut dyn Record)
    }
}
