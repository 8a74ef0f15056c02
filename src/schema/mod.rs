//! Field metadata for record types.
//!
//! Each record type declares which of its fields are encrypted (and with
//! which value-type), which hold embedded records, and which type it extends.
//! The [`SchemaRegistry`] merges inherited fields and answers the questions
//! the field processor asks on every pass, memoizing each answer per type.
//!
//! # Example
//!
//! ```
//! use fieldcrypt::schema::{SchemaRegistry, TypeSchema, ValueType};
//!
//! let registry = SchemaRegistry::builder()
//!     .schema(TypeSchema::new("Base").encrypted("secret_base", ValueType::String))
//!     .schema(
//!         TypeSchema::new("Child")
//!             .extends("Base")
//!             .encrypted("secret_child", ValueType::DateTime),
//!     )
//!     .build()?;
//!
//! let names: Vec<&str> = registry
//!     .resolve("Child")
//!     .iter()
//!     .map(|field| field.name.as_str())
//!     .collect();
//! assert_eq!(names, vec!["secret_base", "secret_child"]);
//! assert_eq!(registry.root_type("Child"), "Base");
//! # Ok::<(), fieldcrypt::errors::SchemaError>(())
//! ```

mod registry;

pub use self::registry::{SchemaRegistry, SchemaRegistryBuilder};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared value-type of an encrypted field.
///
/// Determines how the value is converted to its canonical string form before
/// encryption and back after decryption. Unknown type names fall back to
/// `String`, the identity transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueType {
    /// Plain text, stored as is.
    String,
    /// Date and time, stored as `YYYY-MM-DD HH:MM:SS`.
    DateTime,
    /// Calendar date, stored as `YYYY-MM-DD`.
    Date,
    /// Structured value, stored as compact JSON.
    Json,
}

impl ValueType {
    /// Canonical lowercase name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::DateTime => "datetime",
            ValueType::Date => "date",
            ValueType::Json => "json",
        }
    }
}

impl From<&str> for ValueType {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "datetime" | "datetime_immutable" => ValueType::DateTime,
            "date" | "date_immutable" => ValueType::Date,
            "json" | "json_array" => ValueType::Json,
            _ => ValueType::String,
        }
    }
}

impl From<String> for ValueType {
    fn from(name: String) -> Self {
        ValueType::from(name.as_str())
    }
}

impl From<ValueType> for String {
    fn from(value_type: ValueType) -> Self {
        value_type.as_str().to_string()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field of a record type as seen by the field processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Type that declares the field; filled in at registration.
    #[serde(skip)]
    pub declaring_type: String,
    /// Field name.
    pub name: String,
    /// Declared value-type when the field is encrypted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<ValueType>,
    /// Target record type when the field holds an embedded record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<String>,
}

impl FieldDescriptor {
    /// True if the field holds an embedded record.
    pub fn is_embedded(&self) -> bool {
        self.embedded.is_some()
    }

    /// Declared value-type if the field is encrypted.
    pub fn encrypted_type(&self) -> Option<ValueType> {
        self.encrypted
    }
}

/// Declaration of one record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSchema {
    /// Type name, matching [`crate::record::Record::record_type`].
    pub name: String,
    /// Parent type whose fields are inherited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Fields declared by this type itself, in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl TypeSchema {
    /// Starts a declaration for `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extends: None,
            fields: Vec::new(),
        }
    }

    /// Inherits the fields of `parent`.
    pub fn extends(mut self, parent: &str) -> Self {
        self.extends = Some(parent.to_string());
        self
    }

    /// Declares an encrypted field.
    pub fn encrypted(self, field: &str, value_type: ValueType) -> Self {
        self.push(field, Some(value_type), None)
    }

    /// Declares a field holding an embedded record of type `target`.
    pub fn embedded(self, field: &str, target: &str) -> Self {
        self.push(field, None, Some(target.to_string()))
    }

    /// Declares a field that is neither encrypted nor embedded.
    pub fn plain(self, field: &str) -> Self {
        self.push(field, None, None)
    }

    fn push(mut self, field: &str, encrypted: Option<ValueType>, embedded: Option<String>) -> Self {
        self.fields.push(FieldDescriptor {
            declaring_type: self.name.clone(),
            name: field.to_string(),
            encrypted,
            embedded,
        });
        self
    }
}

/// Top-level layout of a JSON schema file.
///
/// ```json
/// {
///   "types": [
///     { "name": "User", "fields": [
///         { "name": "secret", "encrypted": "string" },
///         { "name": "address", "embedded": "Address" } ] },
///     { "name": "Address", "fields": [ { "name": "street", "encrypted": "string" } ] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    /// Declared record types.
    #[serde(default)]
    pub types: Vec<TypeSchema>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_names() {
        assert_eq!(ValueType::from("datetime"), ValueType::DateTime);
        assert_eq!(ValueType::from("JSON"), ValueType::Json);
        assert_eq!(ValueType::from("date"), ValueType::Date);
        assert_eq!(ValueType::from("string"), ValueType::String);
        assert_eq!(ValueType::from("decimal"), ValueType::String);
    }

    #[test]
    fn test_builder_records_declaring_type() {
        let schema = TypeSchema::new("User")
            .encrypted("secret", ValueType::String)
            .embedded("address", "Address")
            .plain("name");

        assert_eq!(schema.fields.len(), 3);
        assert!(schema.fields.iter().all(|f| f.declaring_type == "User"));
        assert_eq!(schema.fields[0].encrypted_type(), Some(ValueType::String));
        assert!(schema.fields[1].is_embedded());
        assert!(!schema.fields[2].is_embedded());
        assert_eq!(schema.fields[2].encrypted_type(), None);
    }

    #[test]
    fn test_schema_file_parsing() {
        let file: SchemaFile = serde_json::from_str(
            r#"{"types":[{"name":"User","extends":"Person","fields":[
                {"name":"secret","encrypted":"json"},
                {"name":"address","embedded":"Address"},
                {"name":"nickname"}]}]}"#,
        )
        .unwrap();

        let user = &file.types[0];
        assert_eq!(user.extends.as_deref(), Some("Person"));
        assert_eq!(user.fields[0].encrypted, Some(ValueType::Json));
        assert_eq!(user.fields[1].embedded.as_deref(), Some("Address"));
        assert_eq!(user.fields[2].encrypted, None);
    }
}
