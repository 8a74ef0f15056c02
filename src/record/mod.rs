//! Records and the values their encryptable fields hold.
//!
//! Record types describe themselves through two traits instead of runtime
//! reflection: [`RecordType`] hands a [`TypeSchema`] to the schema registry at
//! startup, and [`Record`] gives the field processor read/write access to the
//! declared fields of a live instance.

mod document;

pub use self::document::Document;

use crate::errors::{FieldError, FieldResult};
use crate::schema::TypeSchema;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an in-memory record instance within one unit of work.
///
/// Assigned by the persistence layer; two distinct objects never share an id
/// while they are both tracked. Unrelated to the record's persisted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Value of an encryptable field.
///
/// A field in its encrypted state always holds `Text` (ciphertext plus the
/// encryption marker); after decryption it holds whatever variant its declared
/// value-type decodes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// No value.
    #[default]
    Null,
    /// Plain text, or ciphertext ending with the encryption marker.
    Text(String),
    /// A date and time without timezone.
    DateTime(NaiveDateTime),
    /// A calendar date.
    Date(NaiveDate),
    /// A structured JSON value.
    Json(serde_json::Value),
}

impl FieldValue {
    /// Returns true for values that are never encrypted: null, empty text, and
    /// JSON null, empty string, empty array or empty object.
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldcrypt::record::FieldValue;
    ///
    /// assert!(FieldValue::Null.is_empty());
    /// assert!(FieldValue::Text(String::new()).is_empty());
    /// assert!(FieldValue::Json(serde_json::json!({})).is_empty());
    /// assert!(!FieldValue::Text("0".to_string()).is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::DateTime(_) | FieldValue::Date(_) => false,
            FieldValue::Json(value) => match value {
                serde_json::Value::Null => true,
                serde_json::Value::String(s) => s.is_empty(),
                serde_json::Value::Array(items) => items.is_empty(),
                serde_json::Value::Object(map) => map.is_empty(),
                _ => false,
            },
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Text(_) => "text",
            FieldValue::DateTime(_) => "datetime",
            FieldValue::Date(_) => "date",
            FieldValue::Json(_) => "json",
        }
    }

    /// Returns the text if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }
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

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::DateTime(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::Json(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Field access to a live record instance.
///
/// Implementations expose every field named in their registered schema.
/// `field` returns `None` only for names the record does not have at all; a
/// declared field without a value reads as `Some(FieldValue::Null)`.
pub trait Record {
    /// Runtime type name; must match a registered [`TypeSchema`] name.
    fn record_type(&self) -> &str;

    /// Current value of an encryptable or plain field.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Replaces the value of a field.
    ///
    /// # Errors
    ///
    /// Returns `FieldError::UnknownField` if the record has no such field.
    fn set_field(&mut self, name: &str, value: FieldValue) -> FieldResult<()>;

    /// The nested record held by an embedded field, if present.
    fn embedded(&self, _name: &str) -> Option<&dyn Record> {
        None
    }

    /// Mutable access to the nested record held by an embedded field.
    fn embedded_mut(&mut self, _name: &str) -> Option<&mut dyn Record> {
        None
    }

    /// False for lazy proxies whose state has not been loaded yet.
    fn is_initialized(&self) -> bool {
        true
    }
}

/// Static description of a record type, used for registration.
pub trait RecordType {
    /// Declares the type's fields.
    fn schema() -> TypeSchema;
}

/// Builds the error returned for a field the record does not expose.
pub fn unknown_field(record: &dyn Record, field: &str) -> FieldError {
    FieldError::UnknownField {
        record_type: record.record_type().to_string(),
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_emptiness() {
        assert!(FieldValue::Json(json!(null)).is_empty());
        assert!(FieldValue::Json(json!("")).is_empty());
        assert!(FieldValue::Json(json!([])).is_empty());
        assert!(!FieldValue::Json(json!([1])).is_empty());
        assert!(!FieldValue::Json(json!(false)).is_empty());
        assert!(!FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()).is_empty());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(FieldValue::from("a"), FieldValue::Text("a".to_string()));
        assert_eq!(FieldValue::from(None::<String>), FieldValue::Null);
        assert_eq!(
            FieldValue::from(Some(json!({"a": 1}))),
            FieldValue::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn test_serde_keeps_variant() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let encoded = serde_json::to_string(&FieldValue::Date(date)).unwrap();
        assert_eq!(encoded, r#"{"type":"date","value":"2024-01-15"}"#);

        let decoded: FieldValue = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, FieldValue::Date(date));

        let null: FieldValue = serde_json::from_str(r#"{"type":"null"}"#).unwrap();
        assert_eq!(null, FieldValue::Null);
    }

    #[test]
    fn test_instance_id_display() {
        assert_eq!(InstanceId(7).to_string(), "#7");
    }
}
