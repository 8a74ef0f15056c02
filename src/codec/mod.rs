//! Conversion between field values and the strings the encryptor works on.
//!
//! Encryptors only transform strings, so every encrypted field passes through
//! [`encode`] on its way to the encryptor and through [`decode`] on its way
//! back. Marked ciphertext passes through untouched. Any other `Text` value is
//! brought into the canonical form of the declared type, so whatever gets
//! encrypted can always be decoded again.

use crate::constants::{DATETIME_FORMAT, DATE_FORMAT, ENCRYPTION_MARKER};
use crate::errors::CodecError;
use crate::record::FieldValue;
use crate::schema::ValueType;
use chrono::{NaiveDate, NaiveDateTime};

/// Converts `value` to its canonical string form for `value_type`.
///
/// Date and time values are written without sub-second precision.
///
/// # Errors
///
/// Returns `CodecError::TypeMismatch` if `value` is neither `Text` nor the
/// variant `value_type` describes, `CodecError::InvalidDate` or
/// `CodecError::InvalidDateTime` if unmarked text does not parse as the declared
/// date type, and `CodecError::InvalidJson` if a JSON value cannot be serialized.
///
/// # Examples
///
/// ```
/// use fieldcrypt::codec::encode;
/// use fieldcrypt::record::FieldValue;
/// use fieldcrypt::schema::ValueType;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// assert_eq!(encode(&FieldValue::Date(date), ValueType::Date)?, "2024-03-01");
/// assert_eq!(encode(&FieldValue::from("abc"), ValueType::Json)?, r#""abc""#);
/// # Ok::<(), fieldcrypt::errors::CodecError>(())
/// ```
pub fn encode(value: &FieldValue, value_type: ValueType) -> Result<String, CodecError> {
    match (value, value_type) {
        (FieldValue::Null, _) => Ok(String::new()),
        (FieldValue::Text(text), _) if text.ends_with(ENCRYPTION_MARKER) => Ok(text.clone()),
        (FieldValue::Text(text), ValueType::String) => Ok(text.clone()),
        (FieldValue::Text(text), ValueType::DateTime) => {
            NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
                .map(|dt| dt.format(DATETIME_FORMAT).to_string())
                .map_err(|source| CodecError::InvalidDateTime {
                    value: text.clone(),
                    source,
                })
        }
        (FieldValue::Text(text), ValueType::Date) => {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(|date| date.format(DATE_FORMAT).to_string())
                .map_err(|source| CodecError::InvalidDate {
                    value: text.clone(),
                    source,
                })
        }
        (FieldValue::Text(text), ValueType::Json) => {
            serde_json::to_string(&serde_json::Value::String(text.clone()))
                .map_err(CodecError::InvalidJson)
        }
        (FieldValue::DateTime(dt), ValueType::DateTime) => {
            Ok(dt.format(DATETIME_FORMAT).to_string())
        }
        (FieldValue::Date(date), ValueType::Date) => Ok(date.format(DATE_FORMAT).to_string()),
        (FieldValue::Json(json), ValueType::Json) => {
            serde_json::to_string(json).map_err(CodecError::InvalidJson)
        }
        (other, expected) => Err(CodecError::TypeMismatch {
            expected: expected.to_string(),
            found: other.kind().to_string(),
        }),
    }
}

/// Parses decrypted `text` into the value `value_type` describes.
///
/// # Errors
///
/// Returns the matching `CodecError` variant when `text` is not a valid
/// datetime, date or JSON document.
pub fn decode(text: String, value_type: ValueType) -> Result<FieldValue, CodecError> {
    match value_type {
        ValueType::String => Ok(FieldValue::Text(text)),
        ValueType::DateTime => NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT)
            .map(FieldValue::DateTime)
            .map_err(|source| CodecError::InvalidDateTime { value: text, source }),
        ValueType::Date => NaiveDate::parse_from_str(&text, DATE_FORMAT)
            .map(FieldValue::Date)
            .map_err(|source| CodecError::InvalidDate { value: text, source }),
        ValueType::Json => serde_json::from_str(&text)
            .map(FieldValue::Json)
            .map_err(CodecError::InvalidJson),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_datetime_format() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        let encoded = encode(&FieldValue::DateTime(dt), ValueType::DateTime).unwrap();
        assert_eq!(encoded, "2024-01-15 09:05:03");
        assert_eq!(
            decode(encoded, ValueType::DateTime).unwrap(),
            FieldValue::DateTime(dt)
        );
    }

    #[test]
    fn test_json_is_structural() {
        let encoded = encode(&FieldValue::Json(json!({"a": 1})), ValueType::Json).unwrap();
        assert_eq!(encoded, r#"{"a":1}"#);

        let decoded = decode(r#"{ "a" : 1 }"#.to_string(), ValueType::Json).unwrap();
        assert_eq!(decoded, FieldValue::Json(json!({"a": 1})));
    }

    #[test]
    fn test_ciphertext_passes_through_any_type() {
        let types = [
            ValueType::String,
            ValueType::DateTime,
            ValueType::Date,
            ValueType::Json,
        ];
        for value_type in types {
            assert_eq!(
                encode(&FieldValue::from("abc<ENC>"), value_type).unwrap(),
                "abc<ENC>"
            );
        }
    }

    #[test]
    fn test_plain_text_under_json_decodes_again() {
        let encoded = encode(&FieldValue::from("hello"), ValueType::Json).unwrap();
        assert_eq!(encoded, r#""hello""#);
        assert_eq!(
            decode(encoded, ValueType::Json).unwrap(),
            FieldValue::Json(json!("hello"))
        );
    }

    #[test]
    fn test_plain_text_under_date_types_is_validated() {
        assert!(matches!(
            encode(&FieldValue::from("tomorrow"), ValueType::Date),
            Err(CodecError::InvalidDate { .. })
        ));
        assert!(matches!(
            encode(&FieldValue::from("2024-01-15"), ValueType::DateTime),
            Err(CodecError::InvalidDateTime { .. })
        ));

        let encoded = encode(&FieldValue::from("2024-01-15"), ValueType::Date).unwrap();
        assert_eq!(
            decode(encoded, ValueType::Date).unwrap(),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        let encoded =
            encode(&FieldValue::from("2024-01-15 09:05:03"), ValueType::DateTime).unwrap();
        assert_eq!(encoded, "2024-01-15 09:05:03");
    }

    #[test]
    fn test_mismatch_is_reported() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        match encode(&FieldValue::Date(date), ValueType::Json) {
            Err(CodecError::TypeMismatch { expected, found }) => {
                assert_eq!(expected, "json");
                assert_eq!(found, "date");
            }
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(
            decode("yesterday".to_string(), ValueType::Date),
            Err(CodecError::InvalidDate { .. })
        ));
        assert!(matches!(
            decode("2024-01-15".to_string(), ValueType::DateTime),
            Err(CodecError::InvalidDateTime { .. })
        ));
        assert!(matches!(
            decode("{".to_string(), ValueType::Json),
            Err(CodecError::InvalidJson(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_text_roundtrip(s in ".*") {
            let encoded = encode(&FieldValue::Text(s.clone()), ValueType::String).unwrap();
            prop_assert_eq!(decode(encoded, ValueType::String).unwrap(), FieldValue::Text(s));
        }

        #[test]
        fn prop_datetime_roundtrip(secs in 0i64..4_102_444_800i64) {
            let dt = chrono::DateTime::from_timestamp(secs, 0).unwrap().naive_utc();
            let encoded = encode(&FieldValue::DateTime(dt), ValueType::DateTime).unwrap();
            prop_assert_eq!(
                decode(encoded, ValueType::DateTime).unwrap(),
                FieldValue::DateTime(dt)
            );
        }

        #[test]
        fn prop_json_roundtrip(n in any::<i64>(), s in "[a-z]{0,12}", flag in any::<bool>()) {
            let value = json!({"n": n, "s": s, "items": [flag, null]});
            let encoded = encode(&FieldValue::Json(value.clone()), ValueType::Json).unwrap();
            prop_assert_eq!(decode(encoded, ValueType::Json).unwrap(), FieldValue::Json(value));
        }
    }
}
