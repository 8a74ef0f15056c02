//! Error handling utilities for fieldcrypt.
//!
//! This module provides the central error type `AppError` which represents all
//! possible error conditions that might occur in the application, as well as the
//! convenience type alias `AppResult` for functions that can return these errors.
//!
//! The field-processing core has its own narrower error type, `FieldError`, so
//! that a persistence layer driving the lifecycle events only has to handle the
//! failures that encryption and decoding can actually produce.

use std::io;
use thiserror::Error;

/// Represents specific error cases that can occur during cryptographic operations.
///
/// This is the `CryptoFailure` kind: the encrypt/decrypt primitive failed because of
/// a bad key, malformed ciphertext, or an algorithm-level error.
///
/// # Examples
///
/// ```
/// use fieldcrypt::errors::CryptoError;
///
/// let error = CryptoError::DecryptionFailed("wrong key or tampered data".to_string());
/// let message = format!("{}", error);
/// assert!(message.contains("Decryption failed"));
/// assert!(message.contains("wrong key"));
/// ```
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Error during encryption operation.
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Error during decryption operation (wrong key or tampered data).
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Ciphertext is not in the format produced by the encryptor.
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Key material could not be imported.
    #[error("Invalid key: {0}. Keys must be {expected} bytes encoded as standard base64.", expected = crate::constants::KEY_SIZE)]
    InvalidKey(String),

    /// The requested encryptor name is neither built in nor registered.
    #[error("Unknown encryptor '{name}'. Supported encryptors: {supported}")]
    UnknownEncryptor {
        /// The name that was requested
        name: String,
        /// Comma separated list of known names
        supported: String,
    },

    /// No secret was configured and none could be loaded or generated.
    #[error("No secret available for encryptor '{encryptor}': {reason}. Set FIELDCRYPT_SECRET or enable key generation with FIELDCRYPT_GENERATE_SECRET=true.")]
    SecretUnavailable {
        /// The encryptor that needed the secret
        encryptor: String,
        /// Why the secret could not be resolved
        reason: String,
    },
}

/// Represents errors converting a field value to or from its canonical string form.
///
/// This is the `CodecFailure` kind.
///
/// # Examples
///
/// ```
/// use fieldcrypt::errors::CodecError;
///
/// let error = CodecError::TypeMismatch {
///     expected: "datetime".to_string(),
///     found: "json".to_string(),
/// };
/// assert!(format!("{}", error).contains("datetime"));
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// The field holds a value that its declared type cannot encode.
    #[error("Cannot encode a {found} value as declared type {expected}")]
    TypeMismatch {
        /// The declared value-type of the field
        expected: String,
        /// The kind of value actually held
        found: String,
    },

    /// The decrypted text is not a valid datetime.
    #[error("Invalid datetime '{value}': {source}")]
    InvalidDateTime {
        /// The text that failed to parse
        value: String,
        /// The underlying parse error
        #[source]
        source: chrono::ParseError,
    },

    /// The decrypted text is not a valid date.
    #[error("Invalid date '{value}': {source}")]
    InvalidDate {
        /// The text that failed to parse
        value: String,
        /// The underlying parse error
        #[source]
        source: chrono::ParseError,
    },

    /// JSON serialization or parsing failed.
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}

/// Errors produced while encrypting or decrypting the fields of a record.
///
/// Field processing never swallows a failure: the first error aborts the
/// remaining fields of the record and is returned unchanged, unless the
/// processor was configured to wrap errors, in which case codec and crypto
/// failures arrive as [`FieldError::Processing`].
#[derive(Debug, Error)]
pub enum FieldError {
    /// The encryptor failed.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// The value codec failed.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// A descriptor names a field the record does not expose.
    #[error("Record type '{record_type}' has no field '{field}'. Check that the registered schema matches the record implementation.")]
    UnknownField {
        /// Runtime type of the record
        record_type: String,
        /// The missing field
        field: String,
    },

    /// Wrapped codec or crypto failure (`ProcessingFailure`).
    #[error("Something went wrong encrypting/decrypting field '{field}' of '{record_type}'")]
    Processing {
        /// Runtime type of the record
        record_type: String,
        /// The field being processed when the failure occurred
        field: String,
        /// The original failure
        #[source]
        source: Box<FieldError>,
    },
}

/// A type alias for `Result<T, FieldError>` used by the field-processing core.
pub type FieldResult<T> = Result<T, FieldError>;

/// Errors raised while building a schema registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A type was registered twice.
    #[error("Record type '{0}' is registered more than once")]
    DuplicateType(String),

    /// A type extends a parent that was never registered.
    #[error("Record type '{child}' extends unknown type '{parent}'")]
    UnknownParent {
        /// The extending type
        child: String,
        /// The missing parent
        parent: String,
    },

    /// An embedded field points at a type that was never registered.
    #[error("Embedded field '{field}' of '{record_type}' targets unknown type '{target}'")]
    UnknownEmbedded {
        /// The declaring type
        record_type: String,
        /// The embedded field
        field: String,
        /// The missing target type
        target: String,
    },

    /// The inheritance chain loops back on itself.
    #[error("Inheritance cycle detected at record type '{0}'")]
    InheritanceCycle(String),

    /// A schema file could not be parsed.
    #[error("Invalid schema file: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Represents specific error cases that can occur during database operations.
///
/// # Examples
///
/// ```
/// use fieldcrypt::errors::DatabaseError;
///
/// let error = DatabaseError::NotFound("User/42".to_string());
/// assert!(format!("{}", error).contains("not found"));
/// ```
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLite database error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("Failed to get connection from pool: {0}\n\nThis may indicate database connection issues. Try closing other fieldcrypt instances.")]
    Pool(#[from] r2d2::Error),

    /// A stored body could not be serialized or deserialized.
    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No loader is registered for a stored record type.
    #[error("No loader registered for record type '{0}'")]
    UnknownRecordType(String),

    /// Requested record not found in the session.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A record with the same type and key is already part of the session.
    #[error("Record {0} is already tracked by this session. Load it instead of persisting a new instance.")]
    AlreadyTracked(String),
}

/// Represents all possible errors that can occur in fieldcrypt.
///
/// This enum is the central error type used across the application, with variants
/// for different error categories.
///
/// # Examples
///
/// Creating a configuration error:
/// ```
/// use fieldcrypt::errors::AppError;
///
/// let error = AppError::Config("Missing secret".to_string());
/// assert_eq!(format!("{}", error), "Configuration error: Missing secret");
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to cryptographic setup (key loading, encryptor selection).
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Errors encrypting or decrypting record fields.
    #[error("Field processing error: {0}")]
    Field(#[from] FieldError),

    /// Errors in the record schema.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Errors related to database operations.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
pub type AppResult<T> = Result<T, AppError>;
