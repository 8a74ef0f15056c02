//! Encryption and decryption of the declared fields of one record.
//!
//! [`FieldProcessor::process`] walks the resolved fields of a record, recurses
//! into embedded records, and converts encrypted fields between their stored
//! form (`encrypt(encode(value))` followed by the marker) and their plain
//! value. It owns the per-cycle [`DecryptionCache`] and the encrypt/decrypt
//! counters; the lifecycle subscriber decides when each is reset.
//!
//! Processing is in place and stops at the first failing field.

mod cache;

pub use self::cache::DecryptionCache;

use crate::codec;
use crate::constants::ENCRYPTION_MARKER;
use crate::crypto::Encryptor;
use crate::errors::{FieldError, FieldResult};
use crate::record::{unknown_field, FieldValue, InstanceId, Record};
use crate::schema::{SchemaRegistry, ValueType};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Which way a pass converts encrypted fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Plain values become ciphertext with the marker appended.
    Encrypt,
    /// Marked ciphertext becomes the decoded plain value.
    Decrypt,
}

/// Number of field values actually sent through the encryptor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    /// Values encrypted. Restores from the decryption cache do not count.
    pub encrypted: u64,
    /// Values decrypted.
    pub decrypted: u64,
}

/// Where the fields being walked live: the top-level record's cache bucket
/// and instance, shared by every record embedded in it.
struct Scope<'a> {
    root_type: &'a str,
    instance: InstanceId,
    encryptor: &'a dyn Encryptor,
    direction: Direction,
}

/// The field-processing core.
///
/// # Example
///
/// ```
/// use fieldcrypt::crypto::SymmetricEncryptor;
/// use fieldcrypt::processor::{Direction, FieldProcessor};
/// use fieldcrypt::record::{Document, FieldValue, InstanceId, Record};
/// use fieldcrypt::schema::{SchemaRegistry, TypeSchema, ValueType};
/// use std::sync::Arc;
///
/// let schemas = SchemaRegistry::builder()
///     .schema(TypeSchema::new("User").encrypted("secret", ValueType::String))
///     .build()?;
/// let encryptor = Arc::new(SymmetricEncryptor::new(SymmetricEncryptor::generate_key()));
/// let mut processor = FieldProcessor::new(Arc::new(schemas), Some(encryptor));
///
/// let mut user = Document::new("User", "1").with("secret", "hello");
/// processor.process(&mut user, InstanceId(1), Direction::Encrypt)?;
/// assert!(user.field("secret").unwrap().as_text().unwrap().ends_with("<ENC>"));
///
/// processor.process(&mut user, InstanceId(1), Direction::Decrypt)?;
/// assert_eq!(user.field("secret"), Some(FieldValue::from("hello")));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct FieldProcessor {
    encryptor: Option<Arc<dyn Encryptor>>,
    schemas: Arc<SchemaRegistry>,
    cache: DecryptionCache,
    counters: Counters,
    wrap_errors: bool,
}

impl FieldProcessor {
    /// Creates a processor. Without an encryptor every pass is a no-op.
    pub fn new(schemas: Arc<SchemaRegistry>, encryptor: Option<Arc<dyn Encryptor>>) -> Self {
        Self {
            encryptor,
            schemas,
            cache: DecryptionCache::new(),
            counters: Counters::default(),
            wrap_errors: false,
        }
    }

    /// Reports codec and crypto failures as `FieldError::Processing`.
    pub fn with_wrapped_errors(mut self, wrap_errors: bool) -> Self {
        self.wrap_errors = wrap_errors;
        self
    }

    /// The active encryptor, if any.
    pub fn encryptor(&self) -> Option<&Arc<dyn Encryptor>> {
        self.encryptor.as_ref()
    }

    /// Swaps the active encryptor, returning the previous one.
    pub fn replace_encryptor(
        &mut self,
        encryptor: Option<Arc<dyn Encryptor>>,
    ) -> Option<Arc<dyn Encryptor>> {
        std::mem::replace(&mut self.encryptor, encryptor)
    }

    /// The schema registry fields are resolved against.
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    /// Current counter values.
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// The per-cycle decryption cache.
    pub fn cache(&self) -> &DecryptionCache {
        &self.cache
    }

    /// True if the cache holds entries for the hierarchy `record_type` belongs to.
    pub fn has_cached(&self, record_type: &str) -> bool {
        self.cache.has_type(self.schemas.root_type(record_type))
    }

    /// Drops the decryption cache, keeping the counters.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Drops the decryption cache and zeroes both counters.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.counters = Counters::default();
    }

    /// Encrypts or decrypts every encrypted field of `record` in place,
    /// including those of embedded records.
    ///
    /// `instance` identifies the record within the current unit of work and
    /// scopes its decryption cache entries.
    ///
    /// # Errors
    ///
    /// Returns the first codec or crypto failure (wrapped when configured), or
    /// `FieldError::UnknownField` if the record lacks a declared field. Fields
    /// after the failing one are left untouched.
    pub fn process(
        &mut self,
        record: &mut dyn Record,
        instance: InstanceId,
        direction: Direction,
    ) -> FieldResult<()> {
        let Some(encryptor) = self.encryptor.clone() else {
            return Ok(());
        };

        let schemas = Arc::clone(&self.schemas);
        let record_type = record.record_type().to_string();
        if !schemas.contains_encrypted(&record_type) {
            return Ok(());
        }

        debug!(
            "{:?} pass over {} {} with '{}'",
            direction,
            record_type,
            instance,
            encryptor.name()
        );

        let scope = Scope {
            root_type: schemas.root_type(&record_type),
            instance,
            encryptor: encryptor.as_ref(),
            direction,
        };
        self.walk(record, &scope, None)
    }

    fn walk(
        &mut self,
        record: &mut dyn Record,
        scope: &Scope<'_>,
        prefix: Option<&str>,
    ) -> FieldResult<()> {
        let schemas = Arc::clone(&self.schemas);
        let fields = schemas.resolve(record.record_type());

        for field in fields {
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, field.name),
                None => field.name.clone(),
            };

            if field.is_embedded() {
                if let Some(nested) = record.embedded_mut(&field.name) {
                    if schemas.contains_encrypted(nested.record_type()) {
                        self.walk(nested, scope, Some(&path))?;
                    }
                }
                continue;
            }

            let Some(value_type) = field.encrypted_type() else {
                continue;
            };

            let value = record
                .field(&field.name)
                .ok_or_else(|| unknown_field(&*record, &field.name))?;
            if value.is_empty() {
                continue;
            }

            let result = match scope.direction {
                Direction::Encrypt => {
                    self.encrypt_field(record, &field.name, &path, &value, value_type, scope)
                }
                Direction::Decrypt => {
                    self.decrypt_field(record, &field.name, &path, &value, value_type, scope)
                }
            };
            result.map_err(|error| self.wrap(error, record.record_type(), &path))?;
        }

        Ok(())
    }

    fn encrypt_field(
        &mut self,
        record: &mut dyn Record,
        name: &str,
        path: &str,
        value: &FieldValue,
        value_type: ValueType,
        scope: &Scope<'_>,
    ) -> FieldResult<()> {
        let canonical = codec::encode(value, value_type)?;
        if canonical.ends_with(ENCRYPTION_MARKER) {
            return Ok(());
        }

        if let Some(original) = self
            .cache
            .get(scope.root_type, scope.instance, path, &canonical)
        {
            debug!("Restoring unchanged ciphertext for field '{}'", path);
            return record.set_field(name, FieldValue::Text(original.to_string()));
        }

        let sealed = scope.encryptor.encrypt(&canonical)?;
        record.set_field(name, FieldValue::Text(format!("{}{}", sealed, ENCRYPTION_MARKER)))?;
        self.counters.encrypted += 1;
        Ok(())
    }

    fn decrypt_field(
        &mut self,
        record: &mut dyn Record,
        name: &str,
        path: &str,
        value: &FieldValue,
        value_type: ValueType,
        scope: &Scope<'_>,
    ) -> FieldResult<()> {
        // Only marked text is ciphertext.
        let Some(stored) = value.as_text() else {
            return Ok(());
        };
        let Some(ciphertext) = stored.strip_suffix(ENCRYPTION_MARKER) else {
            return Ok(());
        };

        let plaintext = scope.encryptor.decrypt(ciphertext)?;
        self.cache.insert(
            scope.root_type,
            scope.instance,
            path,
            plaintext.clone(),
            stored.to_string(),
        );

        let decoded = codec::decode(plaintext, value_type)?;
        record.set_field(name, decoded)?;
        self.counters.decrypted += 1;
        Ok(())
    }

    fn wrap(&self, error: FieldError, record_type: &str, field: &str) -> FieldError {
        match error {
            error @ (FieldError::Crypto(_) | FieldError::Codec(_)) if self.wrap_errors => {
                FieldError::Processing {
                    record_type: record_type.to_string(),
                    field: field.to_string(),
                    source: Box::new(error),
                }
            }
            error => error,
        }
    }
}

impl fmt::Debug for FieldProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldProcessor")
            .field("encryptor", &self.encryptor.as_ref().map(|e| e.name().to_string()))
            .field("cache", &self.cache)
            .field("counters", &self.counters)
            .field("wrap_errors", &self.wrap_errors)
            .finish()
    }
}
