//! Lifecycle hooks that keep encrypted fields transparent to the application.
//!
//! A persistence layer owns one [`EncryptSubscriber`] per unit of work and
//! calls its hooks as records move through load, flush and clear:
//!
//! | Hook | Effect |
//! |---|---|
//! | [`post_load`](EncryptSubscriber::post_load) | decrypt the loaded record |
//! | [`pre_flush`](EncryptSubscriber::pre_flush) | re-encrypt records decrypted this cycle, then drop the cache |
//! | [`on_flush`](EncryptSubscriber::on_flush) | encrypt scheduled inserts and updates, report changed ones |
//! | [`post_flush`](EncryptSubscriber::post_flush) | decrypt every loaded record again |
//! | [`on_clear`](EncryptSubscriber::on_clear) | drop the cache and zero the counters |
//!
//! Hooks are expected in that order and never concurrently. Errors are
//! returned as is; aborting the unit of work is the caller's job.

use crate::crypto::Encryptor;
use crate::errors::FieldResult;
use crate::processor::{Direction, FieldProcessor};
use crate::record::{InstanceId, Record};
use crate::schema::SchemaRegistry;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::debug;

/// Owner of a swappable encryptor.
///
/// Batch tooling drives records through `process` itself and suspends the
/// automatic hooks by swapping the encryptor out for the duration of a scope.
pub trait EncryptorSlot {
    /// The active encryptor, if any.
    fn encryptor(&self) -> Option<Arc<dyn Encryptor>>;

    /// Installs `encryptor`, returning the previous one.
    fn replace_encryptor(
        &mut self,
        encryptor: Option<Arc<dyn Encryptor>>,
    ) -> Option<Arc<dyn Encryptor>>;

    /// Installs `encryptor` until the returned guard is dropped.
    fn with_encryptor(
        &mut self,
        encryptor: Option<Arc<dyn Encryptor>>,
    ) -> EncryptorOverride<'_, Self>
    where
        Self: Sized,
    {
        EncryptorOverride::new(self, encryptor)
    }

    /// Disables encryption and decryption until the returned guard is dropped.
    fn suspend_encryption(&mut self) -> EncryptorOverride<'_, Self>
    where
        Self: Sized,
    {
        self.with_encryptor(None)
    }
}

/// Scoped encryptor substitution.
///
/// Dereferences to the slot so it can be used normally while the override is
/// active. The previous encryptor is put back when the guard drops, including
/// on early return and unwinding.
///
/// # Example
///
/// ```
/// use fieldcrypt::crypto::SymmetricEncryptor;
/// use fieldcrypt::schema::SchemaRegistry;
/// use fieldcrypt::subscriber::{EncryptSubscriber, EncryptorSlot};
/// use std::sync::Arc;
///
/// let schemas = Arc::new(SchemaRegistry::builder().build()?);
/// let encryptor = Arc::new(SymmetricEncryptor::new(SymmetricEncryptor::generate_key()));
/// let mut subscriber = EncryptSubscriber::new(schemas, Some(encryptor));
///
/// {
///     let suspended = subscriber.suspend_encryption();
///     assert!(suspended.encryptor().is_none());
/// }
/// assert!(subscriber.encryptor().is_some());
/// # Ok::<(), fieldcrypt::errors::SchemaError>(())
/// ```
pub struct EncryptorOverride<'a, T: EncryptorSlot> {
    slot: &'a mut T,
    previous: Option<Option<Arc<dyn Encryptor>>>,
}

impl<'a, T: EncryptorSlot> EncryptorOverride<'a, T> {
    fn new(slot: &'a mut T, encryptor: Option<Arc<dyn Encryptor>>) -> Self {
        let previous = slot.replace_encryptor(encryptor);
        debug!(
            "Encryptor overridden (previous: {})",
            previous.as_ref().map_or("none", |e| e.name())
        );
        Self {
            slot,
            previous: Some(previous),
        }
    }

    /// Restores the previous encryptor now.
    pub fn restore(mut self) {
        self.put_back();
    }

    fn put_back(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.slot.replace_encryptor(previous);
            debug!("Encryptor restored");
        }
    }
}

impl<T: EncryptorSlot> Deref for EncryptorOverride<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.slot
    }
}

impl<T: EncryptorSlot> DerefMut for EncryptorOverride<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.slot
    }
}

impl<T: EncryptorSlot> Drop for EncryptorOverride<'_, T> {
    fn drop(&mut self) {
        self.put_back();
    }
}

/// The lifecycle coordinator for one unit of work.
#[derive(Debug)]
pub struct EncryptSubscriber {
    processor: FieldProcessor,
}

impl EncryptSubscriber {
    /// Creates a subscriber with an empty cache and zeroed counters.
    pub fn new(schemas: Arc<SchemaRegistry>, encryptor: Option<Arc<dyn Encryptor>>) -> Self {
        Self {
            processor: FieldProcessor::new(schemas, encryptor),
        }
    }

    /// Reports codec and crypto failures as `FieldError::Processing`.
    pub fn with_wrapped_errors(self, wrap_errors: bool) -> Self {
        Self {
            processor: self.processor.with_wrapped_errors(wrap_errors),
        }
    }

    /// The underlying field processor.
    pub fn processor(&self) -> &FieldProcessor {
        &self.processor
    }

    /// The schema registry records are resolved against.
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        self.processor.schemas()
    }

    /// Field values encrypted since creation or the last clear.
    pub fn encrypt_count(&self) -> u64 {
        self.processor.counters().encrypted
    }

    /// Field values decrypted since creation or the last clear.
    pub fn decrypt_count(&self) -> u64 {
        self.processor.counters().decrypted
    }

    /// Runs one record through the processor outside the lifecycle hooks.
    pub fn process(
        &mut self,
        record: &mut dyn Record,
        instance: InstanceId,
        direction: Direction,
    ) -> FieldResult<()> {
        self.processor.process(record, instance, direction)
    }

    /// A record was hydrated from storage.
    pub fn post_load(&mut self, record: &mut dyn Record, instance: InstanceId) -> FieldResult<()> {
        self.processor.process(record, instance, Direction::Decrypt)
    }

    /// Before change detection: re-encrypts every record whose hierarchy has
    /// decryption cache entries, then drops the cache.
    ///
    /// Records whose values were decrypted and left untouched get their
    /// original ciphertext back, so they do not show up as changed.
    pub fn pre_flush<'r, I>(&mut self, records: I) -> FieldResult<()>
    where
        I: IntoIterator<Item = (InstanceId, &'r mut dyn Record)>,
    {
        let mut processed = 0usize;
        for (instance, record) in records {
            if !self.processor.has_cached(record.record_type()) {
                continue;
            }
            self.processor.process(record, instance, Direction::Encrypt)?;
            processed += 1;
        }

        self.processor.clear_cache();
        debug!("pre_flush re-encrypted {} records", processed);
        Ok(())
    }

    /// After change detection: encrypts scheduled inserts and updates.
    ///
    /// Returns the instances whose values changed in this hook; the caller
    /// must recompute their change sets before writing.
    pub fn on_flush<'r, I>(&mut self, scheduled: I) -> FieldResult<Vec<InstanceId>>
    where
        I: IntoIterator<Item = (InstanceId, &'r mut dyn Record)>,
    {
        let mut changed = Vec::new();
        for (instance, record) in scheduled {
            let before = self.encrypt_count();
            self.processor.process(record, instance, Direction::Encrypt)?;
            if self.encrypt_count() > before {
                changed.push(instance);
            }
        }

        debug!("on_flush changed {} scheduled records", changed.len());
        Ok(changed)
    }

    /// After the write: decrypts every loaded record so it stays usable.
    pub fn post_flush<'r, I>(&mut self, records: I) -> FieldResult<()>
    where
        I: IntoIterator<Item = (InstanceId, &'r mut dyn Record)>,
    {
        let mut processed = 0usize;
        for (instance, record) in records {
            if !record.is_initialized() {
                continue;
            }
            self.processor.process(record, instance, Direction::Decrypt)?;
            processed += 1;
        }

        debug!("post_flush decrypted {} records", processed);
        Ok(())
    }

    /// The unit of work was cleared.
    pub fn on_clear(&mut self) {
        self.processor.reset();
        debug!("Decryption cache and counters reset");
    }
}

impl EncryptorSlot for EncryptSubscriber {
    fn encryptor(&self) -> Option<Arc<dyn Encryptor>> {
        self.processor.encryptor().cloned()
    }

    fn replace_encryptor(
        &mut self,
        encryptor: Option<Arc<dyn Encryptor>>,
    ) -> Option<Arc<dyn Encryptor>> {
        self.processor.replace_encryptor(encryptor)
    }
}
