//! The unit of work.

use super::{records, Database, Entity, StoredRecord};
use crate::crypto::Encryptor;
use crate::errors::{AppResult, DatabaseError};
use crate::processor::Direction;
use crate::record::{InstanceId, Record};
use crate::subscriber::{EncryptSubscriber, EncryptorSlot};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

struct Tracked {
    record_type: String,
    key: String,
    record: Box<dyn StoredRecord>,
    /// Body as last read from or written to storage; `None` until inserted.
    snapshot: Option<String>,
}

/// Tracks loaded and new records between flushes.
///
/// Loaded records are decrypted right after hydration. `flush` re-encrypts
/// what it writes and decrypts everything again afterwards, so tracked records
/// always hold plain values between calls.
///
/// # Example
///
/// ```
/// use fieldcrypt::crypto::SymmetricEncryptor;
/// use fieldcrypt::db::Database;
/// use fieldcrypt::record::{Document, FieldValue, Record};
/// use fieldcrypt::schema::{SchemaRegistry, TypeSchema, ValueType};
/// use fieldcrypt::subscriber::EncryptSubscriber;
/// use std::sync::Arc;
///
/// let schemas = Arc::new(
///     SchemaRegistry::builder()
///         .schema(TypeSchema::new("User").encrypted("secret", ValueType::String))
///         .build()?,
/// );
/// let encryptor = Arc::new(SymmetricEncryptor::new(SymmetricEncryptor::generate_key()));
///
/// let mut db = Database::open_in_memory()?;
/// db.register_documents("User");
///
/// let mut session = db.session(EncryptSubscriber::new(schemas.clone(), Some(encryptor.clone())));
/// session.persist(Document::new("User", "1").with("secret", "hello"))?;
/// session.flush()?;
/// assert!(db.raw_body("User", "1")?.unwrap().contains("<ENC>"));
///
/// let mut session = db.session(EncryptSubscriber::new(schemas, Some(encryptor)));
/// let id = session.load("User", "1")?;
/// assert_eq!(session.record(id).unwrap().field("secret"), Some(FieldValue::from("hello")));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Session<'db> {
    db: &'db Database,
    subscriber: EncryptSubscriber,
    tracked: BTreeMap<InstanceId, Tracked>,
    index: HashMap<(String, String), InstanceId>,
    next_instance: u64,
}

impl<'db> Session<'db> {
    pub(super) fn new(db: &'db Database, subscriber: EncryptSubscriber) -> Self {
        Self {
            db,
            subscriber,
            tracked: BTreeMap::new(),
            index: HashMap::new(),
            next_instance: 1,
        }
    }

    /// The lifecycle subscriber driving this session.
    pub fn subscriber(&self) -> &EncryptSubscriber {
        &self.subscriber
    }

    /// Schedules a new record for insertion on the next flush.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::AlreadyTracked` if a record with the same type
    /// and key is already part of this session.
    pub fn persist<T: Entity>(&mut self, record: T) -> AppResult<InstanceId> {
        let record_type = record.record_type().to_string();
        let key = Entity::key(&record);
        if self.index.contains_key(&(record_type.clone(), key.clone())) {
            return Err(DatabaseError::AlreadyTracked(format!("{}/{}", record_type, key)).into());
        }

        let instance = self.track(record_type, key, Box::new(record), None);
        debug!("Persisting new record {}", instance);
        Ok(instance)
    }

    /// Looks up a record, loading and decrypting it if it is not tracked yet.
    ///
    /// Returns `Ok(None)` if no such record is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be read or hydrated, or if its
    /// fields cannot be decrypted.
    pub fn find(&mut self, record_type: &str, key: &str) -> AppResult<Option<InstanceId>> {
        if let Some(instance) = self.index.get(&(record_type.to_string(), key.to_string())) {
            return Ok(Some(*instance));
        }

        let row = {
            let conn = self.db.get_conn()?;
            records::get_record(&conn, record_type, key)?
        };
        let Some(row) = row else {
            return Ok(None);
        };

        let record = self.db.hydrate(record_type, &row.body)?;
        let instance = self.track(
            record_type.to_string(),
            key.to_string(),
            record,
            Some(row.body),
        );

        if let Some(tracked) = self.tracked.get_mut(&instance) {
            self.subscriber
                .post_load(tracked.record.as_record_mut(), instance)?;
        }
        Ok(Some(instance))
    }

    /// Like [`find`](Self::find), but a missing record is an error.
    pub fn load(&mut self, record_type: &str, key: &str) -> AppResult<InstanceId> {
        self.find(record_type, key)?
            .ok_or_else(|| DatabaseError::NotFound(format!("{}/{}", record_type, key)).into())
    }

    /// Loads every stored record of `record_type`.
    pub fn load_all(&mut self, record_type: &str) -> AppResult<Vec<InstanceId>> {
        let keys = self.record_keys(record_type)?;
        keys.iter().map(|key| self.load(record_type, key)).collect()
    }

    /// Keys of all stored records of `record_type`.
    pub fn record_keys(&self, record_type: &str) -> AppResult<Vec<String>> {
        let conn = self.db.get_conn()?;
        records::list_keys(&conn, record_type)
    }

    /// Number of stored records of `record_type`.
    pub fn count(&self, record_type: &str) -> AppResult<usize> {
        self.db.count(record_type)
    }

    /// Number of records tracked by this session.
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// A tracked record as its concrete type.
    pub fn get<T: Entity>(&self, instance: InstanceId) -> Option<&T> {
        self.tracked
            .get(&instance)
            .and_then(|tracked| tracked.record.as_any().downcast_ref::<T>())
    }

    /// A tracked record as its concrete type, mutably.
    pub fn get_mut<T: Entity>(&mut self, instance: InstanceId) -> Option<&mut T> {
        self.tracked
            .get_mut(&instance)
            .and_then(|tracked| tracked.record.as_any_mut().downcast_mut::<T>())
    }

    /// Field access to a tracked record.
    pub fn record(&self, instance: InstanceId) -> Option<&dyn Record> {
        self.tracked
            .get(&instance)
            .map(|tracked| tracked.record.as_record())
    }

    /// Mutable field access to a tracked record.
    pub fn record_mut(&mut self, instance: InstanceId) -> Option<&mut dyn Record> {
        self.tracked
            .get_mut(&instance)
            .map(|tracked| tracked.record.as_record_mut())
    }

    /// Runs one tracked record through the field processor directly.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` for an unknown instance, or the field
    /// processing failure.
    pub fn process(&mut self, instance: InstanceId, direction: Direction) -> AppResult<()> {
        let tracked = self
            .tracked
            .get_mut(&instance)
            .ok_or_else(|| DatabaseError::NotFound(instance.to_string()))?;
        self.subscriber
            .process(tracked.record.as_record_mut(), instance, direction)?;
        Ok(())
    }

    /// Writes new and changed records.
    ///
    /// Runs `pre_flush`, compares every tracked body with its snapshot,
    /// encrypts the scheduled records in `on_flush` (recomputing the bodies it
    /// reports), writes them in one transaction, then runs `post_flush`.
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Any failure aborts the flush; nothing is written and tracked records
    /// may be left partially encrypted.
    pub fn flush(&mut self) -> AppResult<usize> {
        self.subscriber.pre_flush(
            self.tracked
                .iter_mut()
                .map(|(id, tracked)| (*id, tracked.record.as_record_mut())),
        )?;

        let mut changes = BTreeMap::new();
        for (id, tracked) in &self.tracked {
            let body = tracked.record.to_body().map_err(DatabaseError::Serialization)?;
            if tracked.snapshot.as_deref() != Some(body.as_str()) {
                changes.insert(*id, body);
            }
        }

        let recompute = self.subscriber.on_flush(
            self.tracked
                .iter_mut()
                .filter(|(id, _)| changes.contains_key(*id))
                .map(|(id, tracked)| (*id, tracked.record.as_record_mut())),
        )?;
        for id in recompute {
            if let Some(tracked) = self.tracked.get(&id) {
                let body = tracked.record.to_body().map_err(DatabaseError::Serialization)?;
                changes.insert(id, body);
            }
        }

        if !changes.is_empty() {
            let mut conn = self.db.get_conn()?;
            let tx = conn.transaction().map_err(DatabaseError::Sqlite)?;
            for (id, body) in &changes {
                if let Some(tracked) = self.tracked.get(id) {
                    records::upsert_record(&tx, &tracked.record_type, &tracked.key, body)?;
                }
            }
            tx.commit().map_err(DatabaseError::Sqlite)?;
        }

        let written = changes.len();
        for (id, body) in changes {
            if let Some(tracked) = self.tracked.get_mut(&id) {
                tracked.snapshot = Some(body);
            }
        }

        self.subscriber.post_flush(
            self.tracked
                .iter_mut()
                .map(|(id, tracked)| (*id, tracked.record.as_record_mut())),
        )?;

        info!("Flushed {} records", written);
        Ok(written)
    }

    /// Detaches every tracked record and resets the subscriber.
    pub fn clear(&mut self) {
        debug!("Clearing {} tracked records", self.tracked.len());
        self.tracked.clear();
        self.index.clear();
        self.subscriber.on_clear();
    }

    fn track(
        &mut self,
        record_type: String,
        key: String,
        record: Box<dyn StoredRecord>,
        snapshot: Option<String>,
    ) -> InstanceId {
        let instance = InstanceId(self.next_instance);
        self.next_instance += 1;
        self.index.insert((record_type.clone(), key.clone()), instance);
        self.tracked.insert(
            instance,
            Tracked {
                record_type,
                key,
                record,
                snapshot,
            },
        );
        instance
    }
}

impl EncryptorSlot for Session<'_> {
    fn encryptor(&self) -> Option<Arc<dyn Encryptor>> {
        self.subscriber.encryptor()
    }

    fn replace_encryptor(
        &mut self,
        encryptor: Option<Arc<dyn Encryptor>>,
    ) -> Option<Arc<dyn Encryptor>> {
        self.subscriber.replace_encryptor(encryptor)
    }
}
