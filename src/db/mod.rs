//! SQLite-backed record store that drives the encryption lifecycle.
//!
//! Records are stored as JSON bodies in a single table and tracked by a
//! [`Session`] while in memory. The session is the unit of work: it assigns
//! instance ids, detects changes against load-time snapshots, and calls the
//! [`EncryptSubscriber`](crate::subscriber::EncryptSubscriber) hooks around
//! every load, flush and clear.
//!
//! # Module Structure
//!
//! - `schema`: Table definitions and schema initialization
//! - `records`: Row-level CRUD on the `records` table
//! - `session`: Unit of work and lifecycle event emission
//!
//! # Example
//!
//! ```no_run
//! use fieldcrypt::db::Database;
//! use std::path::Path;
//!
//! let mut db = Database::open(Path::new("/tmp/records.db"))?;
//! db.register_documents("User");
//! # Ok::<(), fieldcrypt::errors::AppError>(())
//! ```

pub mod records;
pub mod schema;
mod session;

pub use self::session::Session;

use crate::errors::{AppResult, DatabaseError};
use crate::record::{Document, Record, RecordType};
use crate::subscriber::EncryptSubscriber;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Type alias for a pooled SQLite connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// A record that can be stored by the session.
pub trait Entity: Record + Serialize + DeserializeOwned + 'static {
    /// Persisted key, unique per record type.
    fn key(&self) -> String;
}

impl Entity for Document {
    fn key(&self) -> String {
        Document::key(self).to_string()
    }
}

/// Object-safe view of a tracked [`Entity`].
pub trait StoredRecord: Any {
    /// Persisted key.
    fn key(&self) -> String;
    /// Field access for the processor.
    fn as_record(&self) -> &dyn Record;
    /// Mutable field access for the processor.
    fn as_record_mut(&mut self) -> &mut dyn Record;
    /// Serialized body as written to storage.
    fn to_body(&self) -> Result<String, serde_json::Error>;
    /// For downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
    /// For downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> StoredRecord for T {
    fn key(&self) -> String {
        Entity::key(self)
    }

    fn as_record(&self) -> &dyn Record {
        self
    }

    fn as_record_mut(&mut self) -> &mut dyn Record {
        self
    }

    fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type Loader = Arc<dyn Fn(&str) -> Result<Box<dyn StoredRecord>, DatabaseError> + Send + Sync>;

/// Database handle with connection pooling.
///
/// Holds one loader per registered record type; rows of unregistered types
/// cannot be hydrated.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    loaders: HashMap<String, Loader>,
}

impl Database {
    /// Opens or creates a SQLite database and initializes its schema.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Database file cannot be opened
    /// - Connection pool cannot be initialized
    /// - Schema creation fails
    pub fn open(db_path: &Path) -> AppResult<Self> {
        debug!("Opening database at: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(5)
            .build(manager)
            .map_err(DatabaseError::Pool)?;

        let db = Self::from_pool(pool)?;
        info!("Database opened successfully");
        Ok(db)
    }

    /// Opens a private in-memory database.
    ///
    /// The pool is limited to one connection, since every SQLite in-memory
    /// connection is its own database.
    pub fn open_in_memory() -> AppResult<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .map_err(DatabaseError::Pool)?;
        Self::from_pool(pool)
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> AppResult<Self> {
        let conn = pool.get().map_err(DatabaseError::Pool)?;
        schema::create_tables(&conn)?;
        drop(conn);

        Ok(Database {
            pool,
            loaders: HashMap::new(),
        })
    }

    /// Gets a connection from the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available or the pool is exhausted.
    pub fn get_conn(&self) -> AppResult<PooledConnection> {
        self.pool
            .get()
            .map_err(|e| DatabaseError::Pool(e).into())
    }

    /// Registers a statically typed record; its type name comes from its schema.
    pub fn register<T: Entity + RecordType>(&mut self) {
        let record_type = T::schema().name;
        debug!("Registering loader for record type '{}'", record_type);
        self.loaders.insert(
            record_type,
            Arc::new(|body: &str| -> Result<Box<dyn StoredRecord>, DatabaseError> {
                let record: T = serde_json::from_str(body)?;
                Ok(Box::new(record) as Box<dyn StoredRecord>)
            }),
        );
    }

    /// Registers `record_type` as stored in [`Document`] form.
    pub fn register_documents(&mut self, record_type: &str) {
        debug!("Registering document loader for record type '{}'", record_type);
        self.loaders.insert(
            record_type.to_string(),
            Arc::new(|body: &str| -> Result<Box<dyn StoredRecord>, DatabaseError> {
                let document: Document = serde_json::from_str(body)?;
                Ok(Box::new(document) as Box<dyn StoredRecord>)
            }),
        );
    }

    /// True if rows of `record_type` can be loaded.
    pub fn is_registered(&self, record_type: &str) -> bool {
        self.loaders.contains_key(record_type)
    }

    /// Starts a unit of work driven by `subscriber`.
    pub fn session(&self, subscriber: EncryptSubscriber) -> Session<'_> {
        Session::new(self, subscriber)
    }

    /// Number of stored records of `record_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self, record_type: &str) -> AppResult<usize> {
        let conn = self.get_conn()?;
        records::count_records(&conn, record_type)
    }

    /// Raw stored body of one record, bypassing decryption.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn raw_body(&self, record_type: &str, key: &str) -> AppResult<Option<String>> {
        let conn = self.get_conn()?;
        Ok(records::get_record(&conn, record_type, key)?.map(|row| row.body))
    }

    fn hydrate(
        &self,
        record_type: &str,
        body: &str,
    ) -> Result<Box<dyn StoredRecord>, DatabaseError> {
        let loader = self
            .loaders
            .get(record_type)
            .ok_or_else(|| DatabaseError::UnknownRecordType(record_type.to_string()))?;
        loader(body)
    }
}
