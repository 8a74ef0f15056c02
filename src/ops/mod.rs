//! Batch operations over a whole database.
//!
//! These drive stored records through the field processor outside the normal
//! application flow: encrypting a dataset that was written in plaintext,
//! decrypting one back to plaintext, and reporting what would be touched.

pub mod decrypt;
pub mod encrypt;
pub mod inspect;

use crate::schema::SchemaRegistry;
use std::time::Duration;

pub use decrypt::decrypt_database;
pub use encrypt::encrypt_database;
pub use inspect::{inspect_database, TypeStatus};

/// Progress callback for batch operations.
///
/// Called after each batch with:
/// - Record type being processed
/// - Records of that type processed so far
/// - Total records of that type
pub type ProgressCallback = Box<dyn Fn(&str, usize, usize)>;

/// Report of a completed batch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of record types processed
    pub record_types: usize,
    /// Number of records loaded
    pub records: usize,
    /// Number of field values sent through the encryptor
    pub values: u64,
    /// Duration of the operation
    pub duration: Duration,
}

/// Registered types that hold encrypted fields, directly or through an
/// embedded record, sorted by name.
pub fn encryptable_types(schemas: &SchemaRegistry) -> Vec<String> {
    schemas
        .type_names()
        .into_iter()
        .filter(|name| schemas.contains_encrypted(name))
        .map(str::to_string)
        .collect()
}
