//! What a batch run would touch.

use crate::db::Database;
use crate::errors::AppResult;
use crate::schema::SchemaRegistry;
use serde::Serialize;

/// Encryption footprint of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeStatus {
    /// Record type name
    pub record_type: String,
    /// Encrypted fields declared on the type, inherited ones included.
    /// Zero when only embedded records are encrypted.
    pub encrypted_properties: usize,
    /// Stored records of the type
    pub stored_records: usize,
}

/// Reports every registered type that holds encrypted fields.
///
/// # Errors
///
/// Returns an error if the record counts cannot be read.
pub fn inspect_database(db: &Database, schemas: &SchemaRegistry) -> AppResult<Vec<TypeStatus>> {
    super::encryptable_types(schemas)
        .into_iter()
        .map(|record_type| -> AppResult<TypeStatus> {
            Ok(TypeStatus {
                encrypted_properties: schemas.encrypted_fields(&record_type).count(),
                stored_records: db.count(&record_type)?,
                record_type,
            })
        })
        .collect()
}
