//! Encrypting a dataset in place.

use super::{BatchReport, ProgressCallback};
use crate::db::Session;
use crate::errors::AppResult;
use crate::processor::Direction;
use std::time::Instant;
use tracing::{debug, info};

/// Encrypts every encrypted field of every stored record of `types`.
///
/// # Flow
///
/// 1. Load a batch of records (already encrypted values are decrypted on load)
/// 2. Run each record through the processor in the encrypt direction
/// 3. Flush, so only records whose stored bodies changed are written
/// 4. Clear the session before the next batch
///
/// Values that are already encrypted are restored to their stored ciphertext,
/// so running this twice writes nothing the second time.
///
/// # Errors
///
/// Returns the first database or field processing failure. Batches flushed
/// before the failure stay written.
pub fn encrypt_database(
    session: &mut Session<'_>,
    types: &[String],
    batch_size: usize,
    progress: Option<ProgressCallback>,
) -> AppResult<BatchReport> {
    let start_time = Instant::now();
    let batch_size = batch_size.max(1);
    info!("Starting encryption of {} record types", types.len());

    let mut records = 0;
    let mut values = 0;

    for record_type in types {
        let keys = session.record_keys(record_type)?;
        let total = keys.len();
        info!("Processing {} ({} records)", record_type, total);

        let mut done = 0;
        for batch in keys.chunks(batch_size) {
            for key in batch {
                let instance = session.load(record_type, key)?;
                session.process(instance, Direction::Encrypt)?;
            }
            session.flush()?;
            values += session.subscriber().encrypt_count();
            session.clear();

            done += batch.len();
            debug!("Encrypted {}/{} {} records", done, total, record_type);
            if let Some(callback) = &progress {
                callback(record_type, done, total);
            }
        }
        records += total;
    }

    info!("Encryption finished. Values encrypted: {}", values);
    Ok(BatchReport {
        record_types: types.len(),
        records,
        values,
        duration: start_time.elapsed(),
    })
}
