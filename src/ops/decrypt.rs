//! Writing a dataset back in plaintext.

use super::{BatchReport, ProgressCallback};
use crate::db::Session;
use crate::errors::AppResult;
use crate::subscriber::EncryptorSlot;
use std::time::Instant;
use tracing::{debug, info};

/// Decrypts every encrypted field of every stored record of `types` and
/// writes the plaintext back.
///
/// Records are decrypted as they load; each batch is then flushed with
/// encryption suspended so the plain values reach storage. The session's
/// encryptor is restored after every batch, also when the flush fails.
///
/// # Errors
///
/// Returns the first database or field processing failure. Batches flushed
/// before the failure stay written.
pub fn decrypt_database(
    session: &mut Session<'_>,
    types: &[String],
    batch_size: usize,
    progress: Option<ProgressCallback>,
) -> AppResult<BatchReport> {
    let start_time = Instant::now();
    let batch_size = batch_size.max(1);
    info!("Starting decryption of {} record types", types.len());

    let mut records = 0;
    let mut values = 0;

    for record_type in types {
        let keys = session.record_keys(record_type)?;
        let total = keys.len();
        info!("Processing {} ({} records)", record_type, total);

        let mut done = 0;
        for batch in keys.chunks(batch_size) {
            for key in batch {
                session.load(record_type, key)?;
            }
            values += session.subscriber().decrypt_count();

            {
                let mut suspended = session.suspend_encryption();
                suspended.flush()?;
                suspended.clear();
            }

            done += batch.len();
            debug!("Decrypted {}/{} {} records", done, total, record_type);
            if let Some(callback) = &progress {
                callback(record_type, done, total);
            }
        }
        records += total;
    }

    info!("Decryption finished. Values decrypted: {}", values);
    Ok(BatchReport {
        record_types: types.len(),
        records,
        values,
        duration: start_time.elapsed(),
    })
}
