//! Command-line interface for fieldcrypt.
//!
//! Defines the argument structure parsed with `clap`. The batch commands act
//! on every stored record of every type the schema file marks as holding
//! encrypted fields.

use crate::constants::{
    APP_DESCRIPTION, APP_NAME, DEFAULT_BATCH_SIZE, LOG_FORMAT_JSON, LOG_FORMAT_TEXT,
};
use clap::{Args, Parser, Subcommand};

/// Batch encryption and decryption of encrypted record fields
#[derive(Parser, Debug)]
#[clap(name = APP_NAME, about = APP_DESCRIPTION)]
#[clap(author, version, long_about = None)]
pub struct CliArgs {
    /// Log output format
    #[clap(long, value_name = "FORMAT", default_value = LOG_FORMAT_TEXT, value_parser = [LOG_FORMAT_TEXT, LOG_FORMAT_JSON])]
    pub log_format: String,

    #[clap(subcommand)]
    pub command: Command,
}

/// Commands run against the configured database.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encrypt every encrypted field of every stored record
    Encrypt(BatchArgs),

    /// Decrypt every encrypted field and write the plain values back
    Decrypt(BatchArgs),

    /// Show which record types hold encrypted fields
    Status,
}

/// Options shared by the batch commands.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct BatchArgs {
    /// Encryptor to use (overrides FIELDCRYPT_ENCRYPTOR)
    #[clap(short = 'e', long, value_name = "NAME")]
    pub encryptor: Option<String>,

    /// Number of records flushed at once
    #[clap(short = 'b', long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Answer to the confirmation question; only y or yes proceeds
    #[clap(short = 'a', long, value_name = "ANSWER")]
    pub answer: Option<String>,
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse() -> Self {
        <Self as Parser>::parse_from(std::env::args())
    }
}

/// Returns true for the answers that confirm a batch run.
///
/// ```
/// use fieldcrypt::cli::is_confirmation;
///
/// assert!(is_confirmation(" YES\n"));
/// assert!(!is_confirmation("sure"));
/// ```
pub fn is_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
