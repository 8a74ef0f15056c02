//! Constants used throughout the application.
//!
//! This module contains all constants used in fieldcrypt, organized into
//! logical groups. Having constants centralized makes them easier to find,
//! modify, and reference consistently.

// Application Metadata
/// The name of the application.
pub const APP_NAME: &str = "fieldcrypt";
/// The description of the application used in CLI help text.
pub const APP_DESCRIPTION: &str = "Batch encryption and decryption of encrypted record fields";

// Encryption Marker
/// Suffix appended to every encrypted field value.
///
/// A stored value ending with this marker is ciphertext; anything else is
/// plaintext awaiting encryption.
pub const ENCRYPTION_MARKER: &str = "<ENC>";

// Encryptor Names
/// Name of the key-based ChaCha20-Poly1305 encryptor (the default).
pub const ENCRYPTOR_CHACHA20POLY1305: &str = "chacha20poly1305";
/// Name of the passphrase-based age encryptor.
pub const ENCRYPTOR_AGE: &str = "age";
/// Encryptor used when none is configured.
pub const DEFAULT_ENCRYPTOR: &str = ENCRYPTOR_CHACHA20POLY1305;

// CLI Arguments & Defaults
/// Default number of records flushed per batch by the batch commands.
pub const DEFAULT_BATCH_SIZE: usize = 20;
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Configuration Keys & Environment Variables
/// Environment variable selecting the encryptor by name.
pub const ENV_VAR_ENCRYPTOR: &str = "FIELDCRYPT_ENCRYPTOR";
/// Environment variable holding the secret (key or passphrase) directly.
pub const ENV_VAR_SECRET: &str = "FIELDCRYPT_SECRET";
/// Environment variable for the directory holding the generated key file.
pub const ENV_VAR_SECRET_DIR: &str = "FIELDCRYPT_SECRET_DIR";
/// Environment variable toggling key file generation.
pub const ENV_VAR_GENERATE_SECRET: &str = "FIELDCRYPT_GENERATE_SECRET";
/// Environment variable toggling wrapping of field failures.
pub const ENV_VAR_WRAP_ERRORS: &str = "FIELDCRYPT_WRAP_ERRORS";
/// Environment variable for the SQLite database path.
pub const ENV_VAR_DB: &str = "FIELDCRYPT_DB";
/// Environment variable for the JSON schema file used by the CLI.
pub const ENV_VAR_SCHEMA: &str = "FIELDCRYPT_SCHEMA";
/// Standard environment variable for the user's home directory.
pub const ENV_VAR_HOME: &str = "HOME";
/// Default sub-directory for key files and the database within the home directory.
pub const DEFAULT_DATA_SUBDIR: &str = ".fieldcrypt";
/// Default database file name inside the data directory.
pub const DEFAULT_DB_FILE: &str = "records.db";

// Secrets
/// Size of a ChaCha20-Poly1305 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Number of random bytes used for a generated age passphrase.
pub const GENERATED_PASSPHRASE_BYTES: usize = 32;
/// Placeholder string for redacted information in debug output.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

// File System Parameters
/// Default POSIX permissions for newly created directories (owner read/write/execute).
#[cfg(unix)]
pub const DEFAULT_DIR_PERMISSIONS: u32 = 0o700;
/// Default POSIX permissions for newly created files (owner read/write).
#[cfg(unix)]
pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o600;

// Codec Formats
/// Canonical string form of a `datetime` field.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Canonical string form of a `date` field.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// Logging Configuration
/// Service name used in tracing spans and structured logs.
pub const TRACING_SERVICE_NAME: &str = "fieldcrypt";
/// Name for the root tracing span covering an application invocation.
pub const TRACING_ROOT_SPAN_NAME: &str = "app_invocation";
