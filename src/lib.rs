/*!
# fieldcrypt

fieldcrypt keeps selected fields of persisted records encrypted at rest while
the application works with plain values. Record types declare which fields are
encrypted and with which value type; a lifecycle subscriber decrypts records
as they load, re-encrypts them as they flush, and restores the stored
ciphertext of unchanged fields so reading a record never rewrites it.

## Core Features

- Pluggable encryptors behind one trait, with ChaCha20-Poly1305 and age built in
- Typed encrypted fields: text, date-time, date and JSON
- Embedded records and type inheritance
- Decryption cache that keeps unchanged ciphertext byte-identical
- Scoped encryptor override for batch tooling
- SQLite-backed reference persistence layer and a batch CLI

## Architecture

- `crypto`: The `Encryptor` trait, built-in encryptors, and secret loading
- `record`: Field access to record instances and the `Document` record
- `schema`: Encrypted field metadata, resolved per record type
- `codec`: Conversion of typed values to and from their encryptable string form
- `processor`: The encrypt/decrypt walk over one record
- `subscriber`: Lifecycle hooks driven by a persistence layer
- `db`: SQLite persistence layer emitting the lifecycle events
- `ops`: Batch encryption and decryption of a whole database
- `cli`, `config`, `constants`, `errors`: Application plumbing

## Usage Example

```rust
use fieldcrypt::crypto::SymmetricEncryptor;
use fieldcrypt::processor::Direction;
use fieldcrypt::record::{Document, FieldValue, InstanceId, Record};
use fieldcrypt::schema::{SchemaRegistry, TypeSchema, ValueType};
use fieldcrypt::subscriber::EncryptSubscriber;
use std::sync::Arc;

let schemas = Arc::new(
    SchemaRegistry::builder()
        .schema(TypeSchema::new("User").encrypted("email", ValueType::String))
        .build()?,
);
let encryptor = Arc::new(SymmetricEncryptor::new(SymmetricEncryptor::generate_key()));
let mut subscriber = EncryptSubscriber::new(schemas, Some(encryptor));

let mut user = Document::new("User", "1").with("email", "ada@example.com");
subscriber.process(&mut user, InstanceId(1), Direction::Encrypt)?;
assert!(user.get("email").and_then(FieldValue::as_text).unwrap().ends_with("<ENC>"));

subscriber.post_load(&mut user, InstanceId(1))?;
assert_eq!(user.field("email"), Some(FieldValue::from("ada@example.com")));
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

/// Command-line interface for parsing and handling user arguments
pub mod cli;
/// Value codec between typed field values and encryptable strings
pub mod codec;
/// Configuration loading and management
pub mod config;
/// Application-wide constants
pub mod constants;
/// Encryptors and secret management
pub mod crypto;
/// Reference persistence layer
pub mod db;
/// Error types and utilities for error handling
pub mod errors;
/// Batch operations over a whole database
pub mod ops;
/// Field processing of single records
pub mod processor;
/// Record access and field values
pub mod record;
/// Encrypted field metadata
pub mod schema;
/// Lifecycle hooks
pub mod subscriber;

// Re-export important types for convenience
pub use cli::CliArgs;
pub use config::Config;
pub use crypto::Encryptor;
pub use errors::{AppError, AppResult};
pub use processor::{Direction, FieldProcessor};
pub use record::{Document, FieldValue, InstanceId, Record, RecordType};
pub use schema::{SchemaRegistry, TypeSchema, ValueType};
pub use subscriber::{EncryptSubscriber, EncryptorSlot};
