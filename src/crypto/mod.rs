//! Cryptographic primitives used to seal record fields.
//!
//! The field processor only ever sees an [`Encryptor`]: an opaque, stateless
//! string-to-string transform that owns its key material. Two implementations
//! ship with the crate and callers can register their own by name.
//!
//! # Module Structure
//!
//! - `aead`: Key-based ChaCha20-Poly1305 encryptor (the default)
//! - `age`: Passphrase-based encryptor using the age format
//! - `registry`: Named encryptor selection
//! - `secret`: Secret resolution and key file generation
//!
//! # Example
//!
//! ```
//! use fieldcrypt::crypto::{Encryptor, SymmetricEncryptor};
//!
//! let encryptor = SymmetricEncryptor::new(SymmetricEncryptor::generate_key());
//! let sealed = encryptor.encrypt("hello")?;
//! assert_eq!(encryptor.decrypt(&sealed)?, "hello");
//! # Ok::<(), fieldcrypt::errors::CryptoError>(())
//! ```

pub mod aead;
pub mod age;
pub mod registry;
pub mod secret;

use crate::errors::CryptoError;

// Re-export commonly used types
pub use self::aead::SymmetricEncryptor;
pub use self::age::PassphraseEncryptor;
pub use self::registry::EncryptorRegistry;
pub use self::secret::resolve_secret;

/// Encrypts and decrypts field values.
///
/// Implementations own the key material; callers never see raw keys. Both
/// directions fail with [`CryptoError`] on malformed ciphertext, a wrong key, or
/// an algorithm-level failure.
pub trait Encryptor: Send + Sync {
    /// Encrypt `plaintext`, returning printable ciphertext.
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;

    /// Decrypt ciphertext previously produced by [`Encryptor::encrypt`].
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;

    /// Name under which this encryptor is selected.
    fn name(&self) -> &str;
}
