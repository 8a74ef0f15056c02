//! Passphrase-based field encryption using the age format.
//!
//! Each call derives a fresh scrypt key from the passphrase, so this encryptor
//! is deliberately slow and best suited to low-volume fields.

use super::Encryptor;
use crate::constants::ENCRYPTOR_AGE;
use crate::errors::CryptoError;
use age::secrecy::{ExposeSecret, SecretString};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::io::{Read, Write};

/// Encryptor sealing values with an age passphrase recipient.
///
/// Ciphertext is the binary age file encoded as standard base64.
///
/// # Example
///
/// ```no_run
/// use fieldcrypt::crypto::{Encryptor, PassphraseEncryptor};
/// use age::secrecy::SecretString;
///
/// let encryptor = PassphraseEncryptor::new(SecretString::new("my-secret-passphrase".to_string()));
/// let sealed = encryptor.encrypt("Secret data")?;
/// assert_eq!(encryptor.decrypt(&sealed)?, "Secret data");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PassphraseEncryptor {
    passphrase: SecretString,
}

impl PassphraseEncryptor {
    /// Creates an encryptor for the given passphrase.
    pub fn new(passphrase: SecretString) -> Self {
        Self { passphrase }
    }
}

impl Encryptor for PassphraseEncryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let encryptor = age::Encryptor::with_user_passphrase(SecretString::new(
            self.passphrase.expose_secret().clone(),
        ));

        let mut sealed = Vec::new();
        let mut writer = encryptor
            .wrap_output(&mut sealed)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        writer
            .write_all(plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(STANDARD.encode(&sealed))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let sealed = STANDARD
            .decode(ciphertext)
            .map_err(|e| CryptoError::InvalidCiphertext(format!("invalid base64: {}", e)))?;

        let decryptor = match age::Decryptor::new(&sealed[..])
            .map_err(|e| CryptoError::InvalidCiphertext(e.to_string()))?
        {
            age::Decryptor::Passphrase(decryptor) => decryptor,
            _ => {
                return Err(CryptoError::InvalidCiphertext(
                    "value was not sealed with a passphrase".to_string(),
                ))
            }
        };

        let mut reader = decryptor
            .decrypt(&self.passphrase, None)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        let mut plaintext = String::new();
        reader
            .read_to_string(&mut plaintext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        Ok(plaintext)
    }

    fn name(&self) -> &str {
        ENCRYPTOR_AGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let encryptor = PassphraseEncryptor::new(SecretString::new("test-passphrase".to_string()));
        let sealed = encryptor.encrypt("Secret field value").unwrap();

        assert!(!sealed.contains("Secret field value"));
        assert_eq!(encryptor.decrypt(&sealed).unwrap(), "Secret field value");
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let encryptor = PassphraseEncryptor::new(SecretString::new("right".to_string()));
        let other = PassphraseEncryptor::new(SecretString::new("wrong".to_string()));
        let sealed = encryptor.encrypt("Secret").unwrap();

        assert!(matches!(
            other.decrypt(&sealed),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_garbage_is_invalid_ciphertext() {
        let encryptor = PassphraseEncryptor::new(SecretString::new("pass".to_string()));
        let garbage = STANDARD.encode(b"definitely not an age file");

        assert!(matches!(
            encryptor.decrypt(&garbage),
            Err(CryptoError::InvalidCiphertext(_))
        ));
    }
}
