//! Key-based field encryption using ChaCha20-Poly1305.
//!
//! Provides authenticated encryption with a fresh random nonce per call, so
//! encrypting the same plaintext twice yields different ciphertexts.

use super::Encryptor;
use crate::constants::{ENCRYPTOR_CHACHA20POLY1305, KEY_SIZE};
use crate::errors::CryptoError;
use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

/// Size of nonce in bytes (96 bits for ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Encryptor holding a 256-bit symmetric key.
///
/// Ciphertext is `base64(nonce || ciphertext || tag)`.
pub struct SymmetricEncryptor {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl SymmetricEncryptor {
    /// Creates an encryptor from raw key bytes.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Imports a key from its standard base64 encoding.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the text is not base64 or does not
    /// decode to exactly 32 bytes.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKey(format!("invalid base64: {}", e)))?,
        );

        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Generates a random key.
    pub fn generate_key() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut key);
        key
    }

    /// Generates a random key encoded as standard base64, suitable for a key file.
    pub fn generate_base64_key() -> String {
        let key = Zeroizing::new(Self::generate_key());
        STANDARD.encode(key.as_slice())
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.key.as_slice()))
    }
}

impl Encryptor for SymmetricEncryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut bytes = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        bytes.extend_from_slice(&nonce_bytes);
        bytes.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(&bytes))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let bytes = STANDARD
            .decode(ciphertext)
            .map_err(|e| CryptoError::InvalidCiphertext(format!("invalid base64: {}", e)))?;

        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::InvalidCiphertext("data too short".to_string()));
        }

        let (nonce_bytes, sealed) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| {
                CryptoError::DecryptionFailed("wrong key or tampered data".to_string())
            })?;

        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::DecryptionFailed(format!("invalid UTF-8: {}", e)))
    }

    fn name(&self) -> &str {
        ENCRYPTOR_CHACHA20POLY1305
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let encryptor = SymmetricEncryptor::new(SymmetricEncryptor::generate_key());
        let sealed = encryptor.encrypt("Secret data").unwrap();

        assert_ne!(sealed, "Secret data");
        assert_eq!(encryptor.decrypt(&sealed).unwrap(), "Secret data");
    }

    #[test]
    fn test_encryption_is_randomized() {
        let encryptor = SymmetricEncryptor::new(SymmetricEncryptor::generate_key());
        let first = encryptor.encrypt("same").unwrap();
        let second = encryptor.encrypt("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encryptor = SymmetricEncryptor::new(SymmetricEncryptor::generate_key());
        let other = SymmetricEncryptor::new(SymmetricEncryptor::generate_key());
        let sealed = encryptor.encrypt("Secret data").unwrap();

        let result = other.decrypt(&sealed);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let encryptor = SymmetricEncryptor::new(SymmetricEncryptor::generate_key());
        let sealed = encryptor.encrypt("Secret data").unwrap();

        let mut bytes = STANDARD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let tampered = STANDARD.encode(&bytes);

        assert!(encryptor.decrypt(&tampered).is_err());
    }

    #[test]
    fn test_malformed_ciphertext_is_rejected() {
        let encryptor = SymmetricEncryptor::new(SymmetricEncryptor::generate_key());

        assert!(matches!(
            encryptor.decrypt("not base64!"),
            Err(CryptoError::InvalidCiphertext(_))
        ));
        assert!(matches!(
            encryptor.decrypt(&STANDARD.encode([0u8; 4])),
            Err(CryptoError::InvalidCiphertext(_))
        ));
    }

    #[test]
    fn test_key_import() {
        let encoded = SymmetricEncryptor::generate_base64_key();
        assert!(SymmetricEncryptor::from_base64_key(&encoded).is_ok());
        assert!(SymmetricEncryptor::from_base64_key(&format!("{}\n", encoded)).is_ok());

        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            SymmetricEncryptor::from_base64_key(&short),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let encryptor = SymmetricEncryptor::new(SymmetricEncryptor::generate_key());
        let sealed = encryptor.encrypt("").unwrap();
        assert_eq!(encryptor.decrypt(&sealed).unwrap(), "");
    }
}
