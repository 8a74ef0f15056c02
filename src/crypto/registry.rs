//! Selection of encryptors by name.
//!
//! The two built-in encryptors are always available. Applications can add
//! their own implementation under a new name (or replace a built-in one) and
//! select it through configuration like any other.

use super::{Encryptor, PassphraseEncryptor, SymmetricEncryptor};
use crate::constants::{ENCRYPTOR_AGE, ENCRYPTOR_CHACHA20POLY1305};
use crate::errors::CryptoError;
use age::secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Builds an encryptor from secret material.
pub type EncryptorFactory =
    Box<dyn Fn(&SecretString) -> Result<Arc<dyn Encryptor>, CryptoError> + Send + Sync>;

/// Named encryptor factories.
///
/// # Example
///
/// ```
/// use fieldcrypt::crypto::{EncryptorRegistry, SymmetricEncryptor};
/// use age::secrecy::SecretString;
///
/// let registry = EncryptorRegistry::with_builtins();
/// let secret = SecretString::new(SymmetricEncryptor::generate_base64_key());
/// let encryptor = registry.build("chacha20poly1305", &secret)?;
/// assert_eq!(encryptor.name(), "chacha20poly1305");
/// # Ok::<(), fieldcrypt::errors::CryptoError>(())
/// ```
pub struct EncryptorRegistry {
    factories: BTreeMap<String, EncryptorFactory>,
}

impl EncryptorRegistry {
    /// Creates a registry containing only the built-in encryptors.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };

        registry.register(ENCRYPTOR_CHACHA20POLY1305, |secret| {
            let encryptor = SymmetricEncryptor::from_base64_key(secret.expose_secret())?;
            Ok(Arc::new(encryptor) as Arc<dyn Encryptor>)
        });
        registry.register(ENCRYPTOR_AGE, |secret| {
            let passphrase = SecretString::new(secret.expose_secret().clone());
            Ok(Arc::new(PassphraseEncryptor::new(passphrase)) as Arc<dyn Encryptor>)
        });

        registry
    }

    /// Registers (or replaces) a factory under `name`.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&SecretString) -> Result<Arc<dyn Encryptor>, CryptoError> + Send + Sync + 'static,
    {
        debug!("Registering encryptor '{}'", name);
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Returns true if an encryptor is known under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Names of all known encryptors, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Builds the encryptor registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::UnknownEncryptor` if no factory is registered under
    /// `name`, or whatever the factory returns for unusable secret material.
    pub fn build(
        &self,
        name: &str,
        secret: &SecretString,
    ) -> Result<Arc<dyn Encryptor>, CryptoError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| CryptoError::UnknownEncryptor {
                name: name.to_string(),
                supported: self.names().join(", "),
            })?;

        debug!("Building encryptor '{}'", name);
        factory(secret)
    }
}

impl Default for EncryptorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
