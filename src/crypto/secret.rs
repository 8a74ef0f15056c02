//! Secret resolution and key file generation.
//!
//! An explicitly configured secret always wins. Otherwise the secret is read
//! from `.<encryptor>.key` inside the secret directory, and generated there on
//! first use when generation is enabled.

use super::SymmetricEncryptor;
use crate::constants::{ENCRYPTOR_CHACHA20POLY1305, GENERATED_PASSPHRASE_BYTES};
use crate::errors::{AppError, AppResult, CryptoError};
use age::secrecy::{ExposeSecret, SecretString};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// Returns the key file path used for `encryptor` inside `secret_dir`.
///
/// # Example
///
/// ```
/// use fieldcrypt::crypto::secret::key_file_path;
/// use std::path::Path;
///
/// let path = key_file_path(Path::new("/var/keys"), "age");
/// assert_eq!(path, Path::new("/var/keys/.age.key"));
/// ```
pub fn key_file_path(secret_dir: &Path, encryptor: &str) -> PathBuf {
    secret_dir.join(format!(".{}.key", encryptor))
}

/// Generates fresh secret material appropriate for `encryptor`.
///
/// ChaCha20-Poly1305 receives a base64 encoded 256-bit key; every other
/// encryptor receives a random base64 passphrase.
pub fn generate_secret(encryptor: &str) -> SecretString {
    if encryptor == ENCRYPTOR_CHACHA20POLY1305 {
        return SecretString::new(SymmetricEncryptor::generate_base64_key());
    }

    let mut bytes = Zeroizing::new([0u8; GENERATED_PASSPHRASE_BYTES]);
    rand::rngs::OsRng.fill_bytes(bytes.as_mut_slice());
    SecretString::new(STANDARD.encode(bytes.as_slice()))
}

/// Resolves the secret for `encryptor`.
///
/// # Errors
///
/// Returns `CryptoError::SecretUnavailable` if no secret is configured, the key
/// file does not exist, and generation is disabled. Returns `AppError::Io` if
/// the key file cannot be read or written.
pub fn resolve_secret(
    encryptor: &str,
    explicit: Option<&SecretString>,
    secret_dir: &Path,
    generate: bool,
) -> AppResult<SecretString> {
    if let Some(secret) = explicit {
        debug!("Using explicitly configured secret for '{}'", encryptor);
        return Ok(SecretString::new(secret.expose_secret().clone()));
    }

    let path = key_file_path(secret_dir, encryptor);
    if path.exists() {
        debug!("Reading key file for '{}'", encryptor);
        let contents = Zeroizing::new(fs::read_to_string(&path)?);
        let secret = contents.trim();
        if secret.is_empty() {
            return Err(CryptoError::SecretUnavailable {
                encryptor: encryptor.to_string(),
                reason: format!("key file {} is empty", path.display()),
            }
            .into());
        }
        return Ok(SecretString::new(secret.to_string()));
    }

    if !generate {
        return Err(CryptoError::SecretUnavailable {
            encryptor: encryptor.to_string(),
            reason: format!("key file {} does not exist", path.display()),
        }
        .into());
    }

    let secret = generate_secret(encryptor);
    write_key_file(&path, secret.expose_secret())?;
    info!("Generated new key file for '{}'", encryptor);
    Ok(secret)
}

fn write_key_file(path: &Path, secret: &str) -> AppResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                AppError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create secret directory: {}", e),
                ))
            })?;

            #[cfg(unix)]
            {
                fs::set_permissions(
                    dir,
                    fs::Permissions::from_mode(crate::constants::DEFAULT_DIR_PERMISSIONS),
                )?;
                debug!("Set 0o700 permissions on secret directory");
            }
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(crate::constants::DEFAULT_FILE_PERMISSIONS);

    let mut file = options.open(path).map_err(|e| {
        AppError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create key file {}: {}", path.display(), e),
        ))
    })?;
    file.write_all(secret.as_bytes())?;
    file.sync_all()?;
    Ok(())
}
