//! Configuration management for fieldcrypt.
//!
//! This module loads and validates configuration settings from environment
//! variables, with sensible defaults. It covers encryptor selection, where the
//! secret comes from, and the database and schema file used by the batch CLI.
//!
//! # Environment Variables
//!
//! - `FIELDCRYPT_ENCRYPTOR`: Encryptor name (defaults to `chacha20poly1305`)
//! - `FIELDCRYPT_SECRET`: Secret material, used as is
//! - `FIELDCRYPT_SECRET_DIR`: Directory holding the `.<encryptor>.key` file
//! - `FIELDCRYPT_GENERATE_SECRET`: Generate the key file if missing (defaults to `true`)
//! - `FIELDCRYPT_WRAP_ERRORS`: Wrap field failures with record context (defaults to `false`)
//! - `FIELDCRYPT_DB`: SQLite database path (defaults to `~/.fieldcrypt/records.db`)
//! - `FIELDCRYPT_SCHEMA`: JSON schema file describing the stored record types
//! - `HOME`: Used for the default data directory

use crate::constants::{
    DEFAULT_DATA_SUBDIR, DEFAULT_DB_FILE, DEFAULT_ENCRYPTOR, ENV_VAR_DB, ENV_VAR_ENCRYPTOR,
    ENV_VAR_GENERATE_SECRET, ENV_VAR_HOME, ENV_VAR_SCHEMA, ENV_VAR_SECRET, ENV_VAR_SECRET_DIR,
    ENV_VAR_WRAP_ERRORS, REDACTED_PLACEHOLDER,
};
use crate::crypto::{secret, Encryptor, EncryptorRegistry};
use crate::errors::{AppError, AppResult};
use crate::schema::SchemaRegistry;
use age::secrecy::SecretString;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Configuration for fieldcrypt.
///
/// # Examples
///
/// Loading configuration from environment variables:
/// ```no_run
/// use fieldcrypt::config::Config;
/// use std::env;
///
/// env::set_var("FIELDCRYPT_ENCRYPTOR", "age");
/// env::set_var("FIELDCRYPT_SECRET", "correct horse battery staple");
///
/// let config = Config::load().expect("Failed to load configuration");
/// assert_eq!(config.encryptor, "age");
/// ```
pub struct Config {
    /// Name of the encryptor to build.
    pub encryptor: String,

    /// Secret material configured directly. Takes precedence over key files.
    pub secret: Option<SecretString>,

    /// Directory holding key files, when configured explicitly.
    ///
    /// Falls back to `data_dir` when unset.
    pub secret_dir: Option<PathBuf>,

    /// Base directory for generated key files and the default database.
    pub data_dir: PathBuf,

    /// Whether a missing key file is generated on first use.
    pub generate_secret: bool,

    /// Whether codec and crypto failures are wrapped with record context.
    pub wrap_errors: bool,

    /// SQLite database used by the batch commands.
    pub db_path: PathBuf,

    /// JSON schema file describing the stored record types.
    pub schema_path: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |present: bool| if present { REDACTED_PLACEHOLDER } else { "None" };

        f.debug_struct("Config")
            .field("encryptor", &self.encryptor)
            .field("secret", &redact(self.secret.is_some()))
            .field("secret_dir", &redact(self.secret_dir.is_some()))
            .field("data_dir", &REDACTED_PLACEHOLDER)
            .field("generate_secret", &self.generate_secret)
            .field("wrap_errors", &self.wrap_errors)
            .field("db_path", &REDACTED_PLACEHOLDER)
            .field("schema_path", &redact(self.schema_path.is_some()))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            encryptor: DEFAULT_ENCRYPTOR.to_string(),
            secret: None,
            secret_dir: None,
            data_dir: PathBuf::from(""),
            generate_secret: true,
            wrap_errors: false,
            db_path: PathBuf::from(""),
            schema_path: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables with sensible defaults.
    ///
    /// Paths are expanded with `shellexpand`, so `~` and `$VAR` references work.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - Both `FIELDCRYPT_SECRET` and `FIELDCRYPT_SECRET_DIR` are set
    /// - A boolean variable holds something other than true/false
    /// - Path expansion fails
    pub fn load() -> AppResult<Self> {
        let secret = non_empty_var(ENV_VAR_SECRET);
        let secret_dir = non_empty_var(ENV_VAR_SECRET_DIR);
        if secret.is_some() && secret_dir.is_some() {
            return Err(AppError::Config(format!(
                "{} and {} cannot be used along together. Configure either the secret itself or the directory holding its key file.",
                ENV_VAR_SECRET, ENV_VAR_SECRET_DIR
            )));
        }

        let encryptor =
            non_empty_var(ENV_VAR_ENCRYPTOR).unwrap_or_else(|| DEFAULT_ENCRYPTOR.to_string());

        let home = env::var(ENV_VAR_HOME).unwrap_or_default();
        let data_dir = PathBuf::from(home).join(DEFAULT_DATA_SUBDIR);

        let secret_dir = secret_dir.map(|dir| expand_path(&dir)).transpose()?;
        let db_path = match non_empty_var(ENV_VAR_DB) {
            Some(path) => expand_path(&path)?,
            None => data_dir.join(DEFAULT_DB_FILE),
        };
        let schema_path = non_empty_var(ENV_VAR_SCHEMA)
            .map(|path| expand_path(&path))
            .transpose()?;

        let config = Config {
            encryptor,
            secret: secret.map(SecretString::new),
            secret_dir,
            data_dir,
            generate_secret: parse_bool(ENV_VAR_GENERATE_SECRET, true)?,
            wrap_errors: parse_bool(ENV_VAR_WRAP_ERRORS, false)?,
            db_path,
            schema_path,
        };

        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Validates that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` with one of the following messages:
    /// - "Encryptor name is empty"
    /// - "... cannot be used along together" if both a secret and a secret directory are set
    /// - "Database path is empty"
    /// - "Data directory must be an absolute path" when no key file location is absolute
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldcrypt::config::Config;
    /// use std::path::PathBuf;
    ///
    /// let config = Config {
    ///     data_dir: PathBuf::from("/home/user/.fieldcrypt"),
    ///     db_path: PathBuf::from("/home/user/.fieldcrypt/records.db"),
    ///     ..Config::default()
    /// };
    /// assert!(config.validate().is_ok());
    ///
    /// let invalid = Config {
    ///     encryptor: String::new(),
    ///     ..config
    /// };
    /// assert!(invalid.validate().is_err());
    /// ```
    pub fn validate(&self) -> AppResult<()> {
        if self.encryptor.is_empty() {
            return Err(AppError::Config("Encryptor name is empty".to_string()));
        }

        if self.secret.is_some() && self.secret_dir.is_some() {
            return Err(AppError::Config(format!(
                "{} and {} cannot be used along together",
                ENV_VAR_SECRET, ENV_VAR_SECRET_DIR
            )));
        }

        if self.db_path.as_os_str().is_empty() {
            return Err(AppError::Config("Database path is empty".to_string()));
        }

        // Only matters when the secret comes from a key file.
        if self.secret.is_none() && !self.key_dir().is_absolute() {
            return Err(AppError::Config(
                "Data directory must be an absolute path. Set HOME or FIELDCRYPT_SECRET_DIR"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Directory where key files are read from and generated into.
    pub fn key_dir(&self) -> &Path {
        self.secret_dir.as_deref().unwrap_or(&self.data_dir)
    }

    /// Resolves the secret for the configured encryptor.
    ///
    /// See [`secret::resolve_secret`] for the lookup order.
    pub fn resolve_secret(&self) -> AppResult<SecretString> {
        secret::resolve_secret(
            &self.encryptor,
            self.secret.as_ref(),
            self.key_dir(),
            self.generate_secret,
        )
    }

    /// Builds the configured encryptor from `registry`.
    ///
    /// The name is checked before any secret is resolved, so an unknown
    /// encryptor never generates a key file.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::UnknownEncryptor` for an unknown name, or a
    /// secret resolution or key import failure.
    pub fn build_encryptor(&self, registry: &EncryptorRegistry) -> AppResult<Arc<dyn Encryptor>> {
        if !registry.contains(&self.encryptor) {
            return Err(crate::errors::CryptoError::UnknownEncryptor {
                name: self.encryptor.clone(),
                supported: registry.names().join(", "),
            }
            .into());
        }

        let secret = self.resolve_secret()?;
        Ok(registry.build(&self.encryptor, &secret)?)
    }

    /// Loads the record schema file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no schema file is configured, or the
    /// read or parse failure otherwise.
    pub fn load_schemas(&self) -> AppResult<SchemaRegistry> {
        let path = self.schema_path.as_deref().ok_or_else(|| {
            AppError::Config(format!(
                "No schema file configured. Set {} to a JSON file describing the record types",
                ENV_VAR_SCHEMA
            ))
        })?;
        SchemaRegistry::from_json_file(path)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn expand_path(raw: &str) -> AppResult<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| AppError::Config(format!("Failed to expand path: {}", e)))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

fn parse_bool(name: &str, default: bool) -> AppResult<bool> {
    let Some(raw) = non_empty_var(name) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!(
            "{} must be true or false, got '{}'",
            name, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use age::secrecy::ExposeSecret;
    use serial_test::serial;
    use tempfile::tempdir;

    const VARS: &[&str] = &[
        ENV_VAR_ENCRYPTOR,
        ENV_VAR_SECRET,
        ENV_VAR_SECRET_DIR,
        ENV_VAR_GENERATE_SECRET,
        ENV_VAR_WRAP_ERRORS,
        ENV_VAR_DB,
        ENV_VAR_SCHEMA,
    ];

    fn setup() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn valid_config(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            db_path: dir.join(DEFAULT_DB_FILE),
            ..Config::default()
        }
    }

    #[test]
    fn test_debug_impl_redacts_sensitive_info() {
        let config = Config {
            secret: Some(SecretString::new("hunter2".to_string())),
            data_dir: PathBuf::from("/home/username/private"),
            db_path: PathBuf::from("/home/username/private/records.db"),
            ..Config::default()
        };

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains(REDACTED_PLACEHOLDER));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("/home/username/private"));
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        setup();
        let orig_home = env::var(ENV_VAR_HOME).ok();
        env::set_var(ENV_VAR_HOME, "/home/tester");

        let config = Config::load().unwrap();

        if let Some(val) = orig_home {
            env::set_var(ENV_VAR_HOME, val);
        }

        assert_eq!(config.encryptor, DEFAULT_ENCRYPTOR);
        assert!(config.secret.is_none());
        assert!(config.generate_secret);
        assert!(!config.wrap_errors);
        assert_eq!(config.data_dir, PathBuf::from("/home/tester/.fieldcrypt"));
        assert_eq!(config.key_dir(), Path::new("/home/tester/.fieldcrypt"));
        assert_eq!(
            config.db_path,
            PathBuf::from("/home/tester/.fieldcrypt/records.db")
        );
        assert!(config.schema_path.is_none());
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        setup();
        let temp_dir = tempdir().unwrap();
        let db = temp_dir.path().join("custom.db");

        env::set_var(ENV_VAR_ENCRYPTOR, "age");
        env::set_var(ENV_VAR_SECRET_DIR, temp_dir.path());
        env::set_var(ENV_VAR_GENERATE_SECRET, "false");
        env::set_var(ENV_VAR_WRAP_ERRORS, "TRUE");
        env::set_var(ENV_VAR_DB, &db);
        env::set_var(ENV_VAR_SCHEMA, temp_dir.path().join("schema.json"));

        let config = Config::load().unwrap();
        setup();

        assert_eq!(config.encryptor, "age");
        assert_eq!(config.key_dir(), temp_dir.path());
        assert!(!config.generate_secret);
        assert!(config.wrap_errors);
        assert_eq!(config.db_path, db);
        assert_eq!(
            config.schema_path,
            Some(temp_dir.path().join("schema.json"))
        );
    }

    #[test]
    #[serial]
    fn test_secret_and_secret_dir_conflict() {
        setup();
        env::set_var(ENV_VAR_SECRET, "s3cret");
        env::set_var(ENV_VAR_SECRET_DIR, "/tmp/keys");

        let result = Config::load();
        setup();

        match result {
            Err(AppError::Config(message)) => {
                assert!(message.contains("cannot be used along together"));
            }
            _ => panic!("Expected Config error about conflicting secret settings"),
        }
    }

    #[test]
    #[serial]
    fn test_invalid_bool_is_rejected() {
        setup();
        env::set_var(ENV_VAR_WRAP_ERRORS, "sometimes");

        let result = Config::load();
        setup();

        assert!(matches!(result, Err(AppError::Config(ref m)) if m.contains(ENV_VAR_WRAP_ERRORS)));
    }

    #[test]
    fn test_validate_valid_config() {
        let temp_dir = tempdir().unwrap();
        assert!(valid_config(temp_dir.path()).validate().is_ok());
    }

    #[test]
    fn test_validate_empty_encryptor() {
        let temp_dir = tempdir().unwrap();
        let config = Config {
            encryptor: String::new(),
            ..valid_config(temp_dir.path())
        };

        match config.validate() {
            Err(AppError::Config(message)) => assert!(message.contains("Encryptor name is empty")),
            _ => panic!("Expected Config error about empty encryptor"),
        }
    }

    #[test]
    fn test_validate_relative_key_dir() {
        let config = Config {
            data_dir: PathBuf::from("relative/path"),
            db_path: PathBuf::from("records.db"),
            ..Config::default()
        };

        match config.validate() {
            Err(AppError::Config(message)) => assert!(message.contains("must be an absolute path")),
            _ => panic!("Expected Config error about relative path"),
        }

        // An explicit secret needs no key file location.
        let config = Config {
            secret: Some(SecretString::new("s3cret".to_string())),
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_secret_prefers_explicit() {
        let temp_dir = tempdir().unwrap();
        let config = Config {
            secret: Some(SecretString::new("explicit".to_string())),
            ..valid_config(temp_dir.path())
        };

        assert_eq!(config.resolve_secret().unwrap().expose_secret(), "explicit");
    }

    #[test]
    fn test_build_encryptor_generates_key_file() {
        let temp_dir = tempdir().unwrap();
        let config = valid_config(temp_dir.path());

        let encryptor = config
            .build_encryptor(&EncryptorRegistry::with_builtins())
            .unwrap();
        assert_eq!(encryptor.name(), DEFAULT_ENCRYPTOR);
        assert!(secret::key_file_path(temp_dir.path(), DEFAULT_ENCRYPTOR).exists());
    }

    #[test]
    fn test_unknown_encryptor_does_not_touch_key_dir() {
        let temp_dir = tempdir().unwrap();
        let config = Config {
            encryptor: "rot13".to_string(),
            ..valid_config(temp_dir.path())
        };

        let result = config.build_encryptor(&EncryptorRegistry::with_builtins());
        assert!(matches!(
            result,
            Err(AppError::Crypto(crate::errors::CryptoError::UnknownEncryptor { .. }))
        ));
        assert!(!secret::key_file_path(temp_dir.path(), "rot13").exists());
    }

    #[test]
    fn test_load_schemas_requires_path() {
        let temp_dir = tempdir().unwrap();
        let result = valid_config(temp_dir.path()).load_schemas();
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
