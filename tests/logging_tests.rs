
use fieldcrypt::db::Database;
use fieldcrypt::record::Document;
use fieldcrypt::schema::SchemaRegistry;
use fieldcrypt::subscriber::EncryptSubscriber;
use predicates::prelude::*;
use std::sync::Arc;
use tempfile::tempdir;
use test_helpers::{base_command, write_schema_file, SCHEMA_JSON};

/// Test basic tracing infrastructure setup
#[test]
fn test_tracing_setup() {
    // Exercises the uuid dependency used for correlation ids.
    let id = uuid::Uuid::new_v4();
    assert_eq!(id.get_version_num(), 4);
}

/// JSON logs carry the root span with its correlation id
#[test]
fn test_json_logs_carry_correlation_id() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let schema = write_schema_file(temp_dir.path());

    let output = base_command(temp_dir.path())
        .env("FIELDCRYPT_SCHEMA", &schema)
        .env("RUST_LOG", "info")
        .args(["--log-format", "json", "encrypt", "--answer", "n"])
        .output()?;
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8(output.stderr)?;
    let lines: Vec<serde_json::Value> = stderr
        .lines()
        .filter(|line| line.starts_with('{'))
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert!(!lines.is_empty(), "expected JSON log lines, got: {}", stderr);

    for line in &lines {
        assert_eq!(line["span"]["name"], "app_invocation");
        assert_eq!(line["span"]["service_name"], "fieldcrypt");
        assert!(line["span"]["correlation_id"].is_string());
    }
    // One invocation, one correlation id.
    let first = &lines[0]["span"]["correlation_id"];
    assert!(lines.iter().all(|line| &line["span"]["correlation_id"] == first));
    Ok(())
}

/// Text logs are the default format
#[test]
fn test_text_logs_by_default() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let schema = write_schema_file(temp_dir.path());

    base_command(temp_dir.path())
        .env("FIELDCRYPT_SCHEMA", &schema)
        .env("RUST_LOG", "info")
        .args(["encrypt", "--answer", "n"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Starting fieldcrypt"))
        .stderr(predicate::str::contains("\"level\"").not());
    Ok(())
}

/// Debug logging never includes secrets, plaintext or ciphertext
#[test]
fn test_debug_logs_leak_no_values() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let schema = write_schema_file(temp_dir.path());
    let db_path = temp_dir.path().join("records.db");
    let key = fieldcrypt::crypto::SymmetricEncryptor::generate_base64_key();

    {
        let db = Database::open(&db_path)?;
        let schemas = Arc::new(SchemaRegistry::from_json(SCHEMA_JSON)?);
        let mut session = db.session(EncryptSubscriber::new(schemas, None));
        session.persist(Document::new("User", "1").with("secret", "top-secret-value"))?;
        session.flush()?;
    }

    let output = base_command(temp_dir.path())
        .env("FIELDCRYPT_SCHEMA", &schema)
        .env("FIELDCRYPT_DB", &db_path)
        .env("FIELDCRYPT_SECRET", &key)
        .env("RUST_LOG", "debug")
        .args(["encrypt", "--answer", "y"])
        .output()?;
    assert!(output.status.success());

    let stored = Database::open(&db_path)?
        .raw_body("User", "1")?
        .unwrap_or_default();
    let ciphertext_start = stored
        .split("<ENC>")
        .next()
        .and_then(|head| head.rsplit('"').next())
        .unwrap_or_default()
        .to_string();

    let stderr = String::from_utf8(output.stderr)?;
    assert!(!stderr.contains("top-secret-value"));
    assert!(!stderr.contains(&key));
    assert!(!ciphertext_start.is_empty());
    assert!(!stderr.contains(&ciphertext_start));
    Ok(())
}
