//! Integration tests for the SQLite persistence layer.
//!
//! Every test goes through a real database file and checks both what the
//! session exposes and what actually reached storage.


use chrono::NaiveDate;
use fieldcrypt::crypto::Encryptor;
use fieldcrypt::db::Database;
use fieldcrypt::errors::{AppError, CodecError, DatabaseError, FieldError};
use fieldcrypt::record::{Document, FieldValue, Record};
use fieldcrypt::subscriber::{EncryptSubscriber, EncryptorSlot};
use std::sync::Arc;
use tempfile::TempDir;
use test_helpers::{schemas, symmetric, Address, Customer, MARKER};

struct Fixture {
    _dir: TempDir,
    db: Database,
    encryptor: Arc<dyn Encryptor>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let mut db = Database::open(&dir.path().join("records.db")).expect("open database");
        db.register::<Customer>();
        db.register_documents("User");
        db.register_documents("Admin");
        Self {
            _dir: dir,
            db,
            encryptor: symmetric(),
        }
    }

    fn subscriber(&self) -> EncryptSubscriber {
        EncryptSubscriber::new(schemas(), Some(Arc::clone(&self.encryptor)))
    }

    fn body(&self, record_type: &str, key: &str) -> String {
        self.db
            .raw_body(record_type, key)
            .expect("read body")
            .expect("stored body")
    }
}

#[test]
fn test_persist_writes_ciphertext_only() {
    let fx = Fixture::new();
    let mut session = fx.db.session(fx.subscriber());

    let id = session
        .persist(Document::new("User", "1").with("secret", "hello").with("name", "Ann"))
        .unwrap();
    assert_eq!(session.flush().unwrap(), 1);

    let body = fx.body("User", "1");
    assert!(body.contains(MARKER));
    assert!(!body.contains("hello"));
    assert!(body.contains("Ann"));

    // Tracked records hold plain values again after the flush.
    assert_eq!(
        session.record(id).unwrap().field("secret"),
        Some(FieldValue::from("hello"))
    );
}

#[test]
fn test_load_and_flush_without_changes_writes_nothing() {
    let fx = Fixture::new();
    {
        let mut session = fx.db.session(fx.subscriber());
        session
            .persist(Document::new("User", "1").with("secret", "hello"))
            .unwrap();
        session.flush().unwrap();
    }
    let before = fx.body("User", "1");

    let mut session = fx.db.session(fx.subscriber());
    let id = session.load("User", "1").unwrap();
    assert_eq!(
        session.record(id).unwrap().field("secret"),
        Some(FieldValue::from("hello"))
    );

    assert_eq!(session.flush().unwrap(), 0);
    assert_eq!(fx.body("User", "1"), before);
    assert_eq!(session.subscriber().encrypt_count(), 0);
}

#[test]
fn test_changed_field_is_reencrypted() {
    let fx = Fixture::new();
    {
        let mut session = fx.db.session(fx.subscriber());
        session
            .persist(
                Document::new("User", "1")
                    .with("secret", "hello")
                    .with("name", "Ann"),
            )
            .unwrap();
        session.flush().unwrap();
    }
    let before = fx.body("User", "1");

    let mut session = fx.db.session(fx.subscriber());
    let id = session.load("User", "1").unwrap();
    session
        .get_mut::<Document>(id)
        .unwrap()
        .insert("secret", "goodbye");
    assert_eq!(session.flush().unwrap(), 1);

    let after = fx.body("User", "1");
    assert_ne!(after, before);
    assert!(!after.contains("goodbye"));

    let mut reader = fx.db.session(fx.subscriber());
    let id = reader.load("User", "1").unwrap();
    let doc = reader.get::<Document>(id).unwrap();
    assert_eq!(doc.get("secret"), Some(&FieldValue::from("goodbye")));
    assert_eq!(doc.get("name"), Some(&FieldValue::from("Ann")));
}

#[test]
fn test_plain_field_change_keeps_ciphertext() {
    let fx = Fixture::new();
    {
        let mut session = fx.db.session(fx.subscriber());
        session
            .persist(
                Document::new("User", "1")
                    .with("secret", "hello")
                    .with("name", "Ann"),
            )
            .unwrap();
        session.flush().unwrap();
    }
    let before: serde_json::Value = serde_json::from_str(&fx.body("User", "1")).unwrap();

    let mut session = fx.db.session(fx.subscriber());
    let id = session.load("User", "1").unwrap();
    session
        .record_mut(id)
        .unwrap()
        .set_field("name", FieldValue::from("Anna"))
        .unwrap();
    assert_eq!(session.flush().unwrap(), 1);

    let after: serde_json::Value = serde_json::from_str(&fx.body("User", "1")).unwrap();
    assert_eq!(after["fields"]["secret"], before["fields"]["secret"]);
    assert_ne!(after["fields"]["name"], before["fields"]["name"]);
}

#[test]
fn test_typed_entity_roundtrip() {
    let fx = Fixture::new();
    let mut customer = Customer::new("c1", "Lorraine", "lorraine@example.com");
    customer.address = Some(Address::new("1727 Bushnell Avenue", "Hill Valley"));
    {
        let mut session = fx.db.session(fx.subscriber());
        session.persist(customer.clone()).unwrap();
        session.flush().unwrap();
    }

    let body = fx.body("Customer", "c1");
    assert!(!body.contains("lorraine@example.com"));
    assert!(!body.contains("Bushnell"));
    assert!(body.contains("Hill Valley"));

    let mut session = fx.db.session(fx.subscriber());
    let id = session.load("Customer", "c1").unwrap();
    assert_eq!(session.get::<Customer>(id), Some(&customer));
    assert!(session.get::<Document>(id).is_none());
}

#[test]
fn test_mixed_session_only_writes_dirty_records() {
    let fx = Fixture::new();
    {
        let mut session = fx.db.session(fx.subscriber());
        for key in ["1", "2", "3"] {
            session
                .persist(Document::new("User", key).with("secret", format!("secret {}", key)))
                .unwrap();
        }
        assert_eq!(session.flush().unwrap(), 3);
    }
    let untouched = fx.body("User", "1");

    let mut session = fx.db.session(fx.subscriber());
    let ids = session.load_all("User").unwrap();
    assert_eq!(ids.len(), 3);
    session
        .get_mut::<Document>(ids[1])
        .unwrap()
        .insert("secret", "changed");
    session
        .persist(Document::new("Admin", "4").with("badge", "A-4"))
        .unwrap();

    assert_eq!(session.flush().unwrap(), 2);
    assert_eq!(fx.body("User", "1"), untouched);
    assert!(fx.body("Admin", "4").contains(MARKER));
}

#[test]
fn test_persist_duplicate_is_rejected() {
    let fx = Fixture::new();
    let mut session = fx.db.session(fx.subscriber());
    session.persist(Document::new("User", "1")).unwrap();

    let result = session.persist(Document::new("User", "1"));
    assert!(matches!(
        result,
        Err(AppError::Database(DatabaseError::AlreadyTracked(_)))
    ));
}

#[test]
fn test_missing_and_unregistered_records() {
    let fx = Fixture::new();
    let mut session = fx.db.session(fx.subscriber());

    assert!(session.find("User", "404").unwrap().is_none());
    assert!(matches!(
        session.load("User", "404"),
        Err(AppError::Database(DatabaseError::NotFound(_)))
    ));

    session.persist(Document::new("Tag", "t1").with("label", "x")).unwrap();
    session.flush().unwrap();
    session.clear();
    assert!(matches!(
        session.load("Tag", "t1"),
        Err(AppError::Database(DatabaseError::UnknownRecordType(_)))
    ));
}

#[test]
fn test_clear_detaches_records_and_resets_counters() {
    let fx = Fixture::new();
    let mut session = fx.db.session(fx.subscriber());
    session
        .persist(Document::new("User", "1").with("secret", "hello"))
        .unwrap();
    session.flush().unwrap();
    assert_eq!(session.subscriber().encrypt_count(), 1);

    session.clear();
    assert_eq!(session.tracked_count(), 0);
    assert_eq!(session.subscriber().encrypt_count(), 0);
    assert_eq!(session.subscriber().decrypt_count(), 0);

    // Loading again yields a fresh instance.
    let id = session.load("User", "1").unwrap();
    assert_eq!(session.tracked_count(), 1);
    assert_eq!(
        session.record(id).unwrap().field("secret"),
        Some(FieldValue::from("hello"))
    );
}

#[test]
fn test_suspended_session_writes_plaintext() {
    let fx = Fixture::new();
    {
        let mut session = fx.db.session(fx.subscriber());
        session
            .persist(Document::new("User", "1").with("secret", "hello"))
            .unwrap();
        session.flush().unwrap();
    }

    let mut session = fx.db.session(fx.subscriber());
    session.load("User", "1").unwrap();
    {
        let mut suspended = session.suspend_encryption();
        assert_eq!(suspended.flush().unwrap(), 1);
    }
    assert!(session.encryptor().is_some());

    let body = fx.body("User", "1");
    assert!(body.contains("hello"));
    assert!(!body.contains(MARKER));
}

#[test]
fn test_invalid_date_text_is_rejected_before_writing() {
    let fx = Fixture::new();
    let mut session = fx.db.session(fx.subscriber());

    let mut customer = Customer::new("c1", "Marty", "marty@example.com");
    customer.born = FieldValue::from("tomorrow");
    session.persist(customer).unwrap();

    assert!(matches!(
        session.flush(),
        Err(AppError::Field(FieldError::Codec(CodecError::InvalidDate { .. })))
    ));
    assert_eq!(fx.db.raw_body("Customer", "c1").unwrap(), None);
}

#[test]
fn test_date_text_is_stored_and_loaded_as_date() {
    let fx = Fixture::new();
    {
        let mut session = fx.db.session(fx.subscriber());
        let mut customer = Customer::new("c1", "Marty", "marty@example.com");
        customer.born = FieldValue::from("1968-06-12");
        session.persist(customer).unwrap();
        session.flush().unwrap();
    }
    assert!(!fx.body("Customer", "c1").contains("1968-06-12"));

    let mut session = fx.db.session(fx.subscriber());
    let id = session.load("Customer", "c1").unwrap();
    assert_eq!(
        session.get::<Customer>(id).unwrap().born,
        FieldValue::Date(NaiveDate::from_ymd_opt(1968, 6, 12).unwrap())
    );
}

#[test]
fn test_plain_text_in_json_field_survives_reload() {
    let fx = Fixture::new();
    {
        let mut session = fx.db.session(fx.subscriber());
        session
            .persist(Document::new("User", "1").with("payload", "hello"))
            .unwrap();
        session.flush().unwrap();
    }
    let body = fx.body("User", "1");
    assert!(body.contains(MARKER));
    assert!(!body.contains("hello"));

    let mut session = fx.db.session(fx.subscriber());
    let id = session.load("User", "1").unwrap();
    assert_eq!(
        session.record(id).unwrap().field("payload"),
        Some(FieldValue::Json(serde_json::json!("hello")))
    );
}
