mod support;

use casevault_crypto::fields::SEAL_VERSION_FIELD;
use casevault_crypto::{
    FieldSealer, RedactionSchema, SENTINEL, SealState, SealVersion, seal_state,
};
use casevault_policy::{Migrator, PolicyConfig, SealingPipeline};
use casevault_storage::{DirRecordStore, MemoryRecordStore, RecordStore, StoredRecord};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use support::{case_record, record, test_codec};

struct Fixture {
    store: Arc<MemoryRecordStore>,
    plaintext: StoredRecord,
    hybrid: StoredRecord,
    current: StoredRecord,
    unknown: StoredRecord,
    other_owner: StoredRecord,
}

fn seed() -> Fixture {
    let store = Arc::new(MemoryRecordStore::new());
    let sealer = FieldSealer::new(test_codec());
    let schema = RedactionSchema::case_document();

    let plaintext = StoredRecord::new("u-7", case_record());

    let mut hybrid_data = sealer.seal_fields(&case_record(), &schema, "u-7").unwrap();
    hybrid_data.insert(SEAL_VERSION_FIELD.into(), json!("hybrid-1.0"));
    let hybrid = StoredRecord::new("u-7", hybrid_data);

    let current = StoredRecord::new(
        "u-7",
        sealer.seal_fields(&case_record(), &schema, "u-7").unwrap(),
    );

    let unknown = StoredRecord::new(
        "u-7",
        record(json!({
            "caseNumber": "[ENCRYPTED]",
            "sealedContent": "opaque",
            "isSealed": true,
            "sealVersion": "experimental-0.3",
        })),
    );

    let other_owner = StoredRecord::new("u-8", case_record());

    for r in [&plaintext, &hybrid, &current, &unknown, &other_owner] {
        store.insert(r).unwrap();
    }
    Fixture {
        store,
        plaintext,
        hybrid,
        current,
        unknown,
        other_owner,
    }
}

fn migrator(store: Arc<dyn RecordStore>) -> Migrator {
    Migrator::new(test_codec(), store, &PolicyConfig::default())
}

// ── Account migration ──

#[tokio::test]
async fn migration_upgrades_each_state_once() {
    let fx = seed();
    let report = migrator(fx.store.clone())
        .migrate_account("u-7")
        .await
        .unwrap();

    assert_eq!(report.account_id, "u-7");
    assert_eq!(report.sealed, vec![fx.plaintext.id.clone()]);
    assert_eq!(report.resealed, vec![fx.hybrid.id.clone()]);
    assert_eq!(report.unchanged, vec![fx.current.id.clone()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, fx.unknown.id);
    assert_eq!(report.migrated(), 2);

    for id in [&fx.plaintext.id, &fx.hybrid.id, &fx.current.id] {
        let stored = fx.store.get(id).unwrap().unwrap();
        assert_eq!(
            seal_state(&stored.data),
            SealState::Sealed(SealVersion::UserKey1)
        );
    }

    // Unknown records and other accounts are untouched.
    assert_eq!(fx.store.get(&fx.unknown.id).unwrap().unwrap(), fx.unknown);
    assert_eq!(
        fx.store.get(&fx.other_owner.id).unwrap().unwrap(),
        fx.other_owner
    );
}

#[tokio::test]
async fn migrated_records_open_to_original_values() {
    let fx = seed();
    migrator(fx.store.clone())
        .migrate_account("u-7")
        .await
        .unwrap();

    let pipeline = SealingPipeline::new(test_codec(), fx.store.clone(), &PolicyConfig::default());
    for id in [&fx.plaintext.id, &fx.hybrid.id, &fx.current.id] {
        let opened = pipeline.read_record(id, "u-7").await.unwrap();
        assert_eq!(opened.data, case_record());
    }
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let fx = seed();
    let m = migrator(fx.store.clone());
    m.migrate_account("u-7").await.unwrap();

    let again = m.migrate_account("u-7").await.unwrap();
    assert!(again.sealed.is_empty());
    assert!(again.resealed.is_empty());
    assert_eq!(again.unchanged.len(), 3);
    assert_eq!(again.skipped.len(), 1);
}

#[tokio::test]
async fn unopenable_legacy_record_is_skipped() {
    let store = Arc::new(MemoryRecordStore::new());
    let sealer = FieldSealer::new(test_codec());
    // Sealed under another account's key but stored as owned by u-7.
    let mut data = sealer
        .seal_fields(&case_record(), &RedactionSchema::case_document(), "u-8")
        .unwrap();
    data.insert(SEAL_VERSION_FIELD.into(), json!("hybrid-1.0"));
    let misfiled = StoredRecord::new("u-7", data);
    store.insert(&misfiled).unwrap();

    let report = migrator(store.clone()).migrate_account("u-7").await.unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("cannot open"));
    assert_eq!(store.get(&misfiled.id).unwrap().unwrap(), misfiled);
}

#[tokio::test]
async fn reseal_never_downgrades_fields_outside_the_schema() {
    let store = Arc::new(MemoryRecordStore::new());
    let sealer = FieldSealer::new(test_codec());
    let original = record(json!({
        "title": "Exchange fraud report",
        "caseNumber": "2024-001",
        "officerNotes": "informant asked to stay anonymous",
    }));
    let legacy_schema = RedactionSchema::new(["caseNumber", "officerNotes"]).unwrap();
    let mut data = sealer.seal_fields(&original, &legacy_schema, "u-7").unwrap();
    data.insert(SEAL_VERSION_FIELD.into(), json!("hybrid-1.0"));
    let legacy = StoredRecord::new("u-7", data);
    store.insert(&legacy).unwrap();

    let report = migrator(store.clone()).migrate_account("u-7").await.unwrap();
    assert_eq!(report.resealed, vec![legacy.id.clone()]);

    let stored = store.get(&legacy.id).unwrap().unwrap();
    assert_eq!(
        seal_state(&stored.data),
        SealState::Sealed(SealVersion::UserKey1)
    );
    assert_eq!(stored.data["officerNotes"], json!(SENTINEL));
    assert_eq!(stored.data["caseNumber"], json!(SENTINEL));
    assert_eq!(sealer.open_fields(&stored.data, "u-7").unwrap(), original);
}

#[tokio::test]
async fn migration_works_against_directory_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DirRecordStore::open(dir.path()).unwrap());
    let plain = StoredRecord::new("u-7", case_record());
    store.insert(&plain).unwrap();

    let report = migrator(store.clone()).migrate_account("u-7").await.unwrap();
    assert_eq!(report.sealed, vec![plain.id.clone()]);

    let on_disk = std::fs::read_to_string(dir.path().join(format!("{}.json", plain.id))).unwrap();
    assert!(!on_disk.contains("J. Doe"));
    assert!(on_disk.contains("user-key-1.0"));
}
