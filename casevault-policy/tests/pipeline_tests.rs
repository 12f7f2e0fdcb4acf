mod support;

use casevault_crypto::{CryptoError, SENTINEL, SealState, SealVersion, seal_state};
use casevault_policy::{ACCESS_DENIED_MESSAGE, PolicyConfig, PolicyError, SealingPipeline};
use casevault_storage::{MemoryRecordStore, RecordStore};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use support::{FailingEncryptor, case_record, test_codec};

fn pipeline(enabled: bool) -> (SealingPipeline, Arc<MemoryRecordStore>) {
    let store = Arc::new(MemoryRecordStore::new());
    let config = PolicyConfig {
        encryption_enabled: enabled,
        ..PolicyConfig::default()
    };
    (
        SealingPipeline::new(test_codec(), store.clone(), &config),
        store,
    )
}

// ── Sealing on create ──

#[tokio::test]
async fn created_record_is_stored_sealed() {
    let (p, store) = pipeline(true);
    let created = p.create_record("u-42", case_record()).await.unwrap();

    let stored = store.get(&created.id).unwrap().unwrap();
    assert_eq!(stored.owner_id, "u-42");
    assert_eq!(
        seal_state(&stored.data),
        SealState::Sealed(SealVersion::UserKey1)
    );
    assert_eq!(stored.data["caseNumber"], json!(SENTINEL));
    assert_eq!(stored.data["victimName"], json!(SENTINEL));
    assert_eq!(stored.data["title"], json!("Exchange fraud report"));
    assert_eq!(stored, created);
}

#[tokio::test]
async fn owner_reads_transient_plaintext_view() {
    let (p, store) = pipeline(true);
    let created = p.create_record("u-42", case_record()).await.unwrap();

    let opened = p.read_record(&created.id, "u-42").await.unwrap();
    assert_eq!(opened.data, case_record());

    // The stored form is untouched by the read.
    let stored = store.get(&created.id).unwrap().unwrap();
    assert_eq!(stored.data["caseNumber"], json!(SENTINEL));
    assert_eq!(stored.modified_at, created.modified_at);
}

#[tokio::test]
async fn other_account_is_denied_generically() {
    let (p, _) = pipeline(true);
    let created = p.create_record("u-42", case_record()).await.unwrap();

    let err = p.read_record(&created.id, "u-99").await.unwrap_err();
    assert!(err.is_access_denied());
    assert_eq!(err.user_message(), ACCESS_DENIED_MESSAGE);
}

#[tokio::test]
async fn unknown_record_is_not_found() {
    let (p, _) = pipeline(true);
    let err = p.read_record("no-such-record", "u-42").await.unwrap_err();
    assert!(matches!(err, PolicyError::RecordNotFound(_)));
    assert_eq!(err.user_message(), "The requested document was not found.");
}

// ── Failure handling ──

#[tokio::test]
async fn sealing_failure_persists_nothing() {
    let store = Arc::new(MemoryRecordStore::new());
    let p = SealingPipeline::new(
        Arc::new(FailingEncryptor),
        store.clone(),
        &PolicyConfig::default(),
    );

    let err = p.create_record("u-42", case_record()).await.unwrap_err();
    assert!(matches!(err, PolicyError::Crypto(CryptoError::Encryption(_))));
    assert!(store.is_empty().unwrap());
    assert!(store.list_by_owner("u-42").unwrap().is_empty());
}

// ── Encryption disabled ──

#[tokio::test]
async fn disabled_pipeline_stores_plaintext_unmarked() {
    let (p, store) = pipeline(false);
    let created = p.create_record("u-42", case_record()).await.unwrap();

    let stored = store.get(&created.id).unwrap().unwrap();
    assert_eq!(stored.data, case_record());
    assert_eq!(seal_state(&stored.data), SealState::Plaintext);
    assert!(!stored.data.contains_key("isSealed"));

    let opened = p.read_record(&created.id, "u-42").await.unwrap();
    assert_eq!(opened.data, case_record());
}

#[tokio::test]
async fn disabled_pipeline_still_opens_sealed_records() {
    let (enabled, store) = pipeline(true);
    let created = enabled.create_record("u-42", case_record()).await.unwrap();

    let disabled = SealingPipeline::new(
        test_codec(),
        store,
        &PolicyConfig {
            encryption_enabled: false,
            ..PolicyConfig::default()
        },
    );
    let opened = disabled.read_record(&created.id, "u-42").await.unwrap();
    assert_eq!(opened.data, case_record());
}

// ── Concurrency ──

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_for_many_accounts() {
    let (p, store) = pipeline(true);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let p = p.clone();
            tokio::spawn(async move { p.create_record(&format!("u-{i}"), case_record()).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }

    for (i, created) in ids.iter().enumerate() {
        let account = format!("u-{i}");
        assert_eq!(store.list_by_owner(&account).unwrap().len(), 1);
        let opened = p.read_record(&created.id, &account).await.unwrap();
        assert_eq!(opened.data, case_record());
    }
}
