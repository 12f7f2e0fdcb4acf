use casevault_storage::{
    DirRecordStore, MemoryRecordStore, RecordData, RecordStore, StorageError, StoredRecord,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn data(title: &str) -> RecordData {
    match json!({"title": title, "caseNumber": "2024-001"}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Runs the same contract checks against any store.
fn exercise_contract(store: &dyn RecordStore) {
    let a = StoredRecord::new("u-1", data("first"));
    let mut b = StoredRecord::new("u-1", data("second"));
    b.created_at = a.created_at + 1;
    let c = StoredRecord::new("u-2", data("other owner"));

    store.insert(&a).unwrap();
    store.insert(&b).unwrap();
    store.insert(&c).unwrap();

    assert_eq!(store.get(&a.id).unwrap(), Some(a.clone()));
    assert_eq!(store.get("missing").unwrap(), None);

    let owned = store.list_by_owner("u-1").unwrap();
    assert_eq!(
        owned.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec![a.id.as_str(), b.id.as_str()]
    );
    assert_eq!(store.list_by_owner("u-2").unwrap().len(), 1);
    assert!(store.list_by_owner("u-3").unwrap().is_empty());

    let updated = store.update(&a.id, data("renamed")).unwrap();
    assert_eq!(updated.data["title"], "renamed");
    assert_eq!(updated.created_at, a.created_at);
    assert!(updated.modified_at >= a.modified_at);
    assert_eq!(store.get(&a.id).unwrap().unwrap().data["title"], "renamed");

    assert!(matches!(
        store.update("missing", data("x")),
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(store.insert(&a), Err(StorageError::Backend(_))));
}

// ── MemoryRecordStore ──

#[test]
fn memory_store_contract() {
    let store = MemoryRecordStore::new();
    exercise_contract(&store);
    assert_eq!(store.len().unwrap(), 3);
}

// ── DirRecordStore ──

#[test]
fn dir_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirRecordStore::open(dir.path().join("records")).unwrap();
    exercise_contract(&store);
}

#[test]
fn dir_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let record = StoredRecord::new("u-1", data("persisted"));
    {
        let store = DirRecordStore::open(dir.path()).unwrap();
        store.insert(&record).unwrap();
    }
    let reopened = DirRecordStore::open(dir.path()).unwrap();
    assert_eq!(reopened.get(&record.id).unwrap(), Some(record));
}

#[test]
fn dir_store_ignores_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirRecordStore::open(dir.path()).unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"not a record").unwrap();
    store.insert(&StoredRecord::new("u-1", data("x"))).unwrap();
    assert_eq!(store.list_by_owner("u-1").unwrap().len(), 1);
}
