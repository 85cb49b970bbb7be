use crate::error::CryptarError;
use crate::store::local::LocalStore;
use crate::store::{ObjectStore, UploadOutcome};

fn new_store() -> (tempfile::TempDir, LocalStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("vault")).unwrap();
    (dir, store)
}

#[test]
fn ensure_folder_is_idempotent() {
    let (_dir, store) = new_store();
    store.ensure_folder("data").unwrap();
    store.ensure_folder("data").unwrap();
}

#[test]
fn upload_find_download() {
    let (_dir, store) = new_store();
    store.ensure_folder("data").unwrap();

    let outcome = store.upload("data", "abc123", b"payload").unwrap();
    let UploadOutcome::Created(id) = outcome else {
        panic!("expected Created");
    };
    assert_eq!(store.download(&id).unwrap(), b"payload");

    let found = store.find("data/abc123").unwrap();
    assert_eq!(store.download(&found).unwrap(), b"payload");
}

#[test]
fn second_upload_is_conflict_and_preserves_original() {
    let (_dir, store) = new_store();
    store.ensure_folder("data").unwrap();

    store.upload("data", "same", b"first").unwrap();
    let outcome = store.upload("data", "same", b"second").unwrap();
    assert_eq!(outcome, UploadOutcome::AlreadyExists);

    let id = store.find("data/same").unwrap();
    assert_eq!(store.download(&id).unwrap(), b"first");
}

#[test]
fn find_missing_is_not_found() {
    let (_dir, store) = new_store();
    store.ensure_folder("data").unwrap();
    assert!(matches!(
        store.find("data/nope").unwrap_err(),
        CryptarError::NotFound(_)
    ));
}

#[test]
fn unsafe_names_are_rejected() {
    let (_dir, store) = new_store();
    assert!(store.find("../escape").is_err());
    assert!(store.upload("data", "../escape", b"x").is_err());
    assert!(store.find("/absolute").is_err());
    assert!(store.find("").is_err());
}
