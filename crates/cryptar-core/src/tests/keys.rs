use crate::error::CryptarError;
use crate::keys::{self, KeyBundle};
use crate::store::{ObjectStore, METADATA_FOLDER, SECRETS_NAME};
use crate::testutil::{test_bundle, FixedPrompter, MemoryStore, NoPrompter};

const PASSWORD: &[u8] = b"hunter2";

#[test]
fn wrap_unwrap_roundtrip() {
    let bundle = test_bundle(0x10);
    let blob = bundle.wrap(PASSWORD).unwrap();
    let unwrapped = KeyBundle::unwrap(PASSWORD, &blob).unwrap();
    assert!(bundle.matches(&unwrapped));
}

#[test]
fn wrong_password_is_bad_password() {
    let bundle = test_bundle(0x10);
    let blob = bundle.wrap(PASSWORD).unwrap();
    assert!(matches!(
        KeyBundle::unwrap(b"Hunter2", &blob).unwrap_err(),
        CryptarError::BadPassword
    ));
}

#[test]
fn mangled_blob_is_bad_password() {
    let bundle = test_bundle(0x10);
    let mut blob = bundle.wrap(PASSWORD).unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0x80;
    assert!(matches!(
        KeyBundle::unwrap(PASSWORD, &blob).unwrap_err(),
        CryptarError::BadPassword
    ));

    // Truncation, including below the salt length, is the same signal.
    assert!(matches!(
        KeyBundle::unwrap(PASSWORD, &blob[..10]).unwrap_err(),
        CryptarError::BadPassword
    ));
}

#[test]
fn wrap_salts_are_fresh() {
    let bundle = test_bundle(0x10);
    let a = bundle.wrap(PASSWORD).unwrap();
    let b = bundle.wrap(PASSWORD).unwrap();
    assert_ne!(a[..32], b[..32]);
}

#[test]
fn matches_compares_all_three_keys() {
    let bundle = test_bundle(0x10);
    let mut other = test_bundle(0x10);
    assert!(bundle.matches(&other));
    other.dedup[31] ^= 1;
    assert!(!bundle.matches(&other));
}

#[test]
fn load_or_create_persists_and_reloads() {
    let state = tempfile::tempdir().unwrap();
    let first = KeyBundle::load_or_create(state.path()).unwrap();
    let second = KeyBundle::load_or_create(state.path()).unwrap();
    assert!(first.matches(&second));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(keys::keys_path(state.path()))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn first_sync_uploads_wrapped_secrets_and_caches_password() {
    let state = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    store.ensure_folder(METADATA_FOLDER).unwrap();
    let bundle = test_bundle(0x33);
    let mut prompter = FixedPrompter::new(PASSWORD);

    keys::sync_remote_secrets(&store, &mut prompter, &bundle, state.path()).unwrap();
    assert_eq!(prompter.new_prompts, 1);

    let blob = store
        .get(&format!("{METADATA_FOLDER}/{SECRETS_NAME}"))
        .expect("secrets object uploaded");
    let remote = KeyBundle::unwrap(PASSWORD, &blob).unwrap();
    assert!(bundle.matches(&remote));

    // Password was cached, so the next sync needs no prompt at all.
    let mut no_prompter = NoPrompter;
    keys::sync_remote_secrets(&store, &mut no_prompter, &bundle, state.path()).unwrap();
}

#[test]
fn sync_verifies_interactively_without_password_file() {
    let state_a = tempfile::tempdir().unwrap();
    let state_b = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let bundle = test_bundle(0x44);
    let mut prompter = FixedPrompter::new(PASSWORD);

    keys::sync_remote_secrets(&store, &mut prompter, &bundle, state_a.path()).unwrap();

    // A second machine with the same bundle but no cached password prompts
    // once, verifies, and caches.
    keys::sync_remote_secrets(&store, &mut prompter, &bundle, state_b.path()).unwrap();
    assert_eq!(prompter.existing_prompts, 1);
    assert!(keys::read_password_file(state_b.path()).unwrap().is_some());
}

#[test]
fn sync_rejects_foreign_bundle() {
    let state_a = tempfile::tempdir().unwrap();
    let state_b = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let mut prompter = FixedPrompter::new(PASSWORD);

    keys::sync_remote_secrets(&store, &mut prompter, &test_bundle(0x55), state_a.path()).unwrap();

    let err = keys::sync_remote_secrets(&store, &mut prompter, &test_bundle(0x66), state_b.path())
        .unwrap_err();
    assert!(matches!(err, CryptarError::KeyMismatch));
}

#[test]
fn sync_wrong_cached_password_is_bad_password() {
    let state_a = tempfile::tempdir().unwrap();
    let state_b = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let bundle = test_bundle(0x77);

    let mut prompter = FixedPrompter::new(PASSWORD);
    keys::sync_remote_secrets(&store, &mut prompter, &bundle, state_a.path()).unwrap();

    keys::write_password_file(state_b.path(), b"not-the-password").unwrap();
    let mut no_prompter = NoPrompter;
    let err = keys::sync_remote_secrets(&store, &mut no_prompter, &bundle, state_b.path())
        .unwrap_err();
    assert!(matches!(err, CryptarError::BadPassword));
}
