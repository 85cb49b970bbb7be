//! Test support: an in-memory object store that records upload traffic, and
//! canned password prompters.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::error::{CryptarError, Result};
use crate::keys::{KeyBundle, PasswordPrompter};
use crate::store::{ObjectId, ObjectStore, UploadOutcome};

#[derive(Default)]
struct Inner {
    folders: HashSet<String>,
    objects: HashMap<String, Vec<u8>>,
    uploads: u64,
    conflicts: u64,
}

/// In-memory store. Thread-safe via Mutex; counts every upload attempt so
/// tests can observe dedup as `Conflict` responses.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful (non-conflicting) uploads.
    pub fn uploads(&self) -> u64 {
        self.inner.lock().unwrap().uploads
    }

    /// Number of upload attempts answered with a conflict.
    pub fn conflicts(&self) -> u64 {
        self.inner.lock().unwrap().conflicts
    }

    /// Number of stored objects whose path starts with `prefix`.
    pub fn object_count(&self, prefix: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .count()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().objects.get(path).cloned()
    }

    pub fn put(&self, path: &str, data: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(path.to_string(), data.to_vec());
    }

    pub fn remove(&self, path: &str) {
        self.inner.lock().unwrap().objects.remove(path);
    }
}

impl ObjectStore for MemoryStore {
    fn ensure_folder(&self, name: &str) -> Result<()> {
        self.inner.lock().unwrap().folders.insert(name.to_string());
        Ok(())
    }

    fn upload(&self, folder: &str, name: &str, data: &[u8]) -> Result<UploadOutcome> {
        let key = format!("{folder}/{name}");
        let mut inner = self.inner.lock().unwrap();
        if inner.objects.contains_key(&key) {
            inner.conflicts += 1;
            return Ok(UploadOutcome::AlreadyExists);
        }
        inner.objects.insert(key.clone(), data.to_vec());
        inner.uploads += 1;
        Ok(UploadOutcome::Created(ObjectId::new(key)))
    }

    fn find(&self, path: &str) -> Result<ObjectId> {
        let inner = self.inner.lock().unwrap();
        if inner.objects.contains_key(path) {
            Ok(ObjectId::new(path))
        } else {
            Err(CryptarError::NotFound(path.to_string()))
        }
    }

    fn download(&self, id: &ObjectId) -> Result<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| CryptarError::NotFound(id.as_str().to_string()))
    }
}

/// Prompter that always answers with a fixed password and counts calls.
pub struct FixedPrompter {
    password: Vec<u8>,
    pub new_prompts: u64,
    pub existing_prompts: u64,
}

impl FixedPrompter {
    pub fn new(password: &[u8]) -> Self {
        Self {
            password: password.to_vec(),
            new_prompts: 0,
            existing_prompts: 0,
        }
    }
}

impl PasswordPrompter for FixedPrompter {
    fn prompt_new(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        self.new_prompts += 1;
        Ok(Zeroizing::new(self.password.clone()))
    }

    fn prompt_existing(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        self.existing_prompts += 1;
        Ok(Zeroizing::new(self.password.clone()))
    }
}

/// Prompter that fails every prompt, for asserting non-interactive paths.
pub struct NoPrompter;

impl PasswordPrompter for NoPrompter {
    fn prompt_new(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Err(CryptarError::Config("unexpected interactive prompt".into()))
    }

    fn prompt_existing(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Err(CryptarError::Config("unexpected interactive prompt".into()))
    }
}

/// Deterministic bundle for wire-level tests.
pub fn test_bundle(seed: u8) -> KeyBundle {
    KeyBundle {
        metadata: [seed; 32],
        data: [seed.wrapping_add(1); 32],
        dedup: [seed.wrapping_add(2); 32],
    }
}
