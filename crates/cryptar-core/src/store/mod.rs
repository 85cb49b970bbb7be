//! Abstract object storage.
//!
//! The engine only ever sees this trait: two top-level folders, upload with
//! conflict reporting, path lookup and download by opaque id. Retry,
//! backoff, credentials and transport all live behind implementations.

pub mod local;

use std::fmt;

use crate::error::Result;

pub const DATA_FOLDER: &str = "data";
pub const METADATA_FOLDER: &str = "metadata";
pub const SECRETS_NAME: &str = "secrets";

/// Opaque object identifier. The engine never inspects it beyond passing it
/// back to [`ObjectStore::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of an upload attempt. `AlreadyExists` means an object with that
/// (folder, name) was present and the upload had no effect. For
/// content-addressed data objects that is a successful dedup, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Created(ObjectId),
    AlreadyExists,
}

pub trait ObjectStore: Send + Sync {
    /// Create a top-level folder. Pre-existing folders are success.
    fn ensure_folder(&self, name: &str) -> Result<()>;

    /// Atomically upload an object, reporting a pre-existing name as
    /// `AlreadyExists` rather than overwriting.
    fn upload(&self, folder: &str, name: &str, data: &[u8]) -> Result<UploadOutcome>;

    /// Resolve a `/`-separated path to an object id. Missing objects are a
    /// `NotFound` error.
    fn find(&self, path: &str) -> Result<ObjectId>;

    /// Fetch an object's bytes.
    fn download(&self, id: &ObjectId) -> Result<Vec<u8>>;
}
