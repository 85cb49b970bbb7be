//! Directory-backed object store.
//!
//! One file per object, top-level folders as directories, ids as relative
//! paths. Uploads stage into a temp file and link into place with
//! no-clobber semantics so a concurrent writer surfaces as `AlreadyExists`
//! instead of a torn object.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::{CryptarError, Result};
use crate::store::{ObjectId, ObjectStore, UploadOutcome};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Reject names that could escape the store root.
    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(CryptarError::Storage("empty object name".into()));
        }
        if name.starts_with('/') || name.contains('\\') {
            return Err(CryptarError::Storage(format!("unsafe object name '{name}'")));
        }
        for component in Path::new(name).components() {
            if component == Component::ParentDir {
                return Err(CryptarError::Storage(format!(
                    "unsafe object name '{name}'"
                )));
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        Self::validate(name)?;
        Ok(self.root.join(name))
    }
}

impl ObjectStore for LocalStore {
    fn ensure_folder(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        match fs::create_dir(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn upload(&self, folder: &str, name: &str, data: &[u8]) -> Result<UploadOutcome> {
        let key = format!("{folder}/{name}");
        let path = self.resolve(&key)?;
        let dir = path
            .parent()
            .ok_or_else(|| CryptarError::Storage(format!("unsafe object name '{key}'")))?;
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.flush()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(UploadOutcome::Created(ObjectId::new(key))),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Ok(UploadOutcome::AlreadyExists)
            }
            Err(e) => Err(e.error.into()),
        }
    }

    fn find(&self, path: &str) -> Result<ObjectId> {
        let full = self.resolve(path)?;
        match fs::metadata(&full) {
            Ok(meta) if meta.is_file() => Ok(ObjectId::new(path)),
            Ok(_) => Err(CryptarError::NotFound(path.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CryptarError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn download(&self, id: &ObjectId) -> Result<Vec<u8>> {
        let path = self.resolve(id.as_str())?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CryptarError::NotFound(id.as_str().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
