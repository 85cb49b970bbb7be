//! List mode: decode a manifest without touching the filesystem.

use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::keys::{self, KeyBundle, PasswordPrompter};
use crate::manifest::{Entry, ManifestReader};
use crate::store::ObjectStore;

use super::util;

/// Decode all entries of a manifest. Local manifest files are stored
/// unencrypted and need neither keys nor the store; remote names go through
/// the secrets protocol and the metadata key.
pub fn run(
    store: &dyn ObjectStore,
    prompter: &mut dyn PasswordPrompter,
    state_dir: &Path,
    manifest: &str,
) -> Result<Vec<Entry>> {
    let mut reader = if Path::new(manifest).is_file() {
        let file = std::fs::File::open(manifest)?;
        ManifestReader::new(Box::new(file) as Box<dyn Read>)?
    } else {
        let bundle = KeyBundle::load_or_create(state_dir)?;
        keys::sync_remote_secrets(store, prompter, &bundle, state_dir)?;
        let bytes = util::fetch_remote_manifest(store, &bundle, manifest)?;
        ManifestReader::new(Box::new(std::io::Cursor::new(bytes)) as Box<dyn Read>)?
    };

    let mut entries = Vec::new();
    while let Some(entry) = reader.next()? {
        entries.push(entry);
    }
    Ok(entries)
}
