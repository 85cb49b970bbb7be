use std::io::{Cursor, Read};
use std::path::Path;

use crate::envelope;
use crate::error::Result;
use crate::keys::KeyBundle;
use crate::manifest::ManifestReader;
use crate::store::{ObjectStore, METADATA_FOLDER};

/// Download a remote manifest by timestamp name and unseal it with the
/// metadata key.
pub(crate) fn fetch_remote_manifest(
    store: &dyn ObjectStore,
    bundle: &KeyBundle,
    name: &str,
) -> Result<Vec<u8>> {
    let id = store.find(&format!("{METADATA_FOLDER}/{name}"))?;
    let blob = store.download(&id)?;
    let (_header, bytes) = envelope::open(&blob, &bundle.metadata)?;
    Ok(bytes)
}

/// Open a manifest reader over either a local file (stored unencrypted) or
/// a remote timestamp name.
pub(crate) fn open_manifest(
    store: &dyn ObjectStore,
    bundle: &KeyBundle,
    target: &str,
) -> Result<ManifestReader<Box<dyn Read>>> {
    if Path::new(target).is_file() {
        let file = std::fs::File::open(target)?;
        return ManifestReader::new(Box::new(file) as Box<dyn Read>);
    }
    let bytes = fetch_remote_manifest(store, bundle, target)?;
    ManifestReader::new(Box::new(Cursor::new(bytes)) as Box<dyn Read>)
}
