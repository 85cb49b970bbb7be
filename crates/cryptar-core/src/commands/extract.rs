//! Extract mode: replay a manifest against the filesystem.

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::crypto::fingerprint::Fingerprint;
use crate::envelope;
use crate::error::{CryptarError, Result};
use crate::keys::{self, KeyBundle, PasswordPrompter};
use crate::manifest::{DirEntry, Entry, FileEntry};
use crate::platform::fs;
use crate::store::{ObjectStore, DATA_FOLDER, METADATA_FOLDER};

use super::util;

pub struct ExtractOptions {
    /// Local manifest path, or remote timestamp name.
    pub manifest: String,
    /// Extraction root; entries are recreated beneath it.
    pub root: String,
    /// Restore mode, ownership and mtime from the manifest.
    pub restore_perms: bool,
    pub verbose: bool,
    pub cancel: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub dirs: u64,
    pub symlinks: u64,
    pub files: u64,
    pub bytes: u64,
    pub skipped: u64,
}

pub fn run(
    store: &dyn ObjectStore,
    prompter: &mut dyn PasswordPrompter,
    state_dir: &Path,
    opts: &ExtractOptions,
) -> Result<ExtractStats> {
    store.ensure_folder(DATA_FOLDER)?;
    store.ensure_folder(METADATA_FOLDER)?;

    let bundle = KeyBundle::load_or_create(state_dir)?;
    keys::sync_remote_secrets(store, prompter, &bundle, state_dir)?;

    let mut reader = util::open_manifest(store, &bundle, &opts.manifest)?;

    let root = PathBuf::from(&opts.root);
    std::fs::create_dir_all(&root)?;

    let mut stats = ExtractStats::default();
    // Directory attributes wait until after the walk: restoring a directory
    // mtime before its contents arrive would be undone immediately.
    let mut deferred_dirs: Vec<DirEntry> = Vec::new();

    while let Some(entry) = reader.next()? {
        if opts.cancel.load(Ordering::Relaxed) {
            return Err(CryptarError::Cancelled);
        }
        if opts.verbose {
            println!("{}", entry.path());
        }

        match entry {
            Entry::Dir(e) => {
                let target = join_under(&root, &e.path)?;
                std::fs::create_dir_all(&target)?;
                if opts.restore_perms {
                    deferred_dirs.push(e);
                }
                stats.dirs += 1;
            }
            Entry::Symlink(e) => {
                let at = match join_under(&root, &e.path) {
                    Ok(p) => p,
                    Err(err) => {
                        println!("could not extract {}: {err}", e.path);
                        stats.skipped += 1;
                        continue;
                    }
                };
                ensure_parent(&at)?;
                // The stored target is recreated verbatim; an existing
                // entry at the path is an error, not an overwrite.
                match fs::create_symlink(Path::new(&e.target), &at) {
                    Ok(()) => stats.symlinks += 1,
                    Err(err) => {
                        println!("could not extract {}: {err}", e.path);
                        stats.skipped += 1;
                    }
                }
            }
            Entry::File(e) => match extract_file(store, &bundle, &root, &e, opts) {
                Ok(written) => {
                    stats.files += 1;
                    stats.bytes += written;
                }
                // Key or storage corruption: continuing would silently
                // produce an incomplete tree that looks complete.
                Err(err @ (CryptarError::DecryptFailed | CryptarError::CorruptPayload(_))) => {
                    return Err(err)
                }
                Err(err) => {
                    println!("could not extract {}: {err}", e.path);
                    stats.skipped += 1;
                }
            },
        }
    }

    // Children first, parents last, so parent mtimes survive the writes.
    for e in deferred_dirs.iter().rev() {
        if let Ok(target) = join_under(&root, &e.path) {
            apply_attrs(&target, e.mode, e.owner, e.group, e.mtime);
        }
    }

    info!(
        dirs = stats.dirs,
        files = stats.files,
        symlinks = stats.symlinks,
        bytes = stats.bytes,
        skipped = stats.skipped,
        "extract finished"
    );
    Ok(stats)
}

fn extract_file(
    store: &dyn ObjectStore,
    bundle: &KeyBundle,
    root: &Path,
    entry: &FileEntry,
    opts: &ExtractOptions,
) -> Result<u64> {
    let at = join_under(root, &entry.path)?;
    ensure_parent(&at)?;

    if !entry.has_payload() {
        std::fs::File::create(&at)?;
        if opts.restore_perms {
            apply_attrs(&at, entry.mode, entry.owner, entry.group, entry.mtime);
        }
        return Ok(0);
    }

    let object_path = format!("{DATA_FOLDER}/{}", hex::encode(entry.digest));
    let id = store.find(&object_path)?;
    let sealed = store.download(&id)?;

    // The SHA-256 inside the envelope is checked by open(); the keyed
    // fingerprint ties the payload to the name we just looked up.
    let (_header, body) = envelope::open(&sealed, &bundle.data)?;
    if Fingerprint::compute(&bundle.dedup, &body).0 != entry.digest {
        return Err(CryptarError::CorruptPayload(format!(
            "payload does not match fingerprint for {object_path}"
        )));
    }

    let mut tmp = tempfile::NamedTempFile::new_in(root)?;
    tmp.write_all(&body)?;
    tmp.flush()?;
    tmp.persist(&at)
        .map_err(|e| CryptarError::Io(e.error))?;

    if opts.restore_perms {
        apply_attrs(&at, entry.mode, entry.owner, entry.group, entry.mtime);
    }
    Ok(body.len() as u64)
}

/// Re-root a stored path beneath the extraction root. Absolute paths lose
/// their leading separator so they land under the root rather than escaping
/// it; `..` components are refused outright.
fn join_under(root: &Path, raw: &str) -> Result<PathBuf> {
    let mut out = root.to_path_buf();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(CryptarError::BadManifest(format!(
                    "unsafe path in manifest: {raw}"
                )))
            }
        }
    }
    Ok(out)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Best-effort attribute restore. Ownership in particular fails for
/// unprivileged users; that downgrades to a warning rather than aborting
/// the extraction.
fn apply_attrs(path: &Path, mode: u32, owner: u32, group: u32, mtime: crate::manifest::Timespec) {
    if let Err(e) = fs::apply_mode(path, mode) {
        warn!(path = %path.display(), error = %e, "could not restore mode");
    }
    if let Err(e) = fs::apply_owner(path, owner, group) {
        warn!(path = %path.display(), error = %e, "could not restore ownership");
    }
    if let Err(e) = fs::set_file_mtime(path, mtime) {
        warn!(path = %path.display(), error = %e, "could not restore mtime");
    }
}
