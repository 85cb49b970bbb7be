//! Create mode: walk local trees, seal and upload file payloads, emit the
//! manifest.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::crypto::fingerprint::Fingerprint;
use crate::envelope;
use crate::error::{CryptarError, Result};
use crate::keys::{self, KeyBundle, PasswordPrompter};
use crate::manifest::{DirEntry, FileEntry, ManifestWriter, SymlinkEntry};
use crate::mime;
use crate::platform::fs::{self, MetadataSummary};
use crate::store::{ObjectStore, UploadOutcome, DATA_FOLDER, METADATA_FOLDER};

use super::REMOTE_TARGET;

pub struct CreateOptions {
    /// Paths to archive, walked in the order given.
    pub roots: Vec<String>,
    /// Compress payloads that the MIME probe marks compressible.
    pub compress: bool,
    /// Manifest target: a local path, or [`REMOTE_TARGET`] to seal and
    /// upload under a timestamp name.
    pub target: String,
    pub verbose: bool,
    pub cancel: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
pub struct CreateStats {
    pub dirs: u64,
    pub symlinks: u64,
    pub files: u64,
    pub uploaded: u64,
    pub deduped: u64,
    pub skipped: u64,
    /// Timestamp name of the remote manifest, when one was uploaded.
    pub manifest_name: Option<String>,
}

pub fn run(
    store: &dyn ObjectStore,
    prompter: &mut dyn PasswordPrompter,
    state_dir: &Path,
    opts: &CreateOptions,
) -> Result<CreateStats> {
    // Metadata tier: failures here are fatal, unlike per-file errors below.
    store.ensure_folder(DATA_FOLDER)?;
    store.ensure_folder(METADATA_FOLDER)?;

    let bundle = KeyBundle::load_or_create(state_dir)?;
    keys::sync_remote_secrets(store, prompter, &bundle, state_dir)?;

    let sink = if opts.target == REMOTE_TARGET {
        tempfile::tempfile()?
    } else {
        std::fs::File::create(&opts.target)?
    };
    let mut writer = ManifestWriter::new(sink, opts.compress)?;

    let mut stats = CreateStats::default();
    for root in &opts.roots {
        walk_root(store, &bundle, &mut writer, root, opts, &mut stats)?;
    }

    let mut manifest_file = writer.finish()?;

    if opts.target == REMOTE_TARGET {
        manifest_file.seek(SeekFrom::Start(0))?;
        let mut manifest_bytes = Vec::new();
        manifest_file.read_to_end(&mut manifest_bytes)?;

        let sealed = envelope::seal_bytes(
            &manifest_bytes,
            mime::OCTET_STREAM,
            false,
            &bundle.metadata,
        )?;
        let name = Local::now().format("%Y%m%d.%H%M%S").to_string();
        match store.upload(METADATA_FOLDER, &name, &sealed)? {
            UploadOutcome::Created(id) => {
                debug!(object = %id, "uploaded manifest");
                println!("backup complete: {name}");
                stats.manifest_name = Some(name);
            }
            // Another run landed on the same second; refuse to pretend the
            // existing manifest is ours.
            UploadOutcome::AlreadyExists => {
                return Err(CryptarError::Conflict(format!("{METADATA_FOLDER}/{name}")))
            }
        }
    }

    info!(
        dirs = stats.dirs,
        files = stats.files,
        symlinks = stats.symlinks,
        uploaded = stats.uploaded,
        deduped = stats.deduped,
        skipped = stats.skipped,
        "create finished"
    );
    Ok(stats)
}

fn walk_root<W: std::io::Write>(
    store: &dyn ObjectStore,
    bundle: &KeyBundle,
    writer: &mut ManifestWriter<W>,
    root: &str,
    opts: &CreateOptions,
    stats: &mut CreateStats,
) -> Result<()> {
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        if opts.cancel.load(Ordering::Relaxed) {
            return Err(CryptarError::Cancelled);
        }

        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                println!("skipping {}: {e}", e.path().map_or_else(String::new, |p| p.display().to_string()));
                stats.skipped += 1;
                continue;
            }
        };
        let path = entry.path();
        let path_str = path.to_string_lossy().to_string();

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                println!("skipping {path_str}: {e}");
                stats.skipped += 1;
                continue;
            }
        };
        let summary = fs::summarize(&metadata);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            writer.dir(&DirEntry {
                path: path_str.clone(),
                mode: summary.mode,
                owner: summary.uid,
                group: summary.gid,
                mtime: summary.mtime,
            })?;
            stats.dirs += 1;
            print_entry(opts, &summary, &path_str, "");
        } else if file_type.is_symlink() {
            let target = match std::fs::read_link(path) {
                Ok(t) => t.to_string_lossy().to_string(),
                Err(e) => {
                    println!("skipping {path_str}: {e}");
                    stats.skipped += 1;
                    continue;
                }
            };
            writer.symlink(&SymlinkEntry {
                path: path_str.clone(),
                target,
            })?;
            stats.symlinks += 1;
            print_entry(opts, &summary, &path_str, "");
        } else if file_type.is_file() {
            if summary.size == 0 {
                writer.file(&empty_file_entry(&path_str, &summary))?;
                stats.files += 1;
                print_entry(opts, &summary, &path_str, "");
                continue;
            }

            // Per-file failures (unreadable, seal, upload) skip the file:
            // no manifest entry, walk continues.
            match archive_file(store, bundle, path, &path_str, &summary, opts.compress) {
                Ok((file_entry, was_new)) => {
                    let note = if was_new {
                        stats.uploaded += 1;
                        format!(" new => {}", hex::encode(file_entry.digest))
                    } else {
                        stats.deduped += 1;
                        format!(" deduped => {}", hex::encode(file_entry.digest))
                    };
                    writer.file(&file_entry)?;
                    stats.files += 1;
                    print_entry(opts, &summary, &path_str, &note);
                }
                Err(e) => {
                    println!("skipping {path_str}: {e}");
                    stats.skipped += 1;
                }
            }
        } else {
            println!("skipping {path_str}: unsupported file type");
            stats.skipped += 1;
        }
    }
    Ok(())
}

/// Fingerprint, seal and upload one regular file, treating a name conflict
/// on the content-addressed object as successful dedup.
fn archive_file(
    store: &dyn ObjectStore,
    bundle: &KeyBundle,
    path: &Path,
    path_str: &str,
    summary: &MetadataSummary,
    compress: bool,
) -> Result<(FileEntry, bool)> {
    let data = std::fs::read(path)?;
    let fingerprint = Fingerprint::compute(&bundle.dedup, &data);
    let (mime_type, compressible) = mime::probe(path);

    let sealed = envelope::seal_bytes(&data, &mime_type, compress && compressible, &bundle.data)?;
    drop(data);

    let was_new = match store.upload(DATA_FOLDER, &fingerprint.to_hex(), &sealed)? {
        UploadOutcome::Created(_) => true,
        UploadOutcome::AlreadyExists => false,
    };

    Ok((
        FileEntry {
            path: path_str.to_string(),
            mode: summary.mode,
            owner: summary.uid,
            group: summary.gid,
            size: summary.size,
            mtime: summary.mtime,
            mime: mime_type,
            digest: fingerprint.0,
        },
        was_new,
    ))
}

fn empty_file_entry(path: &str, summary: &MetadataSummary) -> FileEntry {
    FileEntry {
        path: path.to_string(),
        mode: summary.mode,
        owner: summary.uid,
        group: summary.gid,
        size: 0,
        mtime: summary.mtime,
        mime: String::new(),
        digest: [0u8; 32],
    }
}

fn print_entry(opts: &CreateOptions, summary: &MetadataSummary, path: &str, note: &str) {
    if opts.verbose {
        println!("{:06o} {:>12} {}{}", summary.mode & 0o7777, summary.size, path, note);
    }
}
