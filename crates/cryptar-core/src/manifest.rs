//! The manifest stream: an ordered, typed record stream describing one
//! backup's file tree.
//!
//! Layout: an uncompressed header (version + compression tag), then zero or
//! more tagged records. When the header says gzip, everything after it is a
//! single gzip member. Records are variable-length with no framing beyond
//! their own fields, so a reader that hits an unknown tag cannot
//! resynchronize and must stop.

use std::io::{Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::codec::{Decoder, Encoder};
use crate::compress::{COMP_GZIP, COMP_NONE};
use crate::error::{CryptarError, Result};

pub const VERSION: u32 = 1;

const TAG_DIR: [u8; 4] = *b"dir\0";
const TAG_SYMLINK: [u8; 4] = *b"syml";
const TAG_FILE: [u8; 4] = *b"file";

/// Seconds + nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timespec {
    pub secs: i64,
    pub nanos: u32,
}

impl Timespec {
    pub fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: String,
    pub mode: u32,
    pub owner: u32,
    pub group: u32,
    pub mtime: Timespec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkEntry {
    pub path: String,
    /// Raw link target exactly as read from the filesystem.
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub mode: u32,
    pub owner: u32,
    pub group: u32,
    pub size: u64,
    pub mtime: Timespec,
    pub mime: String,
    /// Dedup fingerprint of the contents; also the remote object name.
    /// All zeros for empty files, which store no object.
    pub digest: [u8; 32],
}

impl FileEntry {
    pub fn has_payload(&self) -> bool {
        self.digest != [0u8; 32]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Dir(DirEntry),
    Symlink(SymlinkEntry),
    File(FileEntry),
}

impl Entry {
    pub fn path(&self) -> &str {
        match self {
            Entry::Dir(e) => &e.path,
            Entry::Symlink(e) => &e.path,
            Entry::File(e) => &e.path,
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

enum Sink<W: Write> {
    Raw(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Sink::Raw(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Raw(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

pub struct ManifestWriter<W: Write> {
    sink: Sink<W>,
}

impl<W: Write> ManifestWriter<W> {
    /// Write the header (uncompressed, flushed immediately) and set up the
    /// record sink. Callers must finish with [`ManifestWriter::finish`] or
    /// the gzip footer is lost and the manifest silently truncates.
    pub fn new(mut w: W, compress: bool) -> Result<Self> {
        let tag = if compress { COMP_GZIP } else { COMP_NONE };
        let mut enc = Encoder::new(&mut w);
        enc.put_u32(VERSION)?;
        enc.put_fixed(&tag)?;
        w.flush()?;

        let sink = if compress {
            Sink::Gzip(GzEncoder::new(w, flate2::Compression::default()))
        } else {
            Sink::Raw(w)
        };
        Ok(Self { sink })
    }

    pub fn dir(&mut self, e: &DirEntry) -> Result<()> {
        let mut enc = Encoder::new(&mut self.sink);
        enc.put_fixed(&TAG_DIR)?;
        enc.put_string(&e.path)?;
        enc.put_u32(e.mode)?;
        enc.put_u32(e.owner)?;
        enc.put_u32(e.group)?;
        enc.put_time(e.mtime.secs, e.mtime.nanos)
    }

    pub fn symlink(&mut self, e: &SymlinkEntry) -> Result<()> {
        let mut enc = Encoder::new(&mut self.sink);
        enc.put_fixed(&TAG_SYMLINK)?;
        enc.put_string(&e.path)?;
        enc.put_string(&e.target)
    }

    pub fn file(&mut self, e: &FileEntry) -> Result<()> {
        let mut enc = Encoder::new(&mut self.sink);
        enc.put_fixed(&TAG_FILE)?;
        enc.put_string(&e.path)?;
        enc.put_u32(e.mode)?;
        enc.put_u32(e.owner)?;
        enc.put_u32(e.group)?;
        enc.put_u64(e.size)?;
        enc.put_time(e.mtime.secs, e.mtime.nanos)?;
        enc.put_string(&e.mime)?;
        enc.put_fixed(&e.digest)
    }

    pub fn entry(&mut self, e: &Entry) -> Result<()> {
        match e {
            Entry::Dir(d) => self.dir(d),
            Entry::Symlink(s) => self.symlink(s),
            Entry::File(f) => self.file(f),
        }
    }

    /// Drain buffers, finalize the gzip footer and hand back the sink.
    pub fn finish(self) -> Result<W> {
        match self.sink {
            Sink::Raw(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Sink::Gzip(gz) => {
                let mut w = gz.finish()?;
                w.flush()?;
                Ok(w)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Body<R: Read> {
    Raw(R),
    Gzip(MultiGzDecoder<R>),
}

impl<R: Read> Read for Body<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Body::Raw(r) => r.read(buf),
            Body::Gzip(r) => r.read(buf),
        }
    }
}

#[derive(Debug)]
pub struct ManifestReader<R: Read> {
    body: Body<R>,
}

impl<R: Read> ManifestReader<R> {
    pub fn new(mut r: R) -> Result<Self> {
        let mut dec = Decoder::new(&mut r);
        let version = dec
            .get_u32()
            .map_err(|e| truncated(e, "manifest header"))?;
        if version != VERSION {
            return Err(CryptarError::BadManifest(format!(
                "unsupported manifest version {version}"
            )));
        }
        let mut tag = [0u8; 4];
        dec.get_fixed(&mut tag)
            .map_err(|e| truncated(e, "manifest header"))?;

        let body = match tag {
            COMP_NONE => Body::Raw(r),
            COMP_GZIP => Body::Gzip(MultiGzDecoder::new(r)),
            other => return Err(CryptarError::BadCompression(other)),
        };
        Ok(Self { body })
    }

    /// Read the next entry. `Ok(None)` only at a clean record boundary; a
    /// stream that ends mid-record is a `BadManifest` error. Unknown tags
    /// are fatal: records carry no framing, so skipping is impossible.
    pub fn next(&mut self) -> Result<Option<Entry>> {
        let mut tag = [0u8; 4];
        match read_full(&mut self.body, &mut tag)? {
            0 => return Ok(None),
            4 => {}
            _ => {
                return Err(CryptarError::BadManifest(
                    "truncated entry tag".into(),
                ))
            }
        }

        let mut dec = Decoder::new(&mut self.body);
        match tag {
            TAG_DIR => {
                let path = dec.get_string().map_err(|e| truncated(e, "dir"))?;
                let mode = dec.get_u32().map_err(|e| truncated(e, "dir"))?;
                let owner = dec.get_u32().map_err(|e| truncated(e, "dir"))?;
                let group = dec.get_u32().map_err(|e| truncated(e, "dir"))?;
                let (secs, nanos) = dec.get_time().map_err(|e| truncated(e, "dir"))?;
                Ok(Some(Entry::Dir(DirEntry {
                    path,
                    mode,
                    owner,
                    group,
                    mtime: Timespec::new(secs, nanos),
                })))
            }
            TAG_SYMLINK => {
                let path = dec.get_string().map_err(|e| truncated(e, "symlink"))?;
                let target = dec.get_string().map_err(|e| truncated(e, "symlink"))?;
                Ok(Some(Entry::Symlink(SymlinkEntry { path, target })))
            }
            TAG_FILE => {
                let path = dec.get_string().map_err(|e| truncated(e, "file"))?;
                let mode = dec.get_u32().map_err(|e| truncated(e, "file"))?;
                let owner = dec.get_u32().map_err(|e| truncated(e, "file"))?;
                let group = dec.get_u32().map_err(|e| truncated(e, "file"))?;
                let size = dec.get_u64().map_err(|e| truncated(e, "file"))?;
                let (secs, nanos) = dec.get_time().map_err(|e| truncated(e, "file"))?;
                let mime = dec.get_string().map_err(|e| truncated(e, "file"))?;
                let mut digest = [0u8; 32];
                dec.get_fixed(&mut digest)
                    .map_err(|e| truncated(e, "file"))?;
                Ok(Some(Entry::File(FileEntry {
                    path,
                    mode,
                    owner,
                    group,
                    size,
                    mtime: Timespec::new(secs, nanos),
                    mime,
                    digest,
                })))
            }
            other => Err(CryptarError::UnknownEntryType(other)),
        }
    }
}

/// Map a short read inside a record to `BadManifest`; other errors pass
/// through untouched.
fn truncated(err: CryptarError, what: &str) -> CryptarError {
    match err {
        CryptarError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            CryptarError::BadManifest(format!("truncated {what} record"))
        }
        other => other,
    }
}

/// Read as many bytes as possible into `buf`, returning the count. Unlike
/// `read_exact`, a clean EOF at offset zero is distinguishable from a
/// partial fill.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
