//! MIME type probing for envelope headers.
//!
//! The type is advisory: it rides inside the sealed envelope so an extracted
//! payload can be identified without relying on its filename. The
//! `compressible` flag gates gzip; already-compressed formats such as
//! archives, images and media are stored as-is.

use std::io::Read;
use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

const SNIFF_LEN: usize = 512;

/// Guess the MIME type of a file and whether compressing it is worthwhile.
/// Never fails: unreadable or unrecognizable files come back as
/// `application/octet-stream`, not compressible.
pub fn probe(path: &Path) -> (String, bool) {
    if let Some((mime, compressible)) = by_extension(path) {
        return (mime.to_string(), compressible);
    }
    sniff(path)
}

fn by_extension(path: &Path) -> Option<(&'static str, bool)> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let entry = match ext.as_str() {
        "txt" | "text" | "log" | "conf" | "cfg" | "ini" => ("text/plain", true),
        "md" | "markdown" => ("text/markdown", true),
        "html" | "htm" => ("text/html", true),
        "css" => ("text/css", true),
        "csv" => ("text/csv", true),
        "js" => ("application/javascript", true),
        "json" => ("application/json", true),
        "xml" => ("application/xml", true),
        "yaml" | "yml" => ("application/yaml", true),
        "toml" => ("application/toml", true),
        "sh" => ("application/x-sh", true),
        "c" | "h" | "cc" | "cpp" | "hpp" | "rs" | "go" | "py" | "rb" | "java" => {
            ("text/plain", true)
        }
        "pdf" => ("application/pdf", false),
        "png" => ("image/png", false),
        "jpg" | "jpeg" => ("image/jpeg", false),
        "gif" => ("image/gif", false),
        "webp" => ("image/webp", false),
        "svg" => ("image/svg+xml", true),
        "mp3" => ("audio/mpeg", false),
        "ogg" => ("audio/ogg", false),
        "wav" => ("audio/wav", true),
        "mp4" => ("video/mp4", false),
        "webm" => ("video/webm", false),
        "zip" => ("application/zip", false),
        "gz" | "gzip" => ("application/gzip", false),
        "bz2" => ("application/x-bzip2", false),
        "xz" => ("application/x-xz", false),
        "zst" => ("application/zstd", false),
        "7z" => ("application/x-7z-compressed", false),
        "rar" => ("application/vnd.rar", false),
        "tar" => ("application/x-tar", true),
        _ => return None,
    };
    Some(entry)
}

/// Content sniff for files without a recognized extension: a prefix free of
/// NUL and control bytes is treated as text.
fn sniff(path: &Path) -> (String, bool) {
    let mut buf = [0u8; SNIFF_LEN];
    let n = match std::fs::File::open(path).and_then(|mut f| f.read(&mut buf)) {
        Ok(n) => n,
        Err(_) => return (OCTET_STREAM.to_string(), false),
    };
    if n == 0 {
        return (OCTET_STREAM.to_string(), false);
    }
    let textual = buf[..n]
        .iter()
        .all(|b| *b == b'\t' || *b == b'\n' || *b == b'\r' || (*b >= 0x20 && *b != 0x7f));
    if textual {
        ("text/plain".to_string(), true)
    } else {
        (OCTET_STREAM.to_string(), false)
    }
}
