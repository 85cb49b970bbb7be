use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptarError>;

#[derive(Debug, Error)]
pub enum CryptarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("bad manifest: {0}")]
    BadManifest(String),

    #[error("unknown manifest entry tag: {}", format_tag(.0))]
    UnknownEntryType([u8; 4]),

    #[error("invalid compression tag: {}", format_tag(.0))]
    BadCompression([u8; 4]),

    #[error("decryption failed: wrong key or corrupted data")]
    DecryptFailed,

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("could not decrypt secrets: wrong password or corrupted blob")]
    BadPassword,

    #[error("remote secrets not identical to local secrets")]
    KeyMismatch,

    #[error("object already exists: '{0}'")]
    Conflict(String),

    #[error("not found: '{0}'")]
    NotFound(String),

    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("crypto failure: {0}")]
    Crypto(String),

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Render a 4-byte wire tag for error messages: printable ASCII as-is,
/// anything else as hex.
fn format_tag(tag: &[u8; 4]) -> String {
    if tag.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        format!("\"{}\"", String::from_utf8_lossy(tag))
    } else {
        format!("0x{}", hex::encode(tag))
    }
}
