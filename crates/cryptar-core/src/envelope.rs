//! The sealed container for every remote payload.
//!
//! Wire format: `[24-byte nonce][AEAD(key, nonce, header || payload)]`.
//! The header travels inside the sealed region, so a successful decrypt
//! authenticates the compression tag, size, digest and MIME type along with
//! the payload itself; the digest and size are additionally checked against
//! the decompressed body to catch plaintext-level corruption.

use std::io::Cursor;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::codec::{encode_to_vec, Decoder, Encoder};
use crate::compress::{self, COMP_GZIP, COMP_NONE};
use crate::crypto;
use crate::error::{CryptarError, Result};
use crate::mime;

pub const VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub version: u32,
    pub compression: [u8; 4],
    /// Payload size before compression and encryption.
    pub size: u64,
    /// SHA-256 of the plaintext payload.
    pub digest: [u8; 32],
    /// Advisory MIME type.
    pub mime: String,
}

impl EnvelopeHeader {
    fn encode<W: std::io::Write>(&self, enc: &mut Encoder<W>) -> Result<()> {
        enc.put_u32(self.version)?;
        enc.put_fixed(&self.compression)?;
        enc.put_u64(self.size)?;
        enc.put_fixed(&self.digest)?;
        enc.put_string(&self.mime)
    }

    fn decode<R: std::io::Read>(dec: &mut Decoder<R>) -> Result<Self> {
        let version = dec.get_u32()?;
        if version != VERSION {
            return Err(CryptarError::CorruptPayload(format!(
                "unsupported envelope version {version}"
            )));
        }
        let mut compression = [0u8; 4];
        dec.get_fixed(&mut compression)?;
        let size = dec.get_u64()?;
        let mut digest = [0u8; 32];
        dec.get_fixed(&mut digest)?;
        let mime = dec.get_string()?;
        Ok(Self {
            version,
            compression,
            size,
            digest,
            mime,
        })
    }
}

/// Seal a byte payload under `key`. `compress` is the final decision; the
/// caller has already combined its own flag with the MIME probe.
pub fn seal_bytes(data: &[u8], mime_type: &str, compress: bool, key: &[u8; 32]) -> Result<Vec<u8>> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest: [u8; 32] = hasher.finalize().into();

    let header = EnvelopeHeader {
        version: VERSION,
        compression: if compress { COMP_GZIP } else { COMP_NONE },
        size: data.len() as u64,
        digest,
        mime: mime_type.to_string(),
    };

    let mut buf = encode_to_vec(|enc| header.encode(enc))?;
    if compress {
        buf.extend_from_slice(&compress::gzip(data)?);
    } else {
        buf.extend_from_slice(data);
    }

    crypto::seal(key, &buf)
}

/// Seal a file from disk, probing its MIME type to decide whether the
/// compression hint applies.
pub fn seal_file(path: &Path, compress_hint: bool, key: &[u8; 32]) -> Result<Vec<u8>> {
    let (mime_type, compressible) = mime::probe(path);
    let data = std::fs::read(path)?;
    seal_bytes(&data, &mime_type, compress_hint && compressible, key)
}

/// Open a sealed payload: decrypt, decode the header, decompress, and verify
/// the plaintext digest and size.
pub fn open(data: &[u8], key: &[u8; 32]) -> Result<(EnvelopeHeader, Vec<u8>)> {
    let plain = crypto::open(key, data)?;

    let mut cursor = Cursor::new(plain.as_slice());
    let header = {
        let mut dec = Decoder::new(&mut cursor);
        EnvelopeHeader::decode(&mut dec)
            .map_err(|e| CryptarError::CorruptPayload(format!("envelope header: {e}")))?
    };
    let body_raw = &plain[cursor.position() as usize..];

    let body = match header.compression {
        COMP_NONE => body_raw.to_vec(),
        COMP_GZIP => compress::gunzip(body_raw, header.size as usize)?,
        other => return Err(CryptarError::BadCompression(other)),
    };

    if body.len() as u64 != header.size {
        return Err(CryptarError::CorruptPayload(format!(
            "payload size mismatch: header says {} bytes, got {}",
            header.size,
            body.len()
        )));
    }
    let mut hasher = Sha256::new();
    hasher.update(&body);
    let digest: [u8; 32] = hasher.finalize().into();
    if digest != header.digest {
        return Err(CryptarError::CorruptPayload(
            "payload digest mismatch".into(),
        ));
    }

    Ok((header, body))
}
