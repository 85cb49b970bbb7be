//! Big-endian record codec shared by the manifest stream, the crypto
//! envelope header and the wrapped key bundle.
//!
//! Wire rules: fixed-width 32/64-bit integers in network byte order;
//! fixed-length byte strings padded with zeros to a 4-byte boundary;
//! variable-length byte strings as a 4-byte length followed by the bytes and
//! zero padding to a 4-byte boundary; timestamps as 64-bit seconds plus
//! 32-bit nanoseconds. The decoder is strict: nonzero padding and oversized
//! lengths are rejected, and a read past end-of-input surfaces the
//! underlying I/O error.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{CryptarError, Result};

/// Upper bound for variable-length fields (paths, MIME strings, link
/// targets). File payloads never travel through the codec, so anything
/// larger than this is a corrupt or hostile stream.
pub const MAX_OPAQUE_LEN: u32 = 1 << 20;

fn pad_len(n: usize) -> usize {
    (4 - n % 4) % 4
}

pub struct Encoder<W: Write> {
    w: W,
}

impl<W: Write> Encoder<W> {
    pub fn new(w: W) -> Self {
        Self { w }
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.w.write_u32::<BigEndian>(v)?;
        Ok(())
    }

    pub fn put_i32(&mut self, v: i32) -> Result<()> {
        self.w.write_i32::<BigEndian>(v)?;
        Ok(())
    }

    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        self.w.write_u64::<BigEndian>(v)?;
        Ok(())
    }

    pub fn put_i64(&mut self, v: i64) -> Result<()> {
        self.w.write_i64::<BigEndian>(v)?;
        Ok(())
    }

    /// Fixed-length byte string: the bytes themselves, zero-padded to the
    /// next 4-byte boundary. No length prefix; the decoder must know the
    /// width.
    pub fn put_fixed(&mut self, bytes: &[u8]) -> Result<()> {
        self.w.write_all(bytes)?;
        let pad = [0u8; 3];
        self.w.write_all(&pad[..pad_len(bytes.len())])?;
        Ok(())
    }

    /// Variable-length byte string: 4-byte length, bytes, zero padding.
    pub fn put_opaque(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() as u64 > MAX_OPAQUE_LEN as u64 {
            return Err(CryptarError::BadManifest(format!(
                "field of {} bytes exceeds the {} byte limit",
                bytes.len(),
                MAX_OPAQUE_LEN
            )));
        }
        self.put_u32(bytes.len() as u32)?;
        self.put_fixed(bytes)
    }

    pub fn put_string(&mut self, s: &str) -> Result<()> {
        self.put_opaque(s.as_bytes())
    }

    pub fn put_time(&mut self, secs: i64, nanos: u32) -> Result<()> {
        self.put_i64(secs)?;
        self.put_u32(nanos)
    }
}

pub struct Decoder<R: Read> {
    r: R,
}

impl<R: Read> Decoder<R> {
    pub fn new(r: R) -> Self {
        Self { r }
    }

    pub fn into_inner(self) -> R {
        self.r
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(self.r.read_u32::<BigEndian>()?)
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        Ok(self.r.read_i32::<BigEndian>()?)
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        Ok(self.r.read_u64::<BigEndian>()?)
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(self.r.read_i64::<BigEndian>()?)
    }

    /// Read a fixed-length byte string into `buf` and consume its padding.
    pub fn get_fixed(&mut self, buf: &mut [u8]) -> Result<()> {
        self.r.read_exact(buf)?;
        self.skip_padding(buf.len())
    }

    pub fn get_opaque(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u32()?;
        if len > MAX_OPAQUE_LEN {
            return Err(CryptarError::BadManifest(format!(
                "field length {len} exceeds the {MAX_OPAQUE_LEN} byte limit"
            )));
        }
        let mut buf = vec![0u8; len as usize];
        self.r.read_exact(&mut buf)?;
        self.skip_padding(buf.len())?;
        Ok(buf)
    }

    pub fn get_string(&mut self) -> Result<String> {
        let bytes = self.get_opaque()?;
        String::from_utf8(bytes)
            .map_err(|_| CryptarError::BadManifest("string field is not valid UTF-8".into()))
    }

    pub fn get_time(&mut self) -> Result<(i64, u32)> {
        let secs = self.get_i64()?;
        let nanos = self.get_u32()?;
        Ok((secs, nanos))
    }

    fn skip_padding(&mut self, body_len: usize) -> Result<()> {
        let mut pad = [0u8; 3];
        let n = pad_len(body_len);
        self.r.read_exact(&mut pad[..n])?;
        if pad[..n].iter().any(|b| *b != 0) {
            return Err(CryptarError::BadManifest("nonzero padding".into()));
        }
        Ok(())
    }
}

/// Encode a closure's worth of fields into an owned buffer.
pub fn encode_to_vec(f: impl FnOnce(&mut Encoder<&mut Vec<u8>>) -> Result<()>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut enc = Encoder::new(&mut buf);
    f(&mut enc)?;
    Ok(buf)
}
