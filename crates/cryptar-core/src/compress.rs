//! Gzip compression for envelope payloads.
//!
//! Payloads above [`PARALLEL_THRESHOLD`] are compressed with `gzp`, which
//! fans the deflate work out across cores; smaller payloads go through plain
//! `flate2`. Both produce standard gzip streams, so readers never see the
//! difference.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use gzp::deflate::Gzip;
use gzp::par::compress::{ParCompress, ParCompressBuilder};
use gzp::ZWriter;

use crate::error::{CryptarError, Result};

pub const COMP_NONE: [u8; 4] = *b"none";
pub const COMP_GZIP: [u8; 4] = *b"gzip";

/// Payloads larger than this are handed to the parallel compressor.
pub const PARALLEL_THRESHOLD: u64 = 1024 * 1024;

/// Cap for preallocation from the (authenticated) size hint, so a single
/// corrupt header cannot request an absurd buffer up front.
const MAX_CAPACITY_HINT: usize = 64 * 1024 * 1024;

pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() as u64 > PARALLEL_THRESHOLD {
        gzip_parallel(data)
    } else {
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data)?;
        Ok(enc.finish()?)
    }
}

fn gzip_parallel(data: &[u8]) -> Result<Vec<u8>> {
    let sink = SharedBuf::default();
    let mut enc: ParCompress<Gzip> = ParCompressBuilder::new().from_writer(sink.clone());
    enc.write_all(data)?;
    enc.finish()
        .map_err(|e| CryptarError::Io(std::io::Error::other(format!("parallel gzip: {e}"))))?;
    drop(enc);
    Ok(sink.take())
}

/// Decompress a whole gzip member stream. `size_hint` is the expected
/// plaintext size from the envelope header, used only as a capacity hint.
pub fn gunzip(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    let mut dec = MultiGzDecoder::new(data);
    let mut out = Vec::with_capacity(size_hint.min(MAX_CAPACITY_HINT));
    dec.read_to_end(&mut out)
        .map_err(|e| CryptarError::CorruptPayload(format!("gzip: {e}")))?;
    Ok(out)
}

/// `Write` adapter handing `gzp` an owned sink it can move across threads
/// while we keep a handle to collect the output.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut self.0.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
