use sha2::{Digest, Sha256};

use crate::compress::{COMP_GZIP, COMP_NONE};
use crate::envelope::{open, seal_bytes, seal_file};
use crate::error::CryptarError;

const KEY: [u8; 32] = [0x11; 32];
const OTHER_KEY: [u8; 32] = [0x22; 32];

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[test]
fn roundtrip_uncompressed() {
    let data = b"six bytes of payload, give or take";
    let sealed = seal_bytes(data, "text/plain", false, &KEY).unwrap();
    let (header, body) = open(&sealed, &KEY).unwrap();
    assert_eq!(body, data);
    assert_eq!(header.compression, COMP_NONE);
    assert_eq!(header.size, data.len() as u64);
    assert_eq!(header.digest, sha256(data));
    assert_eq!(header.mime, "text/plain");
}

#[test]
fn roundtrip_compressed() {
    let data = vec![b'a'; 64 * 1024];
    let sealed = seal_bytes(&data, "text/plain", true, &KEY).unwrap();
    let (header, body) = open(&sealed, &KEY).unwrap();
    assert_eq!(body, data);
    assert_eq!(header.compression, COMP_GZIP);
    assert_eq!(header.size, data.len() as u64);
    // Compression happens inside the sealed region, so the wire form of a
    // very repetitive payload must be much smaller than the plaintext.
    assert!(sealed.len() < data.len() / 2);
}

#[test]
fn roundtrip_empty_payload() {
    let sealed = seal_bytes(b"", "", false, &KEY).unwrap();
    let (header, body) = open(&sealed, &KEY).unwrap();
    assert!(body.is_empty());
    assert_eq!(header.size, 0);
    assert_eq!(header.digest, sha256(b""));
}

#[test]
fn wrong_key_fails_closed() {
    let sealed = seal_bytes(b"secret", "text/plain", false, &KEY).unwrap();
    assert!(matches!(
        open(&sealed, &OTHER_KEY).unwrap_err(),
        CryptarError::DecryptFailed
    ));
}

#[test]
fn tampered_ciphertext_fails() {
    let mut sealed = seal_bytes(b"secret", "text/plain", false, &KEY).unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;
    assert!(matches!(
        open(&sealed, &KEY).unwrap_err(),
        CryptarError::DecryptFailed
    ));
}

#[test]
fn truncated_input_fails() {
    let sealed = seal_bytes(b"secret", "text/plain", false, &KEY).unwrap();
    assert!(matches!(
        open(&sealed[..20], &KEY).unwrap_err(),
        CryptarError::DecryptFailed
    ));
}

#[test]
fn nonces_are_fresh_per_seal() {
    let a = seal_bytes(b"same", "text/plain", false, &KEY).unwrap();
    let b = seal_bytes(b"same", "text/plain", false, &KEY).unwrap();
    assert_ne!(a[..24], b[..24]);
    assert_ne!(a, b);
}

#[test]
fn parallel_gzip_boundary_roundtrips() {
    // One byte below, at, and above the threshold where compression switches
    // to the parallel implementation. The reader must not notice.
    const MIB: usize = 1024 * 1024;
    for size in [MIB - 1, MIB, MIB + 1] {
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let sealed = seal_bytes(&data, "text/plain", true, &KEY).unwrap();
        let (header, body) = open(&sealed, &KEY).unwrap();
        assert_eq!(body.len(), size, "size {size}");
        assert_eq!(body, data, "size {size}");
        assert_eq!(header.size, size as u64);
    }
}

#[test]
fn seal_file_probes_mime_and_compresses_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, vec![b'x'; 8192]).unwrap();

    let sealed = seal_file(&path, true, &KEY).unwrap();
    let (header, body) = open(&sealed, &KEY).unwrap();
    assert_eq!(header.mime, "text/plain");
    assert_eq!(header.compression, COMP_GZIP);
    assert_eq!(body, vec![b'x'; 8192]);
}

#[test]
fn seal_file_skips_compression_for_compressed_formats() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob.gz");
    std::fs::write(&path, [0x1f, 0x8b, 0x08, 0x00, 0x42, 0x42]).unwrap();

    let sealed = seal_file(&path, true, &KEY).unwrap();
    let (header, _body) = open(&sealed, &KEY).unwrap();
    assert_eq!(header.mime, "application/gzip");
    assert_eq!(header.compression, COMP_NONE);
}

#[test]
fn seal_file_honors_disabled_hint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"compressible text").unwrap();

    let sealed = seal_file(&path, false, &KEY).unwrap();
    let (header, _body) = open(&sealed, &KEY).unwrap();
    assert_eq!(header.compression, COMP_NONE);
}
