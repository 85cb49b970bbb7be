use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::fingerprint::Fingerprint;

const KEY: [u8; 32] = [0u8; 32];

#[test]
fn matches_reference_hmac() {
    let fp = Fingerprint::compute(&KEY, b"hello\n");
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&KEY).unwrap();
    mac.update(b"hello\n");
    let expected: [u8; 32] = mac.finalize().into_bytes().into();
    assert_eq!(fp.0, expected);
}

#[test]
fn stable_across_calls() {
    let a = Fingerprint::compute(&KEY, b"payload");
    let b = Fingerprint::compute(&KEY, b"payload");
    assert_eq!(a, b);
    assert_eq!(a.to_hex(), b.to_hex());
}

#[test]
fn different_content_different_name() {
    assert_ne!(
        Fingerprint::compute(&KEY, b"hello"),
        Fingerprint::compute(&KEY, b"world")
    );
}

#[test]
fn different_key_is_an_unrelated_namespace() {
    let other = [0xAB; 32];
    assert_ne!(
        Fingerprint::compute(&KEY, b"same bytes"),
        Fingerprint::compute(&other, b"same bytes")
    );
}

#[test]
fn hex_name_is_lowercase_and_64_chars() {
    let hex = Fingerprint::compute(&KEY, b"x").to_hex();
    assert_eq!(hex.len(), 64);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn zero_marks_empty_files() {
    assert!(Fingerprint::zero().is_zero());
    assert!(!Fingerprint::compute(&KEY, b"").is_zero());
}

#[test]
fn from_file_matches_in_memory_compute() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big");
    let data: Vec<u8> = (0..200_000).map(|i| (i % 253) as u8).collect();
    std::fs::write(&path, &data).unwrap();

    assert_eq!(
        Fingerprint::from_file(&KEY, &path).unwrap(),
        Fingerprint::compute(&KEY, &data)
    );
}
