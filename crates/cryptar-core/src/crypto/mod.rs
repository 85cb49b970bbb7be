//! Authenticated encryption primitives.
//!
//! Everything stored remotely (data objects, manifests, the wrapped key
//! bundle) goes through the same sealed form: a random 24-byte nonce
//! followed by the XChaCha20-Poly1305 ciphertext with its 16-byte tag.
//! The 24-byte nonce makes purely random nonces safe at any realistic
//! object count, which is why no counter state exists anywhere.

pub mod fingerprint;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;

use crate::error::{CryptarError, Result};

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 24;
pub const TAG_SIZE: usize = 16;

/// Encrypt plaintext under `key`. Wire format: `[24-byte nonce][ciphertext + 16-byte tag]`.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .expect("valid 32-byte key for XChaCha20-Poly1305");

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptarError::Crypto(format!("XChaCha20-Poly1305 encrypt: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt data produced by [`seal`]. Any authentication failure, including
/// truncated input, is reported uniformly as `DecryptFailed`.
pub fn open(key: &[u8; KEY_SIZE], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptarError::DecryptFailed);
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .expect("valid 32-byte key for XChaCha20-Poly1305");
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptarError::DecryptFailed)
}
