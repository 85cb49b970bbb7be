//! The key bundle: three 32-byte keys that are the root of trust for one
//! user's backups.
//!
//! `metadata` seals manifests, `data` seals file payloads, `dedup` keys the
//! content fingerprints. The bundle is generated once, persisted locally,
//! and mirrored on the remote store wrapped under a password-derived key.
//! Rotation is deliberately unsupported: a new dedup key would orphan every
//! existing content-addressed object.

use std::fmt;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::codec::{Decoder, Encoder};
use crate::crypto::{self, KEY_SIZE};
use crate::error::{CryptarError, Result};
use crate::store::{ObjectStore, UploadOutcome, METADATA_FOLDER, SECRETS_NAME};

pub const KEYS_FILENAME: &str = "keys.json";
pub const PASSWORD_FILENAME: &str = "password";

pub const SALT_SIZE: usize = 32;

// scrypt parameters for the password wrap: N=32768, r=16, p=2. Fixed for
// blob compatibility; changing them orphans every wrapped bundle.
const SCRYPT_LOG_N: u8 = 15;
const SCRYPT_R: u32 = 16;
const SCRYPT_P: u32 = 2;

/// Source of passwords for the secrets protocol. The CLI backs this with an
/// interactive terminal; tests use canned values.
pub trait PasswordPrompter {
    /// Prompt for a new password: asked twice, must match, must be
    /// non-empty. Loss of this password makes remote secrets unrecoverable.
    fn prompt_new(&mut self) -> Result<Zeroizing<Vec<u8>>>;

    /// Prompt once for an existing password.
    fn prompt_existing(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyBundle {
    pub metadata: [u8; KEY_SIZE],
    pub data: [u8; KEY_SIZE],
    pub dedup: [u8; KEY_SIZE],
}

impl fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBundle").finish_non_exhaustive()
    }
}

impl KeyBundle {
    /// Generate a fresh bundle from OS entropy.
    pub fn generate() -> Self {
        let mut bundle = KeyBundle {
            metadata: [0u8; KEY_SIZE],
            data: [0u8; KEY_SIZE],
            dedup: [0u8; KEY_SIZE],
        };
        rand::rngs::OsRng.fill_bytes(&mut bundle.metadata);
        rand::rngs::OsRng.fill_bytes(&mut bundle.data);
        rand::rngs::OsRng.fill_bytes(&mut bundle.dedup);
        bundle
    }

    /// Load the local bundle, generating and persisting one on first use.
    pub fn load_or_create(state_dir: &Path) -> Result<Self> {
        let path = keys_path(state_dir);
        if !path.exists() {
            std::fs::create_dir_all(state_dir)?;
            restrict_dir_mode(state_dir)?;
            let bundle = KeyBundle::generate();
            let json = serde_json::to_vec_pretty(&bundle)
                .map_err(|e| CryptarError::Config(format!("encode key file: {e}")))?;
            write_private(&path, &json)?;
            info!(path = %path.display(), "generated new key bundle");
            return Ok(bundle);
        }

        let json = std::fs::read(&path)?;
        serde_json::from_slice(&json)
            .map_err(|e| CryptarError::Config(format!("{}: {e}", path.display())))
    }

    /// Constant-time comparison of all three keys.
    pub fn matches(&self, other: &KeyBundle) -> bool {
        let eq = self.metadata.ct_eq(&other.metadata)
            & self.data.ct_eq(&other.data)
            & self.dedup.ct_eq(&other.dedup);
        eq.into()
    }

    /// Deterministic byte form used inside the wrapped blob: the three keys
    /// concatenated in metadata, data, dedup order.
    fn encode(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut buf = Zeroizing::new(Vec::with_capacity(3 * KEY_SIZE));
        let mut enc = Encoder::new(&mut *buf);
        enc.put_fixed(&self.metadata)?;
        enc.put_fixed(&self.data)?;
        enc.put_fixed(&self.dedup)?;
        Ok(buf)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(Cursor::new(bytes));
        let mut bundle = KeyBundle {
            metadata: [0u8; KEY_SIZE],
            data: [0u8; KEY_SIZE],
            dedup: [0u8; KEY_SIZE],
        };
        dec.get_fixed(&mut bundle.metadata)?;
        dec.get_fixed(&mut bundle.data)?;
        dec.get_fixed(&mut bundle.dedup)?;
        Ok(bundle)
    }

    /// Wrap the bundle for remote storage:
    /// `salt(32) || nonce(24) || seal(scrypt(password, salt), bundle)`.
    pub fn wrap(&self, password: &[u8]) -> Result<Vec<u8>> {
        let mut salt = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let wrap_key = derive_wrap_key(password, &salt)?;

        let plaintext = self.encode()?;
        let sealed = crypto::seal(&wrap_key, &plaintext)?;

        let mut blob = Vec::with_capacity(SALT_SIZE + sealed.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    /// Unwrap a remote blob. Every failure mode (wrong password, truncated
    /// blob, corrupted ciphertext) is reported as `BadPassword`; the AEAD
    /// authenticator is the sole integrity check.
    pub fn unwrap(password: &[u8], blob: &[u8]) -> Result<Self> {
        if blob.len() < SALT_SIZE {
            return Err(CryptarError::BadPassword);
        }
        let (salt, sealed) = blob.split_at(SALT_SIZE);
        let mut salt_arr = [0u8; SALT_SIZE];
        salt_arr.copy_from_slice(salt);

        let wrap_key = derive_wrap_key(password, &salt_arr)?;
        let plaintext = Zeroizing::new(
            crypto::open(&wrap_key, sealed).map_err(|_| CryptarError::BadPassword)?,
        );
        KeyBundle::decode(&plaintext).map_err(|_| CryptarError::BadPassword)
    }
}

fn derive_wrap_key(password: &[u8], salt: &[u8; SALT_SIZE]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_SIZE)
        .map_err(|e| CryptarError::KeyDerivation(format!("scrypt params: {e}")))?;
    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    scrypt::scrypt(password, salt, &params, out.as_mut())
        .map_err(|e| CryptarError::KeyDerivation(format!("scrypt: {e}")))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Local state files
// ---------------------------------------------------------------------------

pub fn keys_path(state_dir: &Path) -> PathBuf {
    state_dir.join(KEYS_FILENAME)
}

pub fn password_path(state_dir: &Path) -> PathBuf {
    state_dir.join(PASSWORD_FILENAME)
}

pub fn read_password_file(state_dir: &Path) -> Result<Option<Zeroizing<Vec<u8>>>> {
    match std::fs::read(password_path(state_dir)) {
        Ok(bytes) => Ok(Some(Zeroizing::new(bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn write_password_file(state_dir: &Path, password: &[u8]) -> Result<()> {
    std::fs::create_dir_all(state_dir)?;
    restrict_dir_mode(state_dir)?;
    write_private(&password_path(state_dir), password)
}

/// Create or replace a file readable only by its owner.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    Ok(())
}

fn restrict_dir_mode(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Remote secrets protocol
// ---------------------------------------------------------------------------

/// Enforce "local keys must match remote keys" before any remote operation.
///
/// If the store has no `metadata/secrets` object yet, the local bundle is
/// wrapped under a freshly prompted password and uploaded, binding this
/// machine's keys to the store. Otherwise the remote blob is downloaded and
/// opened, with the cached password file when present and interactively
/// otherwise, then compared byte-for-byte against the local bundle. Any
/// difference means the user has mixed two vaults, which is fatal.
pub fn sync_remote_secrets(
    store: &dyn ObjectStore,
    prompter: &mut dyn PasswordPrompter,
    bundle: &KeyBundle,
    state_dir: &Path,
) -> Result<()> {
    let secrets_path = format!("{METADATA_FOLDER}/{SECRETS_NAME}");
    let id = match store.find(&secrets_path) {
        Ok(id) => id,
        Err(CryptarError::NotFound(_)) => {
            println!(
                "The remote store has no copy of the secrets. Please enter the \
                 password to encrypt the secrets. Loss of this password is \
                 unrecoverable!"
            );
            let password = prompter.prompt_new()?;
            write_password_file(state_dir, &password)?;
            let blob = bundle.wrap(&password)?;
            return match store.upload(METADATA_FOLDER, SECRETS_NAME, &blob)? {
                UploadOutcome::Created(id) => {
                    debug!(object = %id, "uploaded wrapped secrets");
                    Ok(())
                }
                // Lost a race against another machine; treat the remote copy
                // as authoritative and make the user re-run.
                UploadOutcome::AlreadyExists => Err(CryptarError::Conflict(secrets_path)),
            };
        }
        Err(e) => return Err(e),
    };

    let blob = store.download(&id)?;

    if let Some(password) = read_password_file(state_dir)? {
        let remote = KeyBundle::unwrap(&password, &blob)?;
        return if bundle.matches(&remote) {
            Ok(())
        } else {
            Err(CryptarError::KeyMismatch)
        };
    }

    println!(
        "There is no local password file. Please enter the password to verify \
         the integrity of the remote secrets."
    );
    let password = prompter.prompt_existing()?;
    let remote = KeyBundle::unwrap(&password, &blob)?;
    if !bundle.matches(&remote) {
        return Err(CryptarError::KeyMismatch);
    }
    // Verified interactively; cache the password so future runs are
    // non-interactive.
    write_password_file(state_dir, &password)?;
    Ok(())
}
