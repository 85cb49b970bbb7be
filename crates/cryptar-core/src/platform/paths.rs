use std::path::PathBuf;

use crate::error::{CryptarError, Result};

pub const STATE_DIR_NAME: &str = ".cryptar";
pub const VAULT_DIR_NAME: &str = "vault";

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(unix)]
pub fn home_dir() -> Option<PathBuf> {
    env_path("HOME")
}

#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
    env_path("USERPROFILE").or_else(|| {
        let drive = std::env::var_os("HOMEDRIVE")?;
        let path = std::env::var_os("HOMEPATH")?;
        let mut home = PathBuf::from(drive);
        home.push(path);
        Some(home)
    })
}

#[cfg(not(any(unix, windows)))]
pub fn home_dir() -> Option<PathBuf> {
    env_path("HOME")
}

/// Per-user state directory holding `keys.json` and the cached password.
/// `$CRYPTAR_HOME` overrides the default of `<home>/.cryptar`.
pub fn state_dir() -> Result<PathBuf> {
    if let Some(dir) = env_path("CRYPTAR_HOME") {
        return Ok(dir);
    }
    home_dir()
        .map(|h| h.join(STATE_DIR_NAME))
        .ok_or_else(|| CryptarError::Config("cannot determine home directory".into()))
}

/// Default object-store location when none is configured:
/// `$CRYPTAR_VAULT`, else `<state dir>/vault`.
pub fn default_vault_dir(state_dir: &std::path::Path) -> PathBuf {
    env_path("CRYPTAR_VAULT").unwrap_or_else(|| state_dir.join(VAULT_DIR_NAME))
}
