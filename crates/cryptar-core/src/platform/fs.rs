//! Platform-specific filesystem details: metadata capture for the manifest
//! and attribute restore on extract.

use std::fs::Metadata;
use std::path::Path;

use crate::manifest::Timespec;

#[derive(Debug, Clone, Copy)]
pub struct MetadataSummary {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: Timespec,
    pub size: u64,
}

pub fn summarize(metadata: &Metadata) -> MetadataSummary {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        MetadataSummary {
            mode: metadata.mode(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            mtime: Timespec::new(metadata.mtime(), metadata.mtime_nsec() as u32),
            size: metadata.len(),
        }
    }

    #[cfg(not(unix))]
    {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
            .map(|d| Timespec::new(d.as_secs() as i64, d.subsec_nanos()))
            .unwrap_or_default();
        let mode = if metadata.is_dir() { 0o755 } else { 0o644 };

        MetadataSummary {
            mode,
            uid: 0,
            gid: 0,
            mtime,
            size: metadata.len(),
        }
    }
}

pub fn apply_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
    }

    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

pub fn apply_owner(path: &Path, uid: u32, gid: u32) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let c_path = path_to_cstring(path)?;
        if unsafe { libc::chown(c_path.as_ptr(), uid, gid) } == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (path, uid, gid);
        Ok(())
    }
}

pub fn set_file_mtime(path: &Path, mtime: Timespec) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let c_path = path_to_cstring(path)?;
        let times = [
            libc::timespec {
                tv_sec: 0,
                tv_nsec: libc::UTIME_OMIT,
            },
            libc::timespec {
                tv_sec: mtime.secs as _,
                tv_nsec: mtime.nanos as _,
            },
        ];
        if unsafe { libc::utimensat(libc::AT_FDCWD, c_path.as_ptr(), times.as_ptr(), 0) } == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (path, mtime);
        Ok(())
    }
}

pub fn create_symlink(link_target: &Path, at: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(link_target, at)
    }

    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(link_target, at)
            .or_else(|_| std::os::windows::fs::symlink_dir(link_target, at))
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (link_target, at);
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "symlinks are not supported on this platform",
        ))
    }
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> std::io::Result<std::ffi::CString> {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path contains NUL byte")
    })
}
