//! Free-space probing for the asset volume

use std::io;
use std::path::{Path, PathBuf};

/// Reports the bytes available to unprivileged writers on the asset volume
pub trait SpaceProbe: Send + Sync {
    fn available_bytes(&self) -> io::Result<u64>;
}

/// Probes the filesystem that holds `path`
///
/// When `path` does not exist yet, its closest existing ancestor is probed
/// instead so the check can run before the asset directory is created.
#[derive(Debug, Clone)]
pub struct VolumeSpaceProbe {
    path: PathBuf,
}

impl VolumeSpaceProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SpaceProbe for VolumeSpaceProbe {
    fn available_bytes(&self) -> io::Result<u64> {
        let target = self
            .path
            .ancestors()
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| Path::new("."));
        available_space(target)
    }
}

#[cfg(unix)]
fn available_space(path: &Path) -> io::Result<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: c_path is a valid NUL-terminated string, stat is zero-initialised
    // and only read after statvfs reports success.
    unsafe {
        let mut stat: libc::statvfs = std::mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(io::Error::last_os_error());
        }

        // f_bavail: blocks available to unprivileged users
        #[allow(clippy::unnecessary_cast)]
        let available = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
        Ok(available)
    }
}

#[cfg(not(unix))]
fn available_space(path: &Path) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("free-space probing is not supported here ({})", path.display()),
    ))
}
