//! How bytes get from a source file to a destination.
//!
//! The writer tries, in order: copy-on-write clone, hardlink, full copy.
//! [`PlatformTransfer`] clones where the platform has a clone call and the
//! filesystem supports it; tests substitute their own [`Transfer`].

use std::fs;
use std::io;
use std::path::Path;

/// Filesystem primitives used to materialize a destination.
///
/// The destination never exists when these are called.
pub trait Transfer: Send + Sync {
    /// Whether [`try_clone_file`](Self::try_clone_file) can succeed at all.
    fn supports_clone(&self) -> bool {
        false
    }

    /// Clone `src` to `dst` sharing storage where the filesystem allows.
    /// Returns `false` when nothing was written.
    fn try_clone_file(&self, src: &Path, dst: &Path) -> io::Result<bool> {
        let _ = (src, dst);
        Ok(false)
    }

    fn hard_link(&self, src: &Path, dst: &Path) -> io::Result<()> {
        fs::hard_link(src, dst)
    }

    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        fs::copy(src, dst).map(drop)
    }
}

/// Transfer backed by the host platform.
///
/// Clones with `FICLONE` on Linux (Btrfs, XFS), `clonefile` on macOS (APFS)
/// and block cloning on Windows (ReFS). Filesystems that cannot clone make
/// [`try_clone_file`](Transfer::try_clone_file) return `false`, so the
/// writer moves on to a hardlink.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformTransfer;

impl Transfer for PlatformTransfer {
    fn supports_clone(&self) -> bool {
        cfg!(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios",
            target_os = "windows"
        ))
    }

    fn try_clone_file(&self, src: &Path, dst: &Path) -> io::Result<bool> {
        if !self.supports_clone() {
            return Ok(false);
        }
        match reflink_copy::reflink(src, dst) {
            Ok(()) => Ok(true),
            // Someone else's file, leave it alone
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
            Err(e) => {
                crate::debug!("write"; "clone unavailable ({}), linking {}", e, dst.display());
                match fs::remove_file(dst) {
                    Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                    _ => Ok(false),
                }
            }
        }
    }
}

/// Whether a failed hardlink should fall back to a full copy.
pub(super) fn is_link_fallback(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::CrossesDevices | io::ErrorKind::PermissionDenied
    )
}
