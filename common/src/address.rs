use std::{
    os::fd::{AsRawFd, BorrowedFd},
    path::{Path, PathBuf},
};

/// Address of `name` inside the directory open as `dir`.
///
/// On Linux the address goes through `/proc/self/fd/<dirfd>`, so it stays
/// short no matter how long `dir_path` is and keeps pointing at the same
/// directory even if it is renamed. Elsewhere it falls back to the plain
/// path, which is subject to the `sun_path` length limit.
pub fn socket_address(dir: BorrowedFd<'_>, dir_path: &Path, name: &str) -> PathBuf {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        let _ = dir_path;
        PathBuf::from(format!("/proc/self/fd/{}/{}", dir.as_raw_fd(), name))
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        tracing::warn!(
            "No /proc/self/fd on this platform, addressing {:?} by path (dirfd={})",
            name,
            dir.as_raw_fd()
        );
        dir_path.join(name)
    }
}
