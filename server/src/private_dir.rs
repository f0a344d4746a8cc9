use std::{
    os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd},
    path::{Path, PathBuf},
};

use binder_common::{BinderConfig, Result};

use crate::platform::Platform;

/// Owner-only directory that namespaces the two sockets.
///
/// Holds both the path, for the announcement, and an open handle, which is
/// what every later operation goes through. Nothing removes the directory;
/// whoever supervises the helper owns that cleanup.
#[derive(Debug)]
pub struct PrivateDirectory {
    path:   PathBuf,
    handle: OwnedFd,
}

impl PrivateDirectory {
    /// Absolute path of the directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open handle to the directory
    pub fn handle(&self) -> BorrowedFd<'_> {
        self.handle.as_fd()
    }

    pub(crate) fn into_parts(self) -> (PathBuf, OwnedFd) {
        (self.path, self.handle)
    }
}

/// Creates a fresh private directory under the configured base.
///
/// `mkdtemp` picks the name and applies mode 0700 in the same step, so the
/// directory is never reachable by anyone else, not even briefly.
pub fn create_private_directory<P: Platform>(
    platform: &P,
    config: &BinderConfig,
) -> Result<PrivateDirectory> {
    let template = config.dir_template();
    tracing::debug!(
        "Creating private directory from {:?} (base from {})",
        template,
        config.base_source
    );

    let path = platform.make_temp_dir(&template)?;
    let handle = platform.open_dir(&path)?;

    tracing::info!(
        "Private directory {:?} open as fd {}",
        path,
        handle.as_raw_fd()
    );
    Ok(PrivateDirectory { path, handle })
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, fs, os::unix::fs::PermissionsExt};

    use binder_common::BinderError;
    use tempfile::TempDir;

    use super::*;
    use crate::platform::HostPlatform;

    #[test]
    fn directory_is_owner_only() {
        let base = TempDir::new().unwrap();
        let config = BinderConfig::with_base_dir(base.path()).unwrap();

        let dir = create_private_directory(&HostPlatform, &config).unwrap();
        assert!(dir.path().starts_with(base.path()));

        let mode = fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn names_are_unique() {
        let base = TempDir::new().unwrap();
        let config = BinderConfig::with_base_dir(base.path()).unwrap();

        let paths: HashSet<PathBuf> = (0..16)
            .map(|_| {
                create_private_directory(&HostPlatform, &config)
                    .unwrap()
                    .path()
                    .to_path_buf()
            })
            .collect();
        assert_eq!(paths.len(), 16);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn handle_refers_to_the_directory() {
        let base = TempDir::new().unwrap();
        let config = BinderConfig::with_base_dir(base.path()).unwrap();
        let dir = create_private_directory(&HostPlatform, &config).unwrap();

        let via_handle =
            fs::read_link(format!("/proc/self/fd/{}", dir.handle().as_raw_fd())).unwrap();
        assert_eq!(via_handle, dir.path());
    }

    #[test]
    fn missing_base_is_fatal() {
        let base = TempDir::new().unwrap();
        let config = BinderConfig::with_base_dir(base.path().join("missing")).unwrap();

        let err = create_private_directory(&HostPlatform, &config).unwrap_err();
        assert!(matches!(err, BinderError::CreateDirectory { .. }));
        assert!(err.to_string().starts_with("mkdtemp("));
    }
}
