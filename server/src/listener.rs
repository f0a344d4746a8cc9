use std::{
    os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd},
    path::{Path, PathBuf},
};

use binder_common::{socket_address, Result};

use crate::{platform::Platform, private_dir::PrivateDirectory};

/// A listening Unix socket inside the private directory
#[derive(Debug)]
pub struct ListeningSocket {
    name:   &'static str,
    path:   PathBuf,
    handle: OwnedFd,
}

impl ListeningSocket {
    /// File name inside the private directory
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Path announced to consumers
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The listening descriptor
    pub fn handle(&self) -> BorrowedFd<'_> {
        self.handle.as_fd()
    }

    pub(crate) fn into_handle(self) -> OwnedFd {
        self.handle
    }
}

/// Binds and listens a stream socket called `name` inside `dir`.
///
/// The bind address goes through the directory handle rather than its path,
/// see [`socket_address`].
pub fn listen_unix_socket<P: Platform>(
    platform: &P,
    dir: &PrivateDirectory,
    name: &'static str,
) -> Result<ListeningSocket> {
    let address = socket_address(dir.handle(), dir.path(), name);
    let handle = platform.listen_unix(dir.handle(), name, &address)?;

    tracing::info!(
        "Listening on {:?} as fd {}",
        dir.path().join(name),
        handle.as_raw_fd()
    );
    Ok(ListeningSocket {
        name,
        path: dir.path().join(name),
        handle,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        io::{Read, Write},
        os::unix::{fs::FileTypeExt, net::UnixStream},
    };

    use binder_common::{BinderConfig, BinderError, DATA_SOCKET_NAME, PASS_SOCKET_NAME};
    use nix::errno::Errno;
    use tempfile::TempDir;

    use super::*;
    use crate::{platform::HostPlatform, private_dir::create_private_directory};

    fn private_dir_in(base: &Path) -> PrivateDirectory {
        let config = BinderConfig::with_base_dir(base).unwrap();
        create_private_directory(&HostPlatform, &config).unwrap()
    }

    #[test]
    fn creates_socket_files() {
        let base = TempDir::new().unwrap();
        let dir = private_dir_in(base.path());

        let data = listen_unix_socket(&HostPlatform, &dir, DATA_SOCKET_NAME).unwrap();
        let pass = listen_unix_socket(&HostPlatform, &dir, PASS_SOCKET_NAME).unwrap();

        assert_eq!(data.path(), dir.path().join("data"));
        assert_eq!(pass.path(), dir.path().join("pass"));
        for socket in [&data, &pass] {
            let file_type = fs::metadata(socket.path()).unwrap().file_type();
            assert!(file_type.is_socket(), "{:?} is not a socket", socket.path());
        }
    }

    #[test]
    fn same_name_twice_is_fatal() {
        let base = TempDir::new().unwrap();
        let dir = private_dir_in(base.path());

        let _first = listen_unix_socket(&HostPlatform, &dir, DATA_SOCKET_NAME).unwrap();
        match listen_unix_socket(&HostPlatform, &dir, DATA_SOCKET_NAME) {
            Err(BinderError::SocketSetup { source, name, .. }) => {
                assert_eq!(source, Errno::EADDRINUSE);
                assert_eq!(name, DATA_SOCKET_NAME);
            }
            other => panic!("expected bind failure, got {other:?}"),
        }
    }

    #[test]
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn binds_below_a_path_too_long_for_sun_path() {
        let base = TempDir::new().unwrap();
        let deep = base.path().join("a".repeat(60)).join("b".repeat(60));
        fs::create_dir_all(&deep).unwrap();
        let dir = private_dir_in(&deep);

        let data = listen_unix_socket(&HostPlatform, &dir, DATA_SOCKET_NAME).unwrap();
        assert!(data.path().as_os_str().len() > 108);

        // A plain path connect cannot even express the address.
        assert!(UnixStream::connect(data.path()).is_err());

        let mut client =
            UnixStream::connect(socket_address(dir.handle(), dir.path(), DATA_SOCKET_NAME))
                .unwrap();
        let listener = std::os::unix::net::UnixListener::from(data.into_handle());
        let (mut server, _) = listener.accept().unwrap();
        client.write_all(b"deep").unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"deep");
    }
}
