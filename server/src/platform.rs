use std::{
    fs::{File, OpenOptions},
    io,
    os::{
        fd::{AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd},
        unix::fs::OpenOptionsExt,
    },
    path::{Path, PathBuf},
};

use binder_common::{
    config::LISTEN_BACKLOG,
    error::{BinderError, Result, SetupStep},
    fdpass, Announcement,
};
use nix::{
    errno::Errno,
    sys::socket::{bind, socket, AddressFamily, SockFlag, SockType, UnixAddr},
    unistd::{self, UnlinkatFlags},
};

/// Filesystem and socket operations the handshake is built from.
///
/// The session only talks to the operating system through this trait, so
/// tests can swap in a recording fake that never touches real sockets.
/// Every handle crosses the boundary as an `OwnedFd`, which closes itself if
/// an error unwinds the session early.
pub trait Platform {
    /// Atomically creates an owner-only directory from a `mkdtemp` template.
    fn make_temp_dir(&self, template: &Path) -> Result<PathBuf>;

    /// Opens `path` as a close-on-exec directory handle.
    fn open_dir(&self, path: &Path) -> Result<OwnedFd>;

    /// Creates a Unix stream socket bound to `address` and listening.
    ///
    /// `name` and `dir` only identify the socket in errors.
    fn listen_unix(&self, dir: BorrowedFd<'_>, name: &str, address: &Path) -> Result<OwnedFd>;

    /// Writes the announcement to stdout and closes stdout.
    fn publish(&self, announcement: &Announcement) -> Result<()>;

    /// Blocks until one connection arrives and returns it close-on-exec.
    fn accept(&self, listener: BorrowedFd<'_>) -> Result<OwnedFd>;

    /// Removes `name` from the directory open as `dir`.
    fn unlink_at(&self, dir: BorrowedFd<'_>, name: &str) -> Result<()>;

    /// Sends a duplicate of `fd` over `conn` as `SCM_RIGHTS`.
    fn send_fd(&self, conn: BorrowedFd<'_>, fd: BorrowedFd<'_>) -> Result<()>;

    /// Closes `fd`, reporting failure instead of swallowing it like `Drop`.
    fn close(&self, label: &'static str, fd: OwnedFd) -> Result<()>;
}

impl<T: Platform + ?Sized> Platform for &T {
    fn make_temp_dir(&self, template: &Path) -> Result<PathBuf> {
        (**self).make_temp_dir(template)
    }

    fn open_dir(&self, path: &Path) -> Result<OwnedFd> {
        (**self).open_dir(path)
    }

    fn listen_unix(&self, dir: BorrowedFd<'_>, name: &str, address: &Path) -> Result<OwnedFd> {
        (**self).listen_unix(dir, name, address)
    }

    fn publish(&self, announcement: &Announcement) -> Result<()> {
        (**self).publish(announcement)
    }

    fn accept(&self, listener: BorrowedFd<'_>) -> Result<OwnedFd> {
        (**self).accept(listener)
    }

    fn unlink_at(&self, dir: BorrowedFd<'_>, name: &str) -> Result<()> {
        (**self).unlink_at(dir, name)
    }

    fn send_fd(&self, conn: BorrowedFd<'_>, fd: BorrowedFd<'_>) -> Result<()> {
        (**self).send_fd(conn, fd)
    }

    fn close(&self, label: &'static str, fd: OwnedFd) -> Result<()> {
        (**self).close(label, fd)
    }
}

/// The real operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostPlatform;

impl Platform for HostPlatform {
    fn make_temp_dir(&self, template: &Path) -> Result<PathBuf> {
        unistd::mkdtemp(template).map_err(|source| BinderError::CreateDirectory {
            template: template.to_path_buf(),
            source,
        })
    }

    fn open_dir(&self, path: &Path) -> Result<OwnedFd> {
        let dir = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECTORY)
            .open(path)
            .map_err(|source| BinderError::OpenDirectory {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(OwnedFd::from(dir))
    }

    fn listen_unix(&self, dir: BorrowedFd<'_>, name: &str, address: &Path) -> Result<OwnedFd> {
        let setup_error = |step: SetupStep| {
            let name = name.to_string();
            let dirfd = dir.as_raw_fd();
            move |source: Errno| BinderError::SocketSetup {
                step,
                name,
                dirfd,
                source,
            }
        };

        let addr = UnixAddr::new(address).map_err(setup_error(SetupStep::Address))?;
        let sock = socket(
            AddressFamily::Unix,
            SockType::Stream,
            SockFlag::SOCK_CLOEXEC,
            None,
        )
        .map_err(setup_error(SetupStep::Socket))?;
        bind(sock.as_raw_fd(), &addr).map_err(setup_error(SetupStep::Bind))?;

        // SAFETY: `sock` is a valid socket descriptor owned by this function.
        let ret = unsafe { libc::listen(sock.as_raw_fd(), LISTEN_BACKLOG) };
        Errno::result(ret).map_err(setup_error(SetupStep::Listen))?;

        tracing::debug!(
            "Socket {:?} listening on fd {} via {:?}",
            name,
            sock.as_raw_fd(),
            address
        );
        Ok(sock)
    }

    fn publish(&self, announcement: &Announcement) -> Result<()> {
        {
            let mut out = io::stdout().lock();
            announcement
                .write_to(&mut out)
                .map_err(BinderError::Publish)?;
        }

        unistd::close(libc::STDOUT_FILENO).map_err(|source| BinderError::Cleanup {
            op: "close",
            target: "stdout".to_string(),
            source,
        })?;

        // Keep fd 1 occupied so a later descriptor cannot take its place.
        let placeholder = File::options()
            .write(true)
            .open("/dev/null")
            .map_err(BinderError::Publish)?;
        if placeholder.as_raw_fd() == libc::STDOUT_FILENO {
            let _ = placeholder.into_raw_fd();
        }
        Ok(())
    }

    fn accept(&self, listener: BorrowedFd<'_>) -> Result<OwnedFd> {
        let raw = accept_cloexec(listener.as_raw_fd()).map_err(|source| BinderError::Accept {
            listener: listener.as_raw_fd(),
            source,
        })?;
        // SAFETY: accept returned a fresh descriptor that nothing else owns.
        Ok(unsafe { OwnedFd::from_raw_fd(raw) })
    }

    fn unlink_at(&self, dir: BorrowedFd<'_>, name: &str) -> Result<()> {
        unistd::unlinkat(Some(dir.as_raw_fd()), name, UnlinkatFlags::NoRemoveDir).map_err(
            |source| BinderError::Cleanup {
                op: "unlinkat",
                target: format!("dirfd={}, {:?}", dir.as_raw_fd(), name),
                source,
            },
        )
    }

    fn send_fd(&self, conn: BorrowedFd<'_>, fd: BorrowedFd<'_>) -> Result<()> {
        fdpass::send_fd(&conn, &fd)
    }

    fn close(&self, label: &'static str, fd: OwnedFd) -> Result<()> {
        let raw = fd.into_raw_fd();
        unistd::close(raw).map_err(|source| BinderError::Cleanup {
            op: "close",
            target: format!("{label}={raw}"),
            source,
        })
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn accept_cloexec(listener: i32) -> nix::Result<i32> {
    nix::sys::socket::accept4(listener, SockFlag::SOCK_CLOEXEC)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
fn accept_cloexec(listener: i32) -> nix::Result<i32> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};

    let raw = nix::sys::socket::accept(listener)?;
    if let Err(e) = fcntl(raw, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)) {
        let _ = unistd::close(raw);
        return Err(e);
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use std::os::{
        fd::AsFd,
        unix::net::{UnixListener, UnixStream},
    };

    use nix::fcntl::{fcntl, FcntlArg, FdFlag};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn accepted_connection_is_close_on_exec() {
        let dir = TempDir::new().unwrap();
        let listener = UnixListener::bind(dir.path().join("pass")).unwrap();
        let _client = UnixStream::connect(dir.path().join("pass")).unwrap();

        let conn = HostPlatform.accept(listener.as_fd()).unwrap();
        let flags = fcntl(conn.as_raw_fd(), FcntlArg::F_GETFD).unwrap();
        assert!(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
    }

    #[test]
    fn listening_socket_is_close_on_exec() {
        let dir = TempDir::new().unwrap();
        let handle = File::open(dir.path()).unwrap();
        let address = dir.path().join("data");

        let sock = HostPlatform
            .listen_unix(handle.as_fd(), "data", &address)
            .unwrap();
        let flags = fcntl(sock.as_raw_fd(), FcntlArg::F_GETFD).unwrap();
        assert!(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
        UnixStream::connect(&address).unwrap();
    }
}
