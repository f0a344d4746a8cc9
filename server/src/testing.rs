use std::{
    cell::RefCell,
    collections::HashMap,
    fs::File,
    os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd},
    path::{Path, PathBuf},
};

use binder_common::{
    error::{BinderError, Result, SetupStep},
    Announcement,
};
use nix::errno::Errno;

use crate::platform::Platform;

/// Platform fake that records every call and hands out `/dev/null`
/// descriptors instead of sockets.
#[derive(Debug, Default)]
pub(crate) struct RecordingPlatform {
    fail_on:   Option<&'static str>,
    calls:     RefCell<Vec<String>>,
    labels:    RefCell<HashMap<RawFd, String>>,
    addresses: RefCell<Vec<PathBuf>>,
    published: RefCell<Option<Announcement>>,
}

impl RecordingPlatform {
    /// Fails the first call whose record starts with `prefix`.
    pub(crate) fn failing_on(prefix: &'static str) -> Self {
        Self {
            fail_on: Some(prefix),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn addresses(&self) -> Vec<PathBuf> {
        self.addresses.borrow().clone()
    }

    pub(crate) fn published(&self) -> Option<Announcement> {
        self.published.borrow().clone()
    }

    pub(crate) fn fd_of(&self, label: &str) -> Option<RawFd> {
        self.labels
            .borrow()
            .iter()
            .find_map(|(fd, l)| (l == label).then_some(*fd))
    }

    fn record(&self, call: String) -> std::result::Result<(), Errno> {
        let fail = self.fail_on.is_some_and(|prefix| call.starts_with(prefix));
        self.calls.borrow_mut().push(call);
        if fail {
            Err(Errno::EIO)
        } else {
            Ok(())
        }
    }

    fn label(&self, fd: BorrowedFd<'_>) -> String {
        self.labels
            .borrow()
            .get(&fd.as_raw_fd())
            .cloned()
            .unwrap_or_else(|| format!("fd{}", fd.as_raw_fd()))
    }

    fn fake_fd(&self, label: &str) -> OwnedFd {
        let fd = OwnedFd::from(File::open("/dev/null").unwrap());
        self.labels
            .borrow_mut()
            .insert(fd.as_raw_fd(), label.to_string());
        fd
    }
}

impl Platform for RecordingPlatform {
    fn make_temp_dir(&self, template: &Path) -> Result<PathBuf> {
        self.record(format!("mkdtemp {}", template.display()))
            .map_err(|source| BinderError::CreateDirectory {
                template: template.to_path_buf(),
                source,
            })?;
        Ok(template.with_file_name("fake00"))
    }

    fn open_dir(&self, path: &Path) -> Result<OwnedFd> {
        self.record(format!("open_dir {}", path.display()))
            .map_err(|source| BinderError::OpenDirectory {
                path: path.to_path_buf(),
                source: source.into(),
            })?;
        Ok(self.fake_fd("dir"))
    }

    fn listen_unix(&self, dir: BorrowedFd<'_>, name: &str, address: &Path) -> Result<OwnedFd> {
        self.addresses.borrow_mut().push(address.to_path_buf());
        self.record(format!("listen {name}"))
            .map_err(|source| BinderError::SocketSetup {
                step: SetupStep::Listen,
                name: name.to_string(),
                dirfd: dir.as_raw_fd(),
                source,
            })?;
        Ok(self.fake_fd(name))
    }

    fn publish(&self, announcement: &Announcement) -> Result<()> {
        self.record(format!("publish {}", announcement.directory().display()))
            .map_err(|source| BinderError::Publish(source.into()))?;
        *self.published.borrow_mut() = Some(announcement.clone());
        Ok(())
    }

    fn accept(&self, listener: BorrowedFd<'_>) -> Result<OwnedFd> {
        self.record(format!("accept {}", self.label(listener)))
            .map_err(|source| BinderError::Accept {
                listener: listener.as_raw_fd(),
                source,
            })?;
        Ok(self.fake_fd("conn"))
    }

    fn unlink_at(&self, dir: BorrowedFd<'_>, name: &str) -> Result<()> {
        self.record(format!("unlink {name}"))
            .map_err(|source| BinderError::Cleanup {
                op: "unlinkat",
                target: format!("dirfd={}, {:?}", dir.as_raw_fd(), name),
                source,
            })
    }

    fn send_fd(&self, conn: BorrowedFd<'_>, fd: BorrowedFd<'_>) -> Result<()> {
        self.record(format!("send {} over {}", self.label(fd), self.label(conn)))
            .map_err(|source| BinderError::Transfer {
                conn: conn.as_raw_fd(),
                data: fd.as_raw_fd(),
                source,
            })
    }

    fn close(&self, label: &'static str, fd: OwnedFd) -> Result<()> {
        let raw = fd.as_raw_fd();
        let owner = self.label(fd.as_fd());
        self.labels.borrow_mut().remove(&raw);
        drop(fd);
        self.record(format!("close {label} {owner}"))
            .map_err(|source| BinderError::Cleanup {
                op: "close",
                target: format!("{label}={raw}"),
                source,
            })
    }
}
