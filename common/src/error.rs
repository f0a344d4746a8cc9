use std::{fmt, io, os::fd::RawFd, path::PathBuf, process::ExitStatus};

use nix::errno::Errno;
use thiserror::Error;

/// Result alias used across the workspace
pub type Result<T, E = BinderError> = std::result::Result<T, E>;

/// Step of listener setup that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    /// Building the `sockaddr_un`
    Address,
    /// `socket(2)`
    Socket,
    /// `bind(2)`
    Bind,
    /// `listen(2)`
    Listen,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetupStep::Address => "address",
            SetupStep::Socket => "socket",
            SetupStep::Bind => "bind",
            SetupStep::Listen => "listen",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong in the handshake, on either side.
///
/// Helper-side variants name the failing syscall and the raw descriptor
/// values involved so the single diagnostic printed on exit is enough to
/// locate the failure.
#[derive(Debug, Error)]
pub enum BinderError {
    #[error("failed to resolve base directory")]
    ResolveBase(#[source] io::Error),

    #[error("mkdtemp({}) failed", template.display())]
    CreateDirectory {
        template: PathBuf,
        #[source]
        source:   Errno,
    },

    #[error("open({}) failed", path.display())]
    OpenDirectory {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("path {} cannot be announced on a single line", path.display())]
    UnannounceablePath { path: PathBuf },

    #[error("{step} failed for socket {name:?} (dirfd={dirfd})")]
    SocketSetup {
        step:   SetupStep,
        name:   String,
        dirfd:  RawFd,
        #[source]
        source: Errno,
    },

    #[error("failed to publish announcement")]
    Publish(#[source] io::Error),

    #[error("accept4(passsock={listener}) failed")]
    Accept {
        listener: RawFd,
        #[source]
        source:   Errno,
    },

    #[error("sendmsg(connsock={conn}, {{msg={{datasock={data}}}}}) failed")]
    Transfer {
        conn:   RawFd,
        data:   RawFd,
        #[source]
        source: Errno,
    },

    #[error("{op}({target}) failed")]
    Cleanup {
        op:     &'static str,
        target: String,
        #[source]
        source: Errno,
    },

    #[error("recvmsg(fd={conn}) failed")]
    Receive {
        conn:   RawFd,
        #[source]
        source: Errno,
    },

    #[error("no descriptor arrived on fd {conn}")]
    MissingDescriptor { conn: RawFd },

    #[error("expected exactly one descriptor, received {count}")]
    UnexpectedDescriptors { count: usize },

    #[error("failed to read announcement")]
    ReadAnnouncement(#[source] io::Error),

    #[error("malformed announcement at line {line}: {reason}")]
    MalformedAnnouncement { line: usize, reason: String },

    #[error("connect({}) failed", path.display())]
    Connect {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn {}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source:  io::Error,
    },

    #[error("failed to wait for helper")]
    Wait(#[source] io::Error),

    #[error("helper exited unsuccessfully: {status}")]
    HelperFailed { status: ExitStatus },
}

impl BinderError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        BinderError::MalformedAnnouncement {
            line,
            reason: reason.into(),
        }
    }
}
