use std::{
    io::{IoSlice, IoSliceMut},
    os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd},
};

use nix::{
    cmsg_space,
    sys::socket::{recvmsg, sendmsg, ControlMessage, ControlMessageOwned, MsgFlags},
};

use crate::error::{BinderError, Result};

/// Ordinary payload byte carried alongside the descriptor.
///
/// Its value is irrelevant, but the byte itself is not optional: ancillary
/// data attached to a zero-length message may be dropped on some platforms.
pub const FILLER_BYTE: u8 = 0;

/// Sends a duplicate of `fd` over the connected Unix socket `conn`.
///
/// The caller keeps its own `fd`; the peer gets an independent reference to
/// the same open file and closing either side does not affect the other.
pub fn send_fd<C: AsFd, F: AsFd>(conn: &C, fd: &F) -> Result<()> {
    let conn_fd = conn.as_fd().as_raw_fd();
    let data_fd = fd.as_fd().as_raw_fd();

    let payload = [FILLER_BYTE];
    let iov = [IoSlice::new(&payload)];
    let fds = [data_fd];
    let cmsgs = [ControlMessage::ScmRights(&fds)];

    let sent = sendmsg::<()>(conn_fd, &iov, &cmsgs, MsgFlags::empty(), None).map_err(|source| {
        BinderError::Transfer {
            conn: conn_fd,
            data: data_fd,
            source,
        }
    })?;

    tracing::debug!("Sent fd {} over fd {} ({} payload byte)", data_fd, conn_fd, sent);
    Ok(())
}

/// Receives exactly one descriptor from the connected Unix socket `conn`.
///
/// The descriptor is installed close-on-exec. Any surplus descriptors are
/// closed before the error is returned.
pub fn recv_fd<C: AsFd>(conn: &C) -> Result<OwnedFd> {
    let conn_fd = conn.as_fd().as_raw_fd();

    let mut payload = [0u8; 1];
    let mut iov = [IoSliceMut::new(&mut payload)];
    let mut cmsg_buffer = cmsg_space!([RawFd; 1]);

    let msg = recvmsg::<()>(
        conn_fd,
        &mut iov,
        Some(&mut cmsg_buffer),
        MsgFlags::MSG_CMSG_CLOEXEC,
    )
    .map_err(|source| BinderError::Receive {
        conn: conn_fd,
        source,
    })?;

    let mut received = Vec::new();
    for cmsg in msg.cmsgs().map_err(|source| BinderError::Receive {
        conn: conn_fd,
        source,
    })? {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            // SAFETY: the kernel installed these descriptors into our table as
            // part of this message; nothing else refers to them yet.
            received.extend(fds.into_iter().map(|fd| unsafe { OwnedFd::from_raw_fd(fd) }));
        } else {
            tracing::warn!("Ignoring unexpected control message on fd {}", conn_fd);
        }
    }
    tracing::debug!(
        "Received {} payload byte(s) and {} fd(s) on fd {}",
        msg.bytes,
        received.len(),
        conn_fd
    );

    match received.len() {
        0 => Err(BinderError::MissingDescriptor { conn: conn_fd }),
        1 => Ok(received.remove(0)),
        count => Err(BinderError::UnexpectedDescriptors { count }),
    }
}
