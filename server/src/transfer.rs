use std::{
    fmt,
    os::fd::{AsFd, AsRawFd},
};

use binder_common::Result;

use crate::{
    listener::ListeningSocket, peer_creds, platform::Platform, private_dir::PrivateDirectory,
};

/// Progress of the one-shot transfer. Strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransferState {
    /// Waiting for the first connection on `pass`
    Listening,
    /// A consumer is connected
    Accepted,
    /// `pass` is closed and gone from the directory
    Unlinked,
    /// The `data` descriptor is on its way
    Sent,
    /// Every handle has been released
    Closed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferState::Listening => "LISTENING",
            TransferState::Accepted => "ACCEPTED",
            TransferState::Unlinked => "UNLINKED",
            TransferState::Sent => "SENT",
            TransferState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

struct Transition(TransferState);

impl Transition {
    fn advance(&mut self, next: TransferState) {
        debug_assert!(next > self.0, "transfer went from {} to {}", self.0, next);
        tracing::debug!("Transfer {} -> {}", self.0, next);
        self.0 = next;
    }
}

/// Serves exactly one consumer, then releases everything.
///
/// Blocks in accept with no timeout. The first connection on `pass` gets a
/// duplicate of the `data` listener; before that happens `pass` is closed
/// and unlinked so nobody else can connect. The `data` socket file stays on
/// disk. Any failure returns immediately; handles not yet closed are
/// released by `Drop` and no files are removed.
pub fn serve_once<P: Platform>(
    platform: &P,
    dir: PrivateDirectory,
    data: ListeningSocket,
    pass: ListeningSocket,
) -> Result<TransferState> {
    let mut state = Transition(TransferState::Listening);
    tracing::info!("Waiting for a consumer on {:?}", pass.path());

    let conn = platform.accept(pass.handle())?;
    state.advance(TransferState::Accepted);
    match peer_creds::peer_credentials(&conn) {
        Ok(peer) => tracing::info!(
            "Consumer connected on fd {} (pid {}, uid {})",
            conn.as_raw_fd(),
            peer.pid,
            peer.uid
        ),
        Err(e) => tracing::debug!("Peer credentials unavailable for fd {}: {}", conn.as_raw_fd(), e),
    }

    let pass_name = pass.name();
    platform.close("passsock", pass.into_handle())?;
    platform.unlink_at(dir.handle(), pass_name)?;
    state.advance(TransferState::Unlinked);

    platform.send_fd(conn.as_fd(), data.handle())?;
    state.advance(TransferState::Sent);

    platform.close("connsock", conn)?;
    platform.close("datasock", data.into_handle())?;
    let (path, handle) = dir.into_parts();
    platform.close("dirfd", handle)?;
    drop(path);
    state.advance(TransferState::Closed);

    tracing::info!("Descriptor handed over, nothing left to serve");
    Ok(state.0)
}
