use std::path::Path;

use binder_common::{Announcement, BinderConfig, Result, DATA_SOCKET_NAME, PASS_SOCKET_NAME};

use crate::{
    listener::{listen_unix_socket, ListeningSocket},
    platform::Platform,
    private_dir::{create_private_directory, PrivateDirectory},
    publisher,
    transfer::{serve_once, TransferState},
};

/// One run of the helper: a private directory, its two listeners and the
/// platform they were created through.
///
/// The session is built once, announced once and consumed by [`serve`].
///
/// [`serve`]: BinderSession::serve
#[derive(Debug)]
pub struct BinderSession<P: Platform> {
    platform:  P,
    directory: PrivateDirectory,
    data:      ListeningSocket,
    pass:      ListeningSocket,
}

impl<P: Platform> BinderSession<P> {
    /// Creates the private directory and binds `data`, then `pass`.
    pub fn establish(platform: P, config: &BinderConfig) -> Result<Self> {
        let directory = create_private_directory(&platform, config)?;
        let data = listen_unix_socket(&platform, &directory, DATA_SOCKET_NAME)?;
        let pass = listen_unix_socket(&platform, &directory, PASS_SOCKET_NAME)?;

        Ok(Self {
            platform,
            directory,
            data,
            pass,
        })
    }

    /// Absolute path of the private directory
    pub fn directory(&self) -> &Path {
        self.directory.path()
    }

    /// Prints the announcement and closes stdout.
    pub fn publish(&self) -> Result<Announcement> {
        publisher::publish(&self.platform, &self.directory, &self.data, &self.pass)
    }

    /// Hands `data` to the first consumer of `pass` and releases everything.
    pub fn serve(self) -> Result<TransferState> {
        serve_once(&self.platform, self.directory, self.data, self.pass)
    }

    /// The whole handshake: establish, publish, serve.
    pub fn run(platform: P, config: &BinderConfig) -> Result<TransferState> {
        let session = Self::establish(platform, config)?;
        session.publish()?;
        session.serve()
    }
}
