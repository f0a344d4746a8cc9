use std::{
    ffi::OsString,
    fs::File,
    io::{self, BufReader},
    os::{fd::AsFd, unix::net::{UnixListener, UnixStream}},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
};

use binder_common::{
    config::{PASS_SOCKET_NAME, RUNTIME_DIR_ENV},
    recv_fd, socket_address, Announcement, BinderError, Result,
};

/// Name the helper binary is looked up under by default
pub const DEFAULT_PROGRAM: &str = "socket-binder";

/// Configuration for launching the helper
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Helper executable, resolved through `PATH` when relative
    pub program:  PathBuf,
    /// Base directory handed to the helper as `XDG_RUNTIME_DIR`
    pub base_dir: Option<PathBuf>,
    /// Extra environment for the helper, e.g. `RUST_LOG`
    pub envs:     Vec<(OsString, OsString)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program:  PathBuf::from(DEFAULT_PROGRAM),
            base_dir: None,
            envs:     Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Creates a client configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the helper executable
    pub fn with_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.program = program.into();
        self
    }

    /// Set the directory the private directory is created under
    pub fn with_base_dir<P: Into<PathBuf>>(mut self, base_dir: P) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Add an environment variable for the helper
    pub fn with_env<K: Into<OsString>, V: Into<OsString>>(mut self, key: K, value: V) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Launches the helper and reads its announcement
#[derive(Debug, Clone, Default)]
pub struct SocketBinderClient {
    config: ClientConfig,
}

impl SocketBinderClient {
    /// Creates a client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Starts the helper and waits for its complete announcement.
    ///
    /// Returns once the helper has printed all four lines and closed its
    /// stdout. The helper is then blocked in accept until someone connects
    /// to the `pass` socket.
    pub fn spawn(&self) -> Result<SpawnedBinder> {
        let program = &self.config.program;
        let mut command = Command::new(program);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .envs(self.config.envs.iter().map(|(k, v)| (k, v)));
        if let Some(base_dir) = &self.config.base_dir {
            command.env(RUNTIME_DIR_ENV, base_dir);
        }

        tracing::debug!("Spawning {:?}", program);
        let mut child = command.spawn().map_err(|source| BinderError::Spawn {
            program: program.clone(),
            source,
        })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = reap(&mut child);
            return Err(BinderError::Spawn {
                program: program.clone(),
                source:  io::Error::other("helper stdout was not captured"),
            });
        };

        match Announcement::read_from(BufReader::new(stdout)) {
            Ok(announcement) => {
                tracing::info!(
                    "Helper {} announced {:?}",
                    child.id(),
                    announcement.directory()
                );
                Ok(SpawnedBinder {
                    child,
                    announcement,
                    reaped: false,
                })
            }
            Err(e) => {
                // A helper that already began exiting keeps its own exit code
                // even when the kill arrives.
                match reap(&mut child) {
                    Some(status) if status.code().is_some_and(|code| code != 0) => {
                        Err(BinderError::HelperFailed { status })
                    }
                    _ => Err(e),
                }
            }
        }
    }
}

/// A running helper that has completed its announcement
#[derive(Debug)]
pub struct SpawnedBinder {
    child:        Child,
    announcement: Announcement,
    reaped:       bool,
}

impl SpawnedBinder {
    /// Paths the helper announced
    pub fn announcement(&self) -> &Announcement {
        &self.announcement
    }

    /// Process ID of the helper
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Exit status if the helper has already exited
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        let status = self.child.try_wait().map_err(BinderError::Wait)?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Connects to `pass` and takes over the helper's `data` listener.
    pub fn receive_data_listener(&self) -> Result<UnixListener> {
        receive_listener(&self.announcement)
    }

    /// Waits for the helper to exit and checks that it succeeded.
    pub fn wait(mut self) -> Result<()> {
        let status = self.child.wait().map_err(BinderError::Wait)?;
        self.reaped = true;
        if status.success() {
            Ok(())
        } else {
            Err(BinderError::HelperFailed { status })
        }
    }
}

impl Drop for SpawnedBinder {
    fn drop(&mut self) {
        if !self.reaped {
            tracing::debug!("Killing helper {} that was never waited for", self.child.id());
            let _ = reap(&mut self.child);
        }
    }
}

fn reap(child: &mut Child) -> Option<ExitStatus> {
    let _ = child.kill();
    child.wait().ok()
}

/// Receives the `data` listener from the helper that made `announcement`.
///
/// Only the first caller succeeds; `pass` disappears once it is used.
pub fn receive_listener(announcement: &Announcement) -> Result<UnixListener> {
    let conn = connect_in_directory(announcement.directory(), PASS_SOCKET_NAME)?;
    let fd = recv_fd(&conn)?;
    tracing::debug!("Received data listener from {:?}", announcement.pass_socket());
    Ok(UnixListener::from(fd))
}

/// Connects to the socket `name` inside `directory`.
///
/// The address goes through an open handle to `directory`, so this works
/// even when the full socket path is too long for `sun_path`.
pub fn connect_in_directory(directory: &Path, name: &str) -> Result<UnixStream> {
    let dir = File::open(directory).map_err(|source| BinderError::OpenDirectory {
        path: directory.to_path_buf(),
        source,
    })?;
    let address = socket_address(dir.as_fd(), directory, name);
    UnixStream::connect(&address).map_err(|source| BinderError::Connect {
        path: directory.join(name),
        source,
    })
}
