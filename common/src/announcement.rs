use std::{
    ffi::OsString,
    io::{BufRead, Write},
    os::unix::ffi::{OsStrExt, OsStringExt},
    path::{Path, PathBuf},
};

use crate::{
    config::{DATA_SOCKET_NAME, DONE_TOKEN, PASS_SOCKET_NAME},
    error::{BinderError, Result},
};

/// The paths the helper publishes on stdout.
///
/// On the wire this is four newline-terminated lines followed by EOF:
/// the private directory, `<dir>/data`, `<dir>/pass` and `done`. Paths are
/// written as raw bytes, so a directory containing a newline cannot be
/// announced and is rejected up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    directory:   PathBuf,
    data_socket: PathBuf,
    pass_socket: PathBuf,
}

impl Announcement {
    /// Builds the announcement for a private directory.
    pub fn new<P: Into<PathBuf>>(directory: P) -> Result<Self> {
        let directory = directory.into();
        if directory.as_os_str().as_bytes().contains(&b'\n') {
            return Err(BinderError::UnannounceablePath { path: directory });
        }
        Ok(Self {
            data_socket: directory.join(DATA_SOCKET_NAME),
            pass_socket: directory.join(PASS_SOCKET_NAME),
            directory,
        })
    }

    /// Private directory holding both sockets
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Socket whose descriptor is handed over
    pub fn data_socket(&self) -> &Path {
        &self.data_socket
    }

    /// Single-use socket that performs the hand-over
    pub fn pass_socket(&self) -> &Path {
        &self.pass_socket
    }

    /// Writes the four announcement lines and flushes `out`.
    pub fn write_to<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for path in [&self.directory, &self.data_socket, &self.pass_socket] {
            out.write_all(path.as_os_str().as_bytes())?;
            out.write_all(b"\n")?;
        }
        writeln!(out, "{DONE_TOKEN}")?;
        out.flush()
    }

    /// Parses an announcement and checks that the stream ends after `done`.
    ///
    /// Blocks until the writer closes its end, which the helper does right
    /// after printing.
    pub fn read_from<R: BufRead>(mut input: R) -> Result<Self> {
        let directory = PathBuf::from(read_line(&mut input, 1)?);
        if !directory.is_absolute() {
            return Err(BinderError::malformed(1, "directory is not an absolute path"));
        }
        let expected = Self::new(directory)?;

        let data_socket = PathBuf::from(read_line(&mut input, 2)?);
        if data_socket != expected.data_socket {
            return Err(BinderError::malformed(
                2,
                format!("expected {}", expected.data_socket.display()),
            ));
        }

        let pass_socket = PathBuf::from(read_line(&mut input, 3)?);
        if pass_socket != expected.pass_socket {
            return Err(BinderError::malformed(
                3,
                format!("expected {}", expected.pass_socket.display()),
            ));
        }

        let done = read_line(&mut input, 4)?;
        if done.as_bytes() != DONE_TOKEN.as_bytes() {
            return Err(BinderError::malformed(4, format!("expected `{DONE_TOKEN}`")));
        }

        let mut trailing = [0u8; 1];
        match input.read(&mut trailing) {
            Ok(0) => Ok(expected),
            Ok(_) => Err(BinderError::malformed(5, "unexpected data after announcement")),
            Err(e) => Err(BinderError::ReadAnnouncement(e)),
        }
    }
}

fn read_line<R: BufRead>(input: &mut R, line: usize) -> Result<OsString> {
    let mut buf = Vec::new();
    let read = input
        .read_until(b'\n', &mut buf)
        .map_err(BinderError::ReadAnnouncement)?;
    if read == 0 {
        return Err(BinderError::malformed(line, "unexpected end of announcement"));
    }
    if buf.pop() != Some(b'\n') {
        return Err(BinderError::malformed(line, "line is not newline-terminated"));
    }
    if buf.is_empty() {
        return Err(BinderError::malformed(line, "empty line"));
    }
    Ok(OsString::from_vec(buf))
}
