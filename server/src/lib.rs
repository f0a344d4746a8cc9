//! Socket Binder Server Library
//!
//! One-shot helper that hands a listening Unix socket to another process
//! through the filesystem. A run goes through four steps, in this order:
//!
//! - [`private_dir`]: `mkdtemp` an owner-only directory under
//!   `XDG_RUNTIME_DIR`, `TMPDIR` or `/tmp`
//! - [`listener`]: listen on `data` and `pass` inside it, bound through the
//!   directory handle
//! - [`publisher`]: print the directory and both socket paths, then close
//!   stdout
//! - [`transfer`]: accept one connection on `pass`, unlink `pass`, send a
//!   duplicate of `data` as `SCM_RIGHTS` and exit
//!
//! [`BinderSession`] threads one run through these steps. All system calls
//! go through the [`Platform`] trait so the sequence can be tested without
//! sockets.
//!
//! # Example
//!
//! ```no_run
//! use binder_common::BinderConfig;
//! use binder_server::{BinderSession, HostPlatform};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = BinderConfig::from_env()?;
//! BinderSession::run(HostPlatform, &config)?;
//! # Ok(())
//! # }
//! ```

pub mod listener;
/// Peer credential lookup for accepted connections
pub mod peer_creds;
/// System call boundary
pub mod platform;
pub mod private_dir;
pub mod publisher;
mod session;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use listener::{listen_unix_socket, ListeningSocket};
pub use platform::{HostPlatform, Platform};
pub use private_dir::{create_private_directory, PrivateDirectory};
pub use session::BinderSession;
pub use transfer::{serve_once, TransferState};
