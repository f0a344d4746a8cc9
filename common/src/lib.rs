//! Socket Binder Common Library
//!
//! This crate provides the pieces shared by the `socket-binder` helper and the
//! processes that consume it:
//!
//! - Fixed names, the listen backlog and base-directory resolution
//! - The four-line announcement the helper prints on stdout
//! - Descriptor passing over Unix domain sockets (`SCM_RIGHTS`)
//! - The error type used across the workspace
//!
//! # Handshake
//!
//! The helper creates an owner-only directory, listens on `data` and `pass`
//! inside it and prints:
//!
//! ```text
//! /run/user/1000/AbC123
//! /run/user/1000/AbC123/data
//! /run/user/1000/AbC123/pass
//! done
//! ```
//!
//! The first process to connect to `pass` receives a duplicate of the `data`
//! listener as ancillary data, after which `pass` is gone.

/// Socket addresses relative to an open directory
pub mod address;

/// Announcement written by the helper and parsed by consumers
pub mod announcement;

/// Names, constants and base-directory configuration
pub mod config;

/// Error type shared by the helper and its consumers
pub mod error;

/// Sending and receiving a descriptor as `SCM_RIGHTS` ancillary data
pub mod fdpass;

// Re-export commonly used types for convenience
pub use address::socket_address;
pub use announcement::Announcement;
pub use config::{BaseDirSource, BinderConfig, DATA_SOCKET_NAME, PASS_SOCKET_NAME};
pub use error::{BinderError, Result};
pub use fdpass::{recv_fd, send_fd};
