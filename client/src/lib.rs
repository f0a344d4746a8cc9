//! Socket Binder Client Library
//!
//! The consumer side of the handshake: start the `socket-binder` helper,
//! read what it announces and take over its `data` listener.
//!
//! # Example
//!
//! ```no_run
//! use binder_client::{ClientConfig, SocketBinderClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SocketBinderClient::new(ClientConfig::new().with_program("socket-binder"));
//! let binder = client.spawn()?;
//! println!("data socket: {}", binder.announcement().data_socket().display());
//!
//! let listener = binder.receive_data_listener()?;
//! binder.wait()?;
//!
//! for stream in listener.incoming() {
//!     let _stream = stream?;
//! }
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::*;
// Re-export important types from binder-common for convenience
pub use binder_common::{Announcement, BinderError, Result};
