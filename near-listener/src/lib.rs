//! # near-listener
//!
//! Listener/Server for nearlink.
//!
//! The server binds the well-known service on the local radio, accepts
//! connections in a loop and hands each one to its own task. Every inbound
//! connection carries one raw message; each non-empty read is surfaced as a
//! [`MessageReceived`](nearlink_types::MessageReceived) event.
//!
//! ## Architecture
//!
//! ```text
//! Server::start ─► cancel discovery ─► bind ─► accept loop
//!                                                 │
//!                               ┌─────────────────┼─────────────────┐
//!                               ▼                 ▼                 ▼
//!                          connection         connection        connection
//!                          (one read)         (one read)        (one read)
//!                               └────────► ServerHandle::messages ◄─┘
//! ```
//!
//! Lifecycle transitions come from the pure
//! [`ListenerState`](nearlink_core::ListenerState) machine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod error;
pub mod server;

pub use config::{
    ListenerConfig, DEFAULT_ACCEPT_ERROR_PAUSE, DEFAULT_ACCEPT_WAIT, DEFAULT_READ_BUFFER,
};
pub use connection::{handle_connection, ConnectionOutcome};
pub use error::{ListenerError, Result};
pub use server::{Server, ServerHandle, ServerMetrics};
