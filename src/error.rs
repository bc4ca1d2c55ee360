//! # Error Types
//!
//! Error handling for the RCON client and the connection supervisor.
//!
//! This module defines every failure the core can report, from low-level socket
//! errors up to supervisor bookkeeping errors such as an unknown server id.
//!
//! ## Error Categories
//! - **Connect errors**: TCP connect timeout, refused connection, socket failures
//! - **Handshake errors**: rejected credential, handshake timeout
//! - **Request errors**: not ready to send, command timeout, connection closed mid-request
//! - **Supervisor errors**: unknown or not-connected server id, lost connection
//! - **Framing errors**: malformed or oversized packets
//!
//! Nothing here is fatal to the process: every variant travels upward as a value.
//!
//! ## Example Usage
//! ```rust
//! use rcon_supervisor::error::{ProtocolError, Result};
//!
//! fn require_ready(authenticated: bool) -> Result<()> {
//!     if !authenticated {
//!         return Err(ProtocolError::NotAuthenticated);
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_ready(false).unwrap_err().is_connection_fatal());
//! ```

use serde::Serialize;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_CONNECTION_LOST: &str = "Connection lost. Please reconnect to the server.";
    pub const ERR_CONNECT_TIMEOUT: &str = "Connection timeout";
    pub const ERR_IDLE_TIMEOUT: &str = "Connection timed out (no activity)";
    pub const ERR_NOT_READY: &str = "Not connected or not authenticated";

    /// Handshake errors
    pub const ERR_AUTH_FAILED: &str = "Authentication failed";
    pub const ERR_AUTH_TIMEOUT: &str = "Authentication timeout";

    /// Request errors
    pub const ERR_COMMAND_TIMEOUT: &str = "Command timeout";

    /// Supervisor messages
    pub const MSG_CONNECTED: &str = "Connected successfully";
    pub const MSG_DISCONNECTED: &str = "Disconnected successfully";
    pub const MSG_ALREADY_DISCONNECTED: &str = "Server was already disconnected";
    pub const MSG_COMMAND_EXECUTED: &str = "Command executed successfully";
    pub const MSG_NO_SERVERS: &str = "No servers are currently connected";
}

/// ProtocolError is the primary error type for all client and supervisor operations.
///
/// The type is `Clone` so that a single socket failure can be delivered to every
/// request still waiting on that socket.
#[derive(Error, Debug, Clone, Serialize)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing)]
    Io(Arc<io::Error>),

    #[error("Connection timeout")]
    ConnectTimeout,

    #[error("Connection refused")]
    ConnectRefused,

    #[error("Connection timed out (no activity)")]
    IdleTimeout,

    #[error("Socket error: {0}")]
    SocketError(String),

    #[error("Authentication failed")]
    AuthRejected,

    #[error("Authentication timeout")]
    AuthTimeout,

    #[error("Not connected or not authenticated")]
    NotAuthenticated,

    #[error("Command timeout")]
    CommandTimeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection lost. Please reconnect to the server.")]
    ConnectionLost,

    #[error("Server not connected: {0}")]
    NotConnected(String),

    #[error("Server not found: {0}")]
    UnknownServer(String),

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether this failure means the socket behind a client can no longer be used.
    ///
    /// The supervisor prunes its registry entry for these kinds; any other failure
    /// leaves the entry in place so the caller may retry.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::ConnectionClosed
                | ProtocolError::CommandTimeout
                | ProtocolError::NotAuthenticated
                | ProtocolError::ConnectionLost
                | ProtocolError::IdleTimeout
        )
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ProtocolError::ConnectRefused,
            io::ErrorKind::TimedOut => ProtocolError::ConnectTimeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ProtocolError::ConnectionClosed,
            _ => ProtocolError::Io(Arc::new(err)),
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
