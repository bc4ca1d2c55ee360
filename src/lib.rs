//! # rcon-supervisor
//!
//! Async client for the Source-style RCON remote console protocol, plus a
//! supervisor that keeps one authenticated session per game server.
//!
//! ## Layers
//! - [`core`]: packet layout and the stream codec
//! - [`protocol`]: handshake verdicts and in-flight request tracking
//! - [`service`]: [`RconClient`] sessions and the [`ConnectionSupervisor`]
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging, metrics
//!
//! ```no_run
//! use rcon_supervisor::{ConnectionSupervisor, Endpoint, RconConfig};
//!
//! # async fn run() -> rcon_supervisor::Result<()> {
//! let supervisor = ConnectionSupervisor::new(RconConfig::default());
//! supervisor
//!     .connect("island", Endpoint::new("127.0.0.1", 27020), "secret")
//!     .await?;
//! let players = supervisor.send_command("island", "listplayers").await?;
//! println!("{players}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use crate::config::{ClientConfig, LoggingConfig, RconConfig, SupervisorConfig};
pub use crate::core::codec::RconCodec;
pub use crate::core::packet::{Packet, PacketType};
pub use crate::error::{ProtocolError, Result};
pub use crate::service::{
    BroadcastReport, CommandOutcome, ConnectionSupervisor, Endpoint, Outcome, RconClient,
    ServerCommandResult, ServerRecord, ServerStatus,
};
