//! # Service Layer
//!
//! Session handles and their supervision.
//!
//! ## Components
//! - **Client**: one authenticated RCON session driven by its own task
//! - **Supervisor**: one client per server id, liveness sweep, status events
//! - **Server**: endpoint, catalog record and status types
//! - **Outcome**: serializable results for the administration layer

pub mod client;
pub mod outcome;
pub mod server;
pub mod supervisor;

pub use client::RconClient;
pub use outcome::{BroadcastReport, CommandOutcome, Outcome, ServerCommandResult};
pub use server::{Endpoint, ServerRecord, ServerStatus};
pub use supervisor::ConnectionSupervisor;
