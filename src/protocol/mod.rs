//! # Protocol Layer
//!
//! Session-level rules on top of the packet framing: the credential handshake
//! and request/response correlation.
//!
//! ## Components
//! - **Handshake**: AUTH packet construction and verdict interpretation
//! - **Pending**: typed registry of in-flight requests with per-request deadlines

pub mod handshake;
pub mod pending;
