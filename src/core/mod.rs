//! # Core Protocol Components
//!
//! Low-level packet handling and stream framing.
//!
//! ## Components
//! - **Packet**: RCON packet with request id, type code and text payload
//! - **Codec**: Tokio codec that slices packets out of a byte stream
//!
//! ## Wire Format
//! ```text
//! [Size(4)] [RequestId(4)] [Type(4)] [Payload(N)] [0x00 0x00]
//! ```
//! All integers are little-endian; `Size = 10 + N`.
//!
//! ## Safety limits
//! - Declared sizes are validated before any buffer is reserved
//! - Inbound payloads are capped by the configured maximum

pub mod codec;
pub mod packet;
