//! Credential handshake.
//!
//! The client opens every connection with a single AUTH packet carrying the
//! credential. The server answers with an AUTH_RESPONSE echoing the request id
//! on success, or carrying the sentinel id `-1` when the credential is wrong.
//! Some servers send an empty RESPONSE_VALUE for the same id just before the
//! AUTH_RESPONSE; that packet carries no verdict and is ignored here.

use crate::core::packet::{Packet, PacketType, AUTH_FAILED_ID};

/// Verdict carried by an AUTH_RESPONSE packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    Rejected,
}

/// Build the AUTH packet that opens a session
pub fn auth_packet(request_id: i32, credential: &str) -> Packet {
    Packet::new(request_id, PacketType::Auth, credential)
}

/// Read the handshake verdict from a received packet.
///
/// Returns `None` for anything that is not an AUTH_RESPONSE.
pub fn auth_outcome(packet: &Packet) -> Option<AuthOutcome> {
    if packet.response_type() != Some(PacketType::AuthResponse) {
        return None;
    }
    if packet.request_id() == AUTH_FAILED_ID {
        Some(AuthOutcome::Rejected)
    } else {
        Some(AuthOutcome::Accepted)
    }
}
