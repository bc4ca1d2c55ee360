#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for packet framing and error reporting
//! Boundary sizes, malformed headers, lossy payloads and the auth sentinel

use bytes::BytesMut;
use rcon_supervisor::core::codec::RconCodec;
use rcon_supervisor::core::packet::{Packet, PacketType, AUTH_FAILED_ID, HEADER_LEN};
use rcon_supervisor::error::ProtocolError;
use rcon_supervisor::protocol::handshake::{auth_outcome, AuthOutcome};
use tokio_util::codec::Decoder;

// ============================================================================
// PACKET EDGE CASES
// ============================================================================

#[test]
fn test_packet_empty_payload() {
    let packet = Packet::new(7, PacketType::ResponseValue, "");
    let bytes = packet.to_bytes();
    assert_eq!(bytes.len(), HEADER_LEN + 2);
    assert_eq!(&bytes[..4], &10u32.to_le_bytes());

    let decoded = Packet::from_bytes(&bytes).expect("Should decode empty payload");
    assert_eq!(decoded, packet);
}

#[test]
fn test_packet_truncated_header() {
    let result = Packet::from_bytes(&[0x0A, 0x00]);
    assert!(matches!(result, Err(ProtocolError::InvalidPacket(_))));
}

#[test]
fn test_packet_empty_buffer() {
    let result = Packet::from_bytes(&[]);
    assert!(matches!(result, Err(ProtocolError::InvalidPacket(_))));
}

#[test]
fn test_packet_trailing_bytes_rejected() {
    let mut bytes = Packet::new(1, PacketType::ResponseValue, "ok").to_bytes();
    bytes.push(0xFF);
    assert!(matches!(
        Packet::from_bytes(&bytes),
        Err(ProtocolError::InvalidPacket(_))
    ));
}

#[test]
fn test_sentinel_id_decodes_as_negative_one() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&10u32.to_le_bytes());
    bytes.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    bytes.extend_from_slice(&PacketType::AuthResponse.code().to_le_bytes());
    bytes.extend_from_slice(&[0, 0]);

    let packet = Packet::from_bytes(&bytes).unwrap();
    assert_eq!(packet.request_id(), AUTH_FAILED_ID);
    assert_eq!(auth_outcome(&packet), Some(AuthOutcome::Rejected));
}

#[test]
fn test_invalid_utf8_payload_is_lossy() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&12u32.to_le_bytes());
    bytes.extend_from_slice(&3i32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&[0xC3, 0x28]);
    bytes.extend_from_slice(&[0, 0]);

    let packet = Packet::from_bytes(&bytes).unwrap();
    assert_eq!(packet.request_id(), 3);
    assert!(packet.payload().contains('\u{FFFD}'));
}

#[test]
fn test_unicode_payload_roundtrip() {
    let packet = Packet::new(4, PacketType::ExecCommand, "broadcast Привет 🦀");
    let decoded = Packet::from_bytes(&packet.to_bytes()).unwrap();
    assert_eq!(decoded.payload(), "broadcast Привет 🦀");
}

// ============================================================================
// CODEC LIMITS
// ============================================================================

fn frame_with_payload(len: usize) -> BytesMut {
    let payload = "x".repeat(len);
    BytesMut::from(&Packet::new(1, PacketType::ResponseValue, payload).to_bytes()[..])
}

#[test]
fn test_payload_exactly_max() {
    let mut codec = RconCodec::new(1024);
    let mut buf = frame_with_payload(1024);
    let packet = codec.decode(&mut buf).unwrap().expect("complete frame");
    assert_eq!(packet.payload().len(), 1024);
}

#[test]
fn test_payload_one_more_than_max_fails() {
    let mut codec = RconCodec::new(1024);
    let mut buf = frame_with_payload(1025);
    assert!(matches!(
        codec.decode(&mut buf),
        Err(ProtocolError::OversizedPacket(1035))
    ));
}

#[test]
fn test_partial_header_waits_for_more() {
    let mut codec = RconCodec::default();
    let mut buf = BytesMut::from(&[0x0E, 0x00][..]);
    assert!(codec.decode(&mut buf).unwrap().is_none());
    assert_eq!(buf.len(), 2);
}

// ============================================================================
// ERROR REPORTING
// ============================================================================

#[test]
fn test_error_display_formatting() {
    assert_eq!(ProtocolError::AuthRejected.to_string(), "Authentication failed");
    assert_eq!(ProtocolError::CommandTimeout.to_string(), "Command timeout");
    assert_eq!(
        ProtocolError::ConnectionLost.to_string(),
        "Connection lost. Please reconnect to the server."
    );
    assert_eq!(
        ProtocolError::UnknownServer("42".into()).to_string(),
        "Server not found: 42"
    );
    assert_eq!(
        ProtocolError::OversizedPacket(2048).to_string(),
        "Packet too large: 2048 bytes"
    );
}

#[test]
fn test_errors_clone_for_fan_out() {
    let err: ProtocolError = std::io::Error::other("disk on fire").into();
    let copy = err.clone();
    assert_eq!(err.to_string(), copy.to_string());
    assert!(!copy.is_connection_fatal());
}
