//! RCON packet model and wire conversion.
//!
//! ```text
//! [Size(4, LE u32)] [RequestId(4, LE i32)] [Type(4, LE u32)] [Payload(N)] [0x00 0x00]
//! ```
//!
//! `Size` counts everything after itself, so `Size = 10 + N`.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{ProtocolError, Result};

/// Length of the size prefix
pub const SIZE_FIELD_LEN: usize = 4;

/// Bytes counted by the size field besides the payload: request id, type, terminator
pub const MIN_PACKET_SIZE: usize = 10;

/// Full header length before the payload: size + request id + type
pub const HEADER_LEN: usize = 12;

/// Request id the server uses to signal a rejected credential
pub const AUTH_FAILED_ID: i32 = -1;

/// Packet type codes.
///
/// Request and response codes overlap on the wire: `2` is both an exec request
/// and an auth response. Incoming packets are therefore interpreted against the
/// kind of the pending request they answer, never by type code alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// SERVERDATA_AUTH (client to server)
    Auth,
    /// SERVERDATA_EXECCOMMAND (client to server)
    ExecCommand,
    /// SERVERDATA_AUTH_RESPONSE (server to client)
    AuthResponse,
    /// SERVERDATA_RESPONSE_VALUE (server to client)
    ResponseValue,
}

impl PacketType {
    /// Wire code for this packet type
    pub const fn code(self) -> u32 {
        match self {
            PacketType::Auth => 3,
            PacketType::ExecCommand | PacketType::AuthResponse => 2,
            PacketType::ResponseValue => 0,
        }
    }

    /// Interpret a type code on a packet received from the server
    pub fn from_response_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(PacketType::AuthResponse),
            0 => Some(PacketType::ResponseValue),
            _ => None,
        }
    }
}

/// A single decoded or outgoing RCON packet. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    request_id: i32,
    kind: u32,
    payload: String,
}

impl Packet {
    /// Build an outgoing packet of the given type
    pub fn new(request_id: i32, kind: PacketType, payload: impl Into<String>) -> Self {
        Self {
            request_id,
            kind: kind.code(),
            payload: payload.into(),
        }
    }

    pub fn request_id(&self) -> i32 {
        self.request_id
    }

    /// Raw type code as read from or written to the wire
    pub fn kind(&self) -> u32 {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Consume the packet, keeping only its payload text
    pub fn into_payload(self) -> String {
        self.payload
    }

    /// Value of the size field for this packet
    pub fn wire_size(&self) -> usize {
        MIN_PACKET_SIZE + self.payload.len()
    }

    /// Whether the type code is one the server sends in reply
    pub fn response_type(&self) -> Option<PacketType> {
        PacketType::from_response_code(self.kind)
    }

    /// Write the full packet, including size prefix and terminator, into `dst`
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(SIZE_FIELD_LEN + self.wire_size());
        dst.put_u32_le(self.wire_size() as u32);
        dst.put_i32_le(self.request_id);
        dst.put_u32_le(self.kind);
        dst.put_slice(self.payload.as_bytes());
        dst.put_u8(0);
        dst.put_u8(0);
    }

    /// Serialize the packet to a fresh buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(SIZE_FIELD_LEN + self.wire_size());
        self.write_to(&mut buf);
        buf.to_vec()
    }

    /// Parse exactly one complete packet from `buf`.
    ///
    /// Trailing bytes beyond the declared size are an error; use the codec to
    /// slice packets out of a stream.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < SIZE_FIELD_LEN {
            return Err(ProtocolError::InvalidPacket("truncated size field".into()));
        }

        let size = (&buf[..SIZE_FIELD_LEN]).get_u32_le() as usize;
        if size < MIN_PACKET_SIZE {
            return Err(ProtocolError::InvalidPacket(format!(
                "declared size {size} below minimum {MIN_PACKET_SIZE}"
            )));
        }
        if buf.len() != SIZE_FIELD_LEN + size {
            return Err(ProtocolError::InvalidPacket(format!(
                "declared size {size} does not match {} body bytes",
                buf.len() - SIZE_FIELD_LEN
            )));
        }

        Ok(Self::from_body(&buf[SIZE_FIELD_LEN..]))
    }

    /// Parse a packet body: everything after the size prefix.
    ///
    /// Callers guarantee `body.len() >= MIN_PACKET_SIZE`.
    pub(crate) fn from_body(mut body: &[u8]) -> Self {
        let payload_len = body.len() - MIN_PACKET_SIZE;
        let request_id = body.get_i32_le();
        let kind = body.get_u32_le();
        let payload = String::from_utf8_lossy(&body[..payload_len]).into_owned();

        Self {
            request_id,
            kind,
            payload,
        }
    }
}
