use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::core::packet::{Packet, MIN_PACKET_SIZE, SIZE_FIELD_LEN};
use crate::error::{ProtocolError, Result};

/// Length-prefixed RCON framing for tokio byte streams.
///
/// Decoding is a pure function of the buffered bytes: a partial packet leaves
/// the buffer untouched and yields `None` until more bytes arrive.
#[derive(Debug, Clone, Copy)]
pub struct RconCodec {
    max_payload_size: usize,
}

impl RconCodec {
    pub fn new(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for RconCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_SIZE)
    }
}

impl Decoder for RconCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < SIZE_FIELD_LEN {
            return Ok(None);
        }

        let size = (&src[..SIZE_FIELD_LEN]).get_u32_le() as usize;
        if size < MIN_PACKET_SIZE {
            return Err(ProtocolError::InvalidPacket(format!(
                "declared size {size} below minimum {MIN_PACKET_SIZE}"
            )));
        }
        if size - MIN_PACKET_SIZE > self.max_payload_size {
            return Err(ProtocolError::OversizedPacket(size));
        }

        let frame_len = SIZE_FIELD_LEN + size;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(frame_len);
        frame.advance(SIZE_FIELD_LEN);
        Ok(Some(Packet::from_body(&frame)))
    }
}

impl Encoder<Packet> for RconCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        item.write_to(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::PacketType;

    fn encoded(packets: &[Packet]) -> BytesMut {
        let mut buf = BytesMut::new();
        let mut codec = RconCodec::default();
        for p in packets {
            codec.encode(p.clone(), &mut buf).unwrap();
        }
        buf
    }

    #[test]
    fn decodes_back_to_back_packets() {
        let first = Packet::new(1, PacketType::ResponseValue, "a");
        let second = Packet::new(2, PacketType::ResponseValue, "bb");
        let mut buf = encoded(&[first.clone(), second.clone()]);

        let mut codec = RconCodec::default();
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(first));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(second));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn header_then_payload_arrival() {
        let packet = Packet::new(9, PacketType::ResponseValue, "players: 3");
        let full = encoded(std::slice::from_ref(&packet));

        let mut codec = RconCodec::default();
        let mut buf = BytesMut::from(&full[..HEADER_SPLIT]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), HEADER_SPLIT);

        buf.extend_from_slice(&full[HEADER_SPLIT..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(packet));
    }

    const HEADER_SPLIT: usize = 12;

    #[test]
    fn oversized_declared_size_is_rejected() {
        let mut codec = RconCodec::new(16);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&(10u32 + 17).to_le_bytes());

        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::OversizedPacket(27))
        ));
    }

    #[test]
    fn size_below_minimum_is_rejected() {
        let mut codec = RconCodec::default();
        let mut buf = BytesMut::from(&3u32.to_le_bytes()[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidPacket(_))
        ));
    }
}
