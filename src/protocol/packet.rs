//! Packet framing.
//!
//! A MySQL packet is a 3-byte little-endian payload length, a 1-byte sequence
//! id, then the payload. The codec keeps the raw header+payload around so the
//! relay can forward exactly the bytes that arrived.

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Decoder;

pub const HEADER_LEN: usize = 4;

/// One framed packet. `raw` is the 4-byte header plus payload exactly as it
/// appeared on the wire; `payload` borrows the same allocation.
#[derive(Debug, Clone)]
pub struct Packet {
    pub sequence_id: u8,
    pub payload: Bytes,
    pub raw: Bytes,
}

/// Frames packets out of a byte stream. Partial data yields no packet; a
/// stream that ends mid-header or mid-payload yields no packet either, so a
/// truncated tail is never forwarded.
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::io::Result<Option<Packet>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let payload_len =
            (src[0] as usize) | ((src[1] as usize) << 8) | ((src[2] as usize) << 16);
        let total_len = HEADER_LEN + payload_len;
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        let raw = src.split_to(total_len).freeze();
        Ok(Some(Packet {
            sequence_id: raw[3],
            payload: raw.slice(HEADER_LEN..),
            raw,
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> std::io::Result<Option<Packet>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None => {
                // Stream closed mid-packet: discard the partial bytes and
                // report end of stream.
                if !src.is_empty() {
                    tracing::warn!(bytes = src.len(), "stream ended mid-packet");
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

/// Write a header+payload packet, used to build test traffic.
pub fn encode_packet(dst: &mut BytesMut, sequence_id: u8, payload: &[u8]) {
    dst.put_u8((payload.len() & 0xFF) as u8);
    dst.put_u8(((payload.len() >> 8) & 0xFF) as u8);
    dst.put_u8(((payload.len() >> 16) & 0xFF) as u8);
    dst.put_u8(sequence_id);
    dst.put_slice(payload);
}
