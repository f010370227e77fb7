//! Length-encoded primitives.
//!
//! Integers and strings are decoded from `(buffer, offset)` pairs and the new
//! offset is returned only on success, so a failed decode never advances the
//! caller's position.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Local decode failures. None of these are fatal to a relay session; the
/// packet that produced them is still forwarded byte-for-byte.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("byte 0x{0:02x} is not a valid length encoding")]
    InvalidEncoding(u8),
    #[error("column definition marker is 0x{0:02x}, expected 0x0c")]
    MalformedColumnDefinition(u8),
    #[error("no binary decoder for column type {0}")]
    UnsupportedType(u8),
}

/// Borrow `n` bytes starting at `offset`, or report how short the buffer is.
pub(crate) fn take(buf: &[u8], offset: usize, n: usize) -> Result<&[u8], DecodeError> {
    // checked_add: a hostile length prefix can put offset + n past usize::MAX.
    offset
        .checked_add(n)
        .and_then(|end| buf.get(offset..end))
        .ok_or(DecodeError::Truncated {
            offset,
            needed: n,
            available: buf.len().saturating_sub(offset),
        })
}

fn int_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (8 * i)))
}

/// Decode a length-encoded integer at `offset`, returning the value and the
/// offset just past it. `0xfb` and `0xff` are sentinels (NULL and error
/// marker) and never valid where an integer is expected.
pub fn decode_lenenc_int(buf: &[u8], offset: usize) -> Result<(u64, usize), DecodeError> {
    let first = take(buf, offset, 1)?[0];

    match first {
        0x00..=0xFA => Ok((u64::from(first), offset + 1)),
        0xFC => Ok((int_le(take(buf, offset + 1, 2)?), offset + 3)),
        0xFD => Ok((int_le(take(buf, offset + 1, 3)?), offset + 4)),
        0xFE => Ok((int_le(take(buf, offset + 1, 8)?), offset + 9)),
        _ => Err(DecodeError::InvalidEncoding(first)),
    }
}

/// Decode a length-encoded string at `offset`: a lenenc integer byte-length
/// followed by that many raw bytes.
pub fn decode_lenenc_str(buf: &[u8], offset: usize) -> Result<(&[u8], usize), DecodeError> {
    let (len, data_offset) = decode_lenenc_int(buf, offset)?;
    let len = len as usize;
    let data = take(buf, data_offset, len)?;
    Ok((data, data_offset + len))
}

/// Lossy UTF-8 conversion; invalid sequences are replaced, never fatal.
pub fn lossy_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn encode_lenenc_int(dst: &mut BytesMut, val: u64) {
    if val < 251 {
        dst.put_u8(val as u8);
    } else if val < 65536 {
        dst.put_u8(0xFC);
        dst.put_u16_le(val as u16);
    } else if val < 16_777_216 {
        dst.put_u8(0xFD);
        dst.put_u8((val & 0xFF) as u8);
        dst.put_u8(((val >> 8) & 0xFF) as u8);
        dst.put_u8(((val >> 16) & 0xFF) as u8);
    } else {
        dst.put_u8(0xFE);
        dst.put_u64_le(val);
    }
}

pub fn encode_lenenc_str(dst: &mut BytesMut, s: &[u8]) {
    encode_lenenc_int(dst, s.len() as u64);
    dst.put_slice(s);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenenc_int_widths() {
        // 1-byte form
        let (val, next) = decode_lenenc_int(&[0x0A], 0).unwrap();
        assert_eq!((val, next), (10, 1));

        // 3-byte form
        let (val, next) = decode_lenenc_int(&[0xFC, 0x01, 0x02], 0).unwrap();
        assert_eq!((val, next), (0x0201, 3));

        // 4-byte form, zero-extended
        let (val, next) = decode_lenenc_int(&[0xFD, 0x01, 0x02, 0x03], 0).unwrap();
        assert_eq!((val, next), (0x030201, 4));

        // 9-byte form
        let mut buf = vec![0xFE];
        buf.extend_from_slice(&0x1122334455667788u64.to_le_bytes());
        let (val, next) = decode_lenenc_int(&buf, 0).unwrap();
        assert_eq!((val, next), (0x1122334455667788, 9));
    }

    #[test]
    fn lenenc_int_roundtrip_width_boundaries() {
        for (val, width) in [
            (0u64, 1),
            (250, 1),
            (251, 3),
            (65_535, 3),
            (65_536, 4),
            (16_777_215, 4),
            (16_777_216, 9),
            (u64::MAX, 9),
        ] {
            let mut buf = BytesMut::new();
            encode_lenenc_int(&mut buf, val);
            assert_eq!(buf.len(), width, "width for {val}");
            let (decoded, consumed) = decode_lenenc_int(&buf, 0).unwrap();
            assert_eq!(decoded, val);
            assert_eq!(consumed, width);
        }
    }

    #[test]
    fn lenenc_int_rejects_sentinels() {
        assert_eq!(
            decode_lenenc_int(&[0xFB], 0),
            Err(DecodeError::InvalidEncoding(0xFB))
        );
        assert_eq!(
            decode_lenenc_int(&[0xFF], 0),
            Err(DecodeError::InvalidEncoding(0xFF))
        );
    }

    #[test]
    fn lenenc_int_truncated() {
        assert!(matches!(
            decode_lenenc_int(&[0xFC, 0x01], 0),
            Err(DecodeError::Truncated { offset: 1, needed: 2, available: 1 })
        ));
        assert!(matches!(
            decode_lenenc_int(&[], 0),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn lenenc_str_roundtrip() {
        let mut buf = BytesMut::new();
        encode_lenenc_str(&mut buf, b"hello");
        let (s, next) = decode_lenenc_str(&buf, 0).unwrap();
        assert_eq!(s, b"hello");
        assert_eq!(next, 6);
    }

    #[test]
    fn lenenc_str_truncated_by_one_byte() {
        let mut buf = BytesMut::new();
        encode_lenenc_str(&mut buf, b"hello");
        let short = &buf[..buf.len() - 1];
        let err = decode_lenenc_str(short, 0).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { needed: 5, available: 4, .. }));
    }

    #[test]
    fn lenenc_str_with_absurd_declared_length() {
        // 0xFE prefix declaring u64::MAX bytes. The length arithmetic must not
        // overflow; the decode fails with Truncated like any short buffer.
        let mut buf = vec![0xFE];
        buf.extend_from_slice(&u64::MAX.to_le_bytes());
        let err = decode_lenenc_str(&buf, 0).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated { offset: 9, needed: usize::MAX, available: 0 }
        ));
    }

    #[test]
    fn lenenc_str_at_offset() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0xAA, 0xBB]);
        encode_lenenc_str(&mut buf, b"x");
        let (s, next) = decode_lenenc_str(&buf, 2).unwrap();
        assert_eq!(s, b"x");
        assert_eq!(next, 4);
    }

    #[test]
    fn lossy_text_replaces_invalid_sequences() {
        assert_eq!(lossy_text(b"ok"), "ok");
        assert_eq!(lossy_text(&[0x66, 0xFF, 0x6F]), "f\u{FFFD}o");
    }
}
