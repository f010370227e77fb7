//! Result row decoding, text and binary variants.
//!
//! Text rows are one length-encoded string per column with 0xfb as the NULL
//! sentinel. Binary rows start with a 0x00 marker and a NULL bitmap whose
//! first two bits are reserved, so column `i` lives at bit `i + 2`.

use super::primitive::{DecodeError, decode_lenenc_str, lossy_text, take};
use super::{NULL_SENTINEL, TYPE_BLOB, TYPE_DOUBLE, TYPE_LONGLONG, TYPE_STRING, TYPE_TINY, TYPE_VAR_STRING};
use super::column::ColumnDefinition;

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    /// A value we could not decode, carrying the error saying why.
    Unknown(DecodeError),
}

/// One decoded row: `(column_name, value)` in column order. `complete` is
/// false when the decoder ran out of bytes or hit an unsupported type and
/// stopped early.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub values: Vec<(String, DecodedValue)>,
    pub complete: bool,
}

/// Decode a text-protocol row. Exhausting the buffer mid-row is a soft
/// failure: the partial row is returned with `complete = false`.
pub fn decode_text_row(payload: &[u8], columns: &[ColumnDefinition]) -> DecodedRow {
    let mut values = Vec::with_capacity(columns.len());
    let mut offset = 0;

    for col in columns {
        if offset >= payload.len() {
            return DecodedRow { values, complete: false };
        }
        if payload[offset] == NULL_SENTINEL {
            values.push((col.name.clone(), DecodedValue::Null));
            offset += 1;
            continue;
        }
        match decode_lenenc_str(payload, offset) {
            Ok((text, next)) => {
                values.push((col.name.clone(), DecodedValue::Text(lossy_text(text))));
                offset = next;
            }
            Err(_) => return DecodedRow { values, complete: false },
        }
    }

    DecodedRow { values, complete: true }
}

fn fixed8(payload: &[u8], offset: usize) -> Result<[u8; 8], DecodeError> {
    let bytes = take(payload, offset, 8)?;
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Decode a binary-protocol row. Truncation of a declared field is an error
/// (the packet is reported as a decode failure); an unsupported column type
/// stops the row with an `Unknown` marker and `complete = false`.
pub fn decode_binary_row(
    payload: &[u8],
    columns: &[ColumnDefinition],
) -> Result<DecodedRow, DecodeError> {
    let marker = take(payload, 0, 1)?[0];
    if marker != 0x00 {
        return Err(DecodeError::InvalidEncoding(marker));
    }

    // Two header bits are reserved ahead of the column bits.
    let bitmap_len = (columns.len() + 7 + 2) / 8;
    let bitmap = take(payload, 1, bitmap_len)?;
    let mut offset = 1 + bitmap_len;

    let mut values = Vec::with_capacity(columns.len());
    for (i, col) in columns.iter().enumerate() {
        let bit = i + 2;
        if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
            values.push((col.name.clone(), DecodedValue::Null));
            continue;
        }

        let value = match col.type_code {
            TYPE_LONGLONG => {
                let bytes = fixed8(payload, offset)?;
                offset += 8;
                DecodedValue::Integer(i64::from_le_bytes(bytes))
            }
            TYPE_DOUBLE => {
                let bytes = fixed8(payload, offset)?;
                offset += 8;
                DecodedValue::Float(f64::from_le_bytes(bytes))
            }
            TYPE_TINY => {
                let byte = take(payload, offset, 1)?[0];
                offset += 1;
                DecodedValue::Integer(i64::from(byte))
            }
            TYPE_VAR_STRING | TYPE_STRING | TYPE_BLOB => {
                let (text, next) = decode_lenenc_str(payload, offset)?;
                offset = next;
                DecodedValue::Text(lossy_text(text))
            }
            other => {
                // Deliberate simplification: stop at the first type we have
                // no binary decoder for, keeping what was decoded so far.
                let err = DecodeError::UnsupportedType(other);
                values.push((col.name.clone(), DecodedValue::Unknown(err)));
                return Ok(DecodedRow { values, complete: false });
            }
        };
        values.push((col.name.clone(), value));
    }

    Ok(DecodedRow { values, complete: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::column::decode_column_definition;
    use crate::protocol::column::column_def_payload;
    use crate::protocol::primitive::encode_lenenc_str;
    use bytes::{BufMut, BytesMut};

    fn columns(specs: &[(&str, u8)]) -> Vec<ColumnDefinition> {
        specs
            .iter()
            .map(|(name, code)| {
                decode_column_definition(&column_def_payload(name, *code, 0)).unwrap()
            })
            .collect()
    }

    #[test]
    fn text_row_with_values_and_null() {
        let cols = columns(&[("id", 3), ("name", 253), ("note", 253)]);
        let mut payload = BytesMut::new();
        encode_lenenc_str(&mut payload, b"42");
        payload.put_u8(NULL_SENTINEL);
        encode_lenenc_str(&mut payload, b"hello");

        let row = decode_text_row(&payload, &cols);
        assert!(row.complete);
        assert_eq!(
            row.values,
            vec![
                ("id".to_string(), DecodedValue::Text("42".to_string())),
                ("name".to_string(), DecodedValue::Null),
                ("note".to_string(), DecodedValue::Text("hello".to_string())),
            ]
        );
    }

    #[test]
    fn text_row_exhausted_buffer_returns_partial() {
        let cols = columns(&[("a", 253), ("b", 253)]);
        let mut payload = BytesMut::new();
        encode_lenenc_str(&mut payload, b"only");

        let row = decode_text_row(&payload, &cols);
        assert!(!row.complete);
        assert_eq!(row.values.len(), 1);
        assert_eq!(row.values[0].1, DecodedValue::Text("only".to_string()));
    }

    #[test]
    fn binary_row_typed_fields() {
        let cols = columns(&[("n", TYPE_LONGLONG), ("f", TYPE_DOUBLE), ("t", TYPE_TINY), ("s", TYPE_VAR_STRING)]);
        let mut payload = BytesMut::new();
        payload.put_u8(0x00);
        payload.put_u8(0x00); // bitmap, (4 + 9) / 8 = 1 byte
        payload.put_i64_le(-7);
        payload.put_f64_le(2.5);
        payload.put_u8(0xFF);
        encode_lenenc_str(&mut payload, b"str");

        let row = decode_binary_row(&payload, &cols).unwrap();
        assert!(row.complete);
        assert_eq!(row.values[0].1, DecodedValue::Integer(-7));
        assert_eq!(row.values[1].1, DecodedValue::Float(2.5));
        assert_eq!(row.values[2].1, DecodedValue::Integer(255));
        assert_eq!(row.values[3].1, DecodedValue::Text("str".to_string()));
    }

    #[test]
    fn binary_row_null_bit_consumes_no_value_bytes() {
        // Column 0 NULL regardless of type; column 1 decodes right after the
        // bitmap.
        let cols = columns(&[("a", TYPE_LONGLONG), ("b", TYPE_TINY)]);
        let mut payload = BytesMut::new();
        payload.put_u8(0x00);
        payload.put_u8(1 << 2); // bit (0 + 2) set
        payload.put_u8(0x2A);

        let row = decode_binary_row(&payload, &cols).unwrap();
        assert!(row.complete);
        assert_eq!(row.values[0].1, DecodedValue::Null);
        assert_eq!(row.values[1].1, DecodedValue::Integer(42));
    }

    #[test]
    fn binary_row_null_bit_crossing_a_byte_boundary() {
        // 7 columns: column 6 sits at bit 8, byte 1 of a 2-byte bitmap.
        let specs: Vec<(String, u8)> = (0..7).map(|i| (format!("c{i}"), TYPE_TINY)).collect();
        let cols: Vec<ColumnDefinition> = specs
            .iter()
            .map(|(name, code)| {
                decode_column_definition(&column_def_payload(name, *code, 0)).unwrap()
            })
            .collect();

        let mut payload = BytesMut::new();
        payload.put_u8(0x00);
        payload.put_u8(0x00);
        payload.put_u8(0x01); // bit 8 -> column 6
        for v in 0..6u8 {
            payload.put_u8(v);
        }

        let row = decode_binary_row(&payload, &cols).unwrap();
        assert!(row.complete);
        assert_eq!(row.values[6].1, DecodedValue::Null);
        assert_eq!(row.values[5].1, DecodedValue::Integer(5));
    }

    #[test]
    fn binary_row_unsupported_type_stops_decoding() {
        let cols = columns(&[("a", TYPE_TINY), ("b", 10), ("c", TYPE_TINY)]);
        let mut payload = BytesMut::new();
        payload.put_u8(0x00);
        payload.put_u8(0x00);
        payload.put_u8(0x07);
        payload.put_slice(&[0x04, 0x03, 0x02, 0x01]); // DATE bytes, undecoded

        let row = decode_binary_row(&payload, &cols).unwrap();
        assert!(!row.complete);
        assert_eq!(row.values.len(), 2);
        assert_eq!(
            row.values[1].1,
            DecodedValue::Unknown(DecodeError::UnsupportedType(10))
        );
    }

    #[test]
    fn binary_row_requires_marker() {
        let cols = columns(&[("a", TYPE_TINY)]);
        let err = decode_binary_row(&[0x01, 0x00, 0x05], &cols).unwrap_err();
        assert_eq!(err, DecodeError::InvalidEncoding(0x01));
    }

    #[test]
    fn binary_row_truncated_field_is_an_error() {
        let cols = columns(&[("n", TYPE_LONGLONG)]);
        let payload = [0x00, 0x00, 0x01, 0x02]; // only 2 of 8 value bytes
        assert!(matches!(
            decode_binary_row(&payload, &cols),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
