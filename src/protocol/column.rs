//! Column definition decoding.
//!
//! A ColumnDefinition41 packet carries six length-encoded strings (catalog,
//! schema, table, org_table, name, org_name), a fixed 0x0c marker, then the
//! fixed-width metadata fields. Only `name` is kept; the rest must still be
//! consumed to keep the offset honest.

use super::COLUMN_DEF_MARKER;
use super::primitive::{DecodeError, decode_lenenc_str, lossy_text, take};

// Column flag bits, reported in this order.
pub const NOT_NULL_FLAG: u16 = 0x0001;
pub const PRI_KEY_FLAG: u16 = 0x0002;
pub const UNSIGNED_FLAG: u16 = 0x0020;
pub const BINARY_FLAG: u16 = 0x0080;
pub const AUTO_INCREMENT_FLAG: u16 = 0x0200;
pub const NUM_FLAG: u16 = 0x8000;

const FLAG_NAMES: [(u16, &str); 6] = [
    (NOT_NULL_FLAG, "NOT_NULL"),
    (PRI_KEY_FLAG, "PRI_KEY"),
    (UNSIGNED_FLAG, "UNSIGNED"),
    (BINARY_FLAG, "BINARY"),
    (AUTO_INCREMENT_FLAG, "AUTO_INCREMENT"),
    (NUM_FLAG, "NUM"),
];

#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub name: String,
    pub type_code: u8,
    pub type_name: String,
    pub charset: u16,
    pub length: u32,
    pub flags: u16,
    pub flag_names: Vec<&'static str>,
    pub decimals: u8,
}

pub fn type_name(code: u8) -> String {
    let name = match code {
        0 => "DECIMAL",
        1 => "TINY",
        2 => "SHORT",
        3 => "LONG",
        4 => "FLOAT",
        5 => "DOUBLE",
        6 => "NULL",
        7 => "TIMESTAMP",
        8 => "LONGLONG",
        9 => "INT24",
        10 => "DATE",
        11 => "TIME",
        12 => "DATETIME",
        13 => "YEAR",
        15 => "VARCHAR",
        16 => "BIT",
        245 => "JSON",
        246 => "DECIMAL",
        247 => "ENUM",
        248 => "SET",
        249 => "TINY_BLOB",
        250 => "MEDIUM_BLOB",
        251 => "LONG_BLOB",
        252 => "BLOB",
        253 => "VAR_STRING",
        254 => "STRING",
        other => return format!("UNKNOWN({other})"),
    };
    name.to_string()
}

pub fn flag_names(flags: u16) -> Vec<&'static str> {
    FLAG_NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}

pub fn decode_column_definition(payload: &[u8]) -> Result<ColumnDefinition, DecodeError> {
    let mut offset = 0;
    let mut name = String::new();
    // catalog, schema, table, org_table, name, org_name
    for field in 0..6 {
        let (value, next) = decode_lenenc_str(payload, offset)?;
        if field == 4 {
            name = lossy_text(value);
        }
        offset = next;
    }

    let marker = take(payload, offset, 1)?[0];
    if marker != COLUMN_DEF_MARKER {
        return Err(DecodeError::MalformedColumnDefinition(marker));
    }
    offset += 1;

    let fixed = take(payload, offset, 10)?;
    let charset = u16::from_le_bytes([fixed[0], fixed[1]]);
    let length = u32::from_le_bytes([fixed[2], fixed[3], fixed[4], fixed[5]]);
    let type_code = fixed[6];
    let flags = u16::from_le_bytes([fixed[7], fixed[8]]);
    let decimals = fixed[9];

    Ok(ColumnDefinition {
        name,
        type_code,
        type_name: type_name(type_code),
        charset,
        length,
        flags,
        flag_names: flag_names(flags),
        decimals,
    })
}

/// Build a ColumnDefinition41 payload for test traffic.
#[cfg(test)]
pub(crate) fn column_def_payload(name: &str, type_code: u8, flags: u16) -> bytes::BytesMut {
    use crate::protocol::primitive::encode_lenenc_str;
    use bytes::BufMut;

    let mut buf = bytes::BytesMut::new();
    encode_lenenc_str(&mut buf, b"def");
    encode_lenenc_str(&mut buf, b"testdb");
    encode_lenenc_str(&mut buf, b"t");
    encode_lenenc_str(&mut buf, b"t");
    encode_lenenc_str(&mut buf, name.as_bytes());
    encode_lenenc_str(&mut buf, name.as_bytes());
    buf.put_u8(COLUMN_DEF_MARKER);
    buf.put_u16_le(33); // utf8 charset
    buf.put_u32_le(11);
    buf.put_u8(type_code);
    buf.put_u16_le(flags);
    buf.put_u8(0);
    buf.put_u16_le(0); // filler
    buf
}
