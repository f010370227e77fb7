//! MySQL wire protocol decoding.
//!
//! Packet framing, length-encoded primitives, column metadata, result rows
//! and the session state machine that decides which decoder applies next.
//! Reference: https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basics.html

pub mod column;
pub mod packet;
pub mod primitive;
pub mod row;
pub mod session;

// Command bytes (client -> server)
pub const COM_QUIT: u8 = 0x01;
pub const COM_INIT_DB: u8 = 0x02;
pub const COM_QUERY: u8 = 0x03;
pub const COM_FIELD_LIST: u8 = 0x04;
pub const COM_PING: u8 = 0x0E;
pub const COM_STMT_PREPARE: u8 = 0x16;
pub const COM_STMT_EXECUTE: u8 = 0x17;
pub const COM_STMT_CLOSE: u8 = 0x19;

// Leading bytes of server responses
pub const OK_MARKER: u8 = 0x00;
pub const EOF_MARKER: u8 = 0xFE;
pub const ERR_MARKER: u8 = 0xFF;

/// A 0xfe packet is an EOF only when its payload is shorter than this;
/// longer ones are lenenc integers (or binary row data) that share the byte.
pub const EOF_MAX_PAYLOAD: usize = 9;

/// NULL sentinel in text rows and an invalid length marker everywhere else.
pub const NULL_SENTINEL: u8 = 0xFB;

/// Fixed-length-fields marker inside a column definition packet.
pub const COLUMN_DEF_MARKER: u8 = 0x0C;

// Column type codes the binary row decoder understands
pub const TYPE_TINY: u8 = 0x01;
pub const TYPE_DOUBLE: u8 = 0x05;
pub const TYPE_LONGLONG: u8 = 0x08;
pub const TYPE_BLOB: u8 = 0xFC;
pub const TYPE_VAR_STRING: u8 = 0xFD;
pub const TYPE_STRING: u8 = 0xFE;

pub fn command_name(code: u8) -> Option<&'static str> {
    match code {
        COM_QUIT => Some("COM_QUIT"),
        COM_INIT_DB => Some("COM_INIT_DB"),
        COM_QUERY => Some("COM_QUERY"),
        COM_FIELD_LIST => Some("COM_FIELD_LIST"),
        COM_PING => Some("COM_PING"),
        COM_STMT_PREPARE => Some("COM_STMT_PREPARE"),
        COM_STMT_EXECUTE => Some("COM_STMT_EXECUTE"),
        COM_STMT_CLOSE => Some("COM_STMT_CLOSE"),
        _ => None,
    }
}
