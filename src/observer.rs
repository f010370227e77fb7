//! Observation of decoded traffic.
//!
//! The relay hands every packet to a `PacketObserver` after decoding and
//! before forwarding. Observers only look; the bytes on the wire are not
//! theirs to change.

use std::fmt;

use bytes::Bytes;

use crate::protocol::row::DecodedValue;
use crate::protocol::session::{ClientEvent, ServerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToServer => write!(f, "CLIENT -> SERVER"),
            Direction::ServerToClient => write!(f, "SERVER -> CLIENT"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TapEvent {
    Client(ClientEvent),
    Server(ServerEvent),
}

/// One observed packet: where it went, the session-wide monotonic packet
/// number, the wire sequence id, and what the decoder made of it.
#[derive(Debug, Clone)]
pub struct PacketRecord {
    pub direction: Direction,
    pub packet_num: u64,
    pub sequence_id: u8,
    pub payload: Bytes,
    pub event: TapEvent,
}

pub trait PacketObserver {
    fn on_packet(&mut self, record: &PacketRecord);
}

/// Logs every packet through `tracing`, with an optional hex dump of the
/// payload.
pub struct ConsoleObserver {
    hex_dump: bool,
}

impl ConsoleObserver {
    pub fn new(hex_dump: bool) -> Self {
        Self { hex_dump }
    }
}

impl PacketObserver for ConsoleObserver {
    fn on_packet(&mut self, record: &PacketRecord) {
        let summary = describe(&record.event);
        tracing::info!(
            n = record.packet_num,
            seq = record.sequence_id,
            len = record.payload.len(),
            "[{}] {}",
            record.direction,
            summary,
        );
        if let TapEvent::Server(ServerEvent::Row(row)) = &record.event {
            for (name, value) in &row.values {
                tracing::info!("  {name} = {}", format_value(value));
            }
        }
        if let TapEvent::Server(ServerEvent::Column(col)) = &record.event {
            tracing::info!(
                "  name={} type={} (code={}) charset={} length={} flags={:04x} ({}) decimals={}",
                col.name,
                col.type_name,
                col.type_code,
                col.charset,
                col.length,
                col.flags,
                col.flag_names.join(", "),
                col.decimals,
            );
        }
        if self.hex_dump {
            for line in hex_dump_lines(&record.payload) {
                tracing::info!("  {line}");
            }
        }
    }
}

fn describe(event: &TapEvent) -> String {
    match event {
        TapEvent::Client(ClientEvent::Query { sql }) => format!("COM_QUERY: {sql}"),
        TapEvent::Client(ClientEvent::Command { code, name }) => match name {
            Some(name) => name.to_string(),
            None => format!("command 0x{code:02x}"),
        },
        TapEvent::Client(ClientEvent::Empty) => "empty packet".to_string(),
        TapEvent::Server(event) => match event {
            ServerEvent::Ok => "OK".to_string(),
            ServerEvent::Err => "Error".to_string(),
            ServerEvent::Eof => "EOF".to_string(),
            ServerEvent::ColumnCount(n) => format!("result set: {n} columns"),
            ServerEvent::Column(col) => format!("column definition: {}", col.name),
            ServerEvent::Row(row) if row.complete => "row".to_string(),
            ServerEvent::Row(_) => "row (partial)".to_string(),
            ServerEvent::Opaque => "unclassified packet".to_string(),
            ServerEvent::DecodeFailed(e) => format!("decode failed: {e}"),
        },
    }
}

fn format_value(value: &DecodedValue) -> String {
    match value {
        DecodedValue::Null => "NULL".to_string(),
        DecodedValue::Integer(n) => n.to_string(),
        DecodedValue::Float(f) => f.to_string(),
        DecodedValue::Text(s) => format!("{s:?}"),
        DecodedValue::Unknown(err) => format!("<{err}>"),
    }
}

/// 16 bytes per line: offset, hex bytes, printable-ASCII gutter.
pub fn hex_dump_lines(data: &[u8]) -> Vec<String> {
    data.chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            let ascii: String = chunk
                .iter()
                .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '.' })
                .collect();
            format!("{:04x}  {:<47}  {}", i * 16, hex.join(" "), ascii)
        })
        .collect()
}
