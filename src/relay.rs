//! The relay loop.
//!
//! One session, two streams, one control loop. Each packet goes through
//! read -> decode-observe -> forward, in that order; the forwarded bytes are
//! the raw bytes that arrived, always, whether or not decoding succeeded.

use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;

use crate::observer::{Direction, PacketObserver, PacketRecord, TapEvent};
use crate::protocol::packet::{Packet, PacketCodec};
use crate::protocol::session::SessionState;

/// How long one multiplexed wait may block before re-polling.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    Client,
    Server,
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Peer::Client => write!(f, "client"),
            Peer::Server => write!(f, "server"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSummary {
    pub packets: u64,
    pub disconnected_by: Peer,
}

/// Relay one client-server pair until either side closes its stream.
///
/// Decode failures are reported through the observer and never interrupt
/// forwarding; only a peer disconnect ends the session.
pub async fn run_session<C, S, O>(
    client: C,
    server: S,
    mut state: SessionState,
    observer: &mut O,
) -> Result<SessionSummary>
where
    C: AsyncRead + AsyncWrite + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
    O: PacketObserver,
{
    let (client_read, mut client_write) = tokio::io::split(client);
    let (server_read, mut server_write) = tokio::io::split(server);
    let mut client_frames = FramedRead::new(client_read, PacketCodec);
    let mut server_frames = FramedRead::new(server_read, PacketCodec);

    let mut packet_num = 0u64;
    let mut last_seq: [Option<u8>; 2] = [None, None];

    loop {
        tokio::select! {
            packet = client_frames.next() => match packet {
                Some(packet) => {
                    let packet = packet?;
                    packet_num += 1;
                    note_sequence_gap(&mut last_seq[0], &packet, Direction::ClientToServer);
                    let event = TapEvent::Client(state.observe_client(&packet));
                    observer.on_packet(&PacketRecord {
                        direction: Direction::ClientToServer,
                        packet_num,
                        sequence_id: packet.sequence_id,
                        payload: packet.payload.clone(),
                        event,
                    });
                    server_write.write_all(&packet.raw).await?;
                }
                None => {
                    return Ok(SessionSummary { packets: packet_num, disconnected_by: Peer::Client });
                }
            },
            packet = server_frames.next() => match packet {
                Some(packet) => {
                    let packet = packet?;
                    packet_num += 1;
                    note_sequence_gap(&mut last_seq[1], &packet, Direction::ServerToClient);
                    let event = TapEvent::Server(state.observe_server(&packet));
                    observer.on_packet(&PacketRecord {
                        direction: Direction::ServerToClient,
                        packet_num,
                        sequence_id: packet.sequence_id,
                        payload: packet.payload.clone(),
                        event,
                    });
                    client_write.write_all(&packet.raw).await?;
                }
                None => {
                    return Ok(SessionSummary { packets: packet_num, disconnected_by: Peer::Server });
                }
            },
            // Neither side had traffic within the poll window; go around
            // again. The loop does no periodic work.
            _ = tokio::time::sleep(POLL_TIMEOUT) => {}
        }
    }
}

/// Sequence-id gaps are an observability signal, never fatal. Ids restart at
/// zero with every new command, so only non-zero jumps are worth a note.
fn note_sequence_gap(last: &mut Option<u8>, packet: &Packet, direction: Direction) {
    if let Some(prev) = *last
        && packet.sequence_id != prev.wrapping_add(1)
        && packet.sequence_id != 0
    {
        tracing::debug!(
            prev,
            got = packet.sequence_id,
            "sequence id gap on {direction}",
        );
    }
    *last = Some(packet.sequence_id);
}
