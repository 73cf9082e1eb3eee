use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::http;

/// End-of-stream sentinel. Matched by exact length and content; a datagram
/// merely containing it is a body chunk.
pub const SENTINEL_DONE: &[u8] = b"DONE";

/// Absence-of-result sentinel, same exact-match rule.
pub const SENTINEL_NOT_FOUND: &[u8] = b"File Not Found";

/// Largest backend datagram we accept; anything longer is truncated by the
/// kernel on receive.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Per-receive wait. Each receive attempt is independently bounded; there is
/// no overall exchange deadline.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// What a single backend datagram means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramKind {
    Done,
    NotFound,
    Chunk,
}

pub fn classify_datagram(payload: &[u8]) -> DatagramKind {
    if payload == SENTINEL_DONE {
        DatagramKind::Done
    } else if payload == SENTINEL_NOT_FOUND {
        DatagramKind::NotFound
    } else {
        DatagramKind::Chunk
    }
}

/// States of one query/response exchange. `AwaitingFirstChunk` means no
/// status line has been written to the client yet; once a body chunk arrives
/// the exchange moves to `Streaming` and is committed to 200 OK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    AwaitingFirstChunk,
    Streaming,
    Done,
    NotFound,
    TimedOut,
    Error,
}

impl ExchangeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExchangeState::AwaitingFirstChunk | ExchangeState::Streaming)
    }

    pub fn on_datagram(self, kind: DatagramKind) -> ExchangeState {
        match self {
            ExchangeState::AwaitingFirstChunk | ExchangeState::Streaming => match kind {
                DatagramKind::Done => ExchangeState::Done,
                DatagramKind::NotFound => ExchangeState::NotFound,
                DatagramKind::Chunk => ExchangeState::Streaming,
            },
            terminal => terminal,
        }
    }

    pub fn on_timeout(self) -> ExchangeState {
        if self.is_terminal() {
            self
        } else {
            ExchangeState::TimedOut
        }
    }
}

/// Terminal result of one exchange, as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// `DONE` arrived; the 200 header and all chunks have been written.
    Done,
    /// `File Not Found` arrived before any chunk. Nothing has been written;
    /// the caller still owes the client a 404.
    NotFound,
    /// No datagram within the timeout and no chunk forwarded yet. Nothing
    /// has been written; the caller still owes the client a 408.
    TimedOut,
    /// `File Not Found` arrived after chunks were forwarded. The 200 header
    /// is already on the wire; the caller can only drop the connection.
    AbortedNotFound,
    /// Timeout after chunks were forwarded; same situation as above.
    AbortedTimeout,
}

impl ExchangeOutcome {
    /// True when the client got a truncated 200 and the connection must be
    /// closed without further bytes.
    pub fn is_aborted(self) -> bool {
        matches!(
            self,
            ExchangeOutcome::AbortedNotFound | ExchangeOutcome::AbortedTimeout
        )
    }
}

/// Run one exchange: send the decoded term as a single datagram, then
/// forward body chunks to `client` until a sentinel or a timeout.
///
/// The UDP socket is ephemeral, owned by this call, and dropped on every
/// exit path. A send or receive failure (other than timeout) surfaces as
/// `Err`; the caller treats it as fatal to the connection.
pub async fn run_exchange<W>(
    client: &mut W,
    term: &str,
    backend: SocketAddr,
    recv_timeout: Duration,
) -> io::Result<ExchangeOutcome>
where
    W: AsyncWrite + Unpin,
{
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(backend).await?;
    socket.send(term.as_bytes()).await?;

    let mut state = ExchangeState::AwaitingFirstChunk;
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        let received = match timeout(recv_timeout, socket.recv(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => {
                let streaming = state == ExchangeState::Streaming;
                state = state.on_timeout();
                debug_assert_eq!(state, ExchangeState::TimedOut);
                return Ok(if streaming {
                    ExchangeOutcome::AbortedTimeout
                } else {
                    ExchangeOutcome::TimedOut
                });
            }
        };

        let payload = &buf[..received];
        let kind = classify_datagram(payload);
        let next = state.on_datagram(kind);

        match kind {
            DatagramKind::Done => {
                // Sentinel, never forwarded. A DONE before any chunk still
                // commits to 200 with an empty body.
                if state == ExchangeState::AwaitingFirstChunk {
                    client.write_all(&http::stream_response_head()).await?;
                }
                client.flush().await?;
                return Ok(ExchangeOutcome::Done);
            }
            DatagramKind::NotFound => {
                return Ok(if state == ExchangeState::Streaming {
                    ExchangeOutcome::AbortedNotFound
                } else {
                    ExchangeOutcome::NotFound
                });
            }
            DatagramKind::Chunk => {
                if state == ExchangeState::AwaitingFirstChunk {
                    client.write_all(&http::stream_response_head()).await?;
                }
                client.write_all(payload).await?;
                client.flush().await?;
            }
        }

        state = next;
    }
}
