//! Stream handling for a single client.
//!
//! Each accepted stream gets a writer task that drains the connection's
//! outbound queue and a read loop that turns newline-terminated input into
//! lobby events. Both halves watch the close signal: a close requested by the
//! lobby (quit, kick, idle eviction) interrupts a pending read at once, and a
//! write in progress gets a bounded grace period before it is abandoned.

use super::channel::{wait_closed, ChannelConnection, OutboundReceiver};
use super::ConnectionHandle;
use crate::broadcast::{deliver, SYSTEM_SENDER};
use crate::lobby::Lobby;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Upper bound for flushing queued frames once a close was requested.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs a TCP client until its session ends.
pub async fn handle_tcp_connection(
    stream: TcpStream,
    addr: SocketAddr,
    lobby: Arc<Lobby>,
    outbound_buffer: usize,
    max_line_length: usize,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
    }
    info!("Accepted connection from {}", addr);
    let (reader, writer) = stream.into_split();
    handle_connection(reader, writer, lobby, outbound_buffer, max_line_length).await;
    debug!("Connection from {} finished", addr);
}

/// Drives one client stream: registers it, pumps lines into the lobby and
/// reports the end of the stream.
pub async fn handle_connection<R, W>(
    reader: R,
    writer: W,
    lobby: Arc<Lobby>,
    outbound_buffer: usize,
    max_line_length: usize,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (connection, outbound) = ChannelConnection::new(outbound_buffer);
    let mut closed = connection.closed_signal();
    let connection: ConnectionHandle = Arc::new(connection);

    let writer_task = tokio::spawn(write_loop(writer, outbound));

    let Some(id) = lobby.on_accept(connection.clone()) else {
        let _ = writer_task.await;
        return;
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut discarding = false;
    // Room for the longest accepted line plus a CRLF terminator.
    let limit = max_line_length as u64 + 2;

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(limit);
        let read = tokio::select! {
            read = limited.read_until(b'\n', &mut buf) => read,
            _ = wait_closed(&mut closed) => break,
        };

        match read {
            Ok(0) => {
                lobby.on_close(id);
                break;
            }
            Ok(_) => {
                let complete = buf.last() == Some(&b'\n');
                if discarding {
                    lobby.registry().touch(id, Instant::now());
                    discarding = !complete;
                    continue;
                }
                let content = buf.strip_suffix(b"\n").unwrap_or(&buf);
                let content = content.strip_suffix(b"\r").unwrap_or(content);
                if content.len() > max_line_length {
                    lobby.registry().touch(id, Instant::now());
                    discarding = !complete;
                    deliver(
                        connection.as_ref(),
                        SYSTEM_SENDER,
                        &format!("Line too long, the limit is {max_line_length} bytes"),
                    );
                    continue;
                }
                let line = String::from_utf8_lossy(content);
                lobby.on_line(id, line.trim());
            }
            Err(e) => {
                lobby.on_error(id, &e);
                break;
            }
        }
    }

    // Covers the lobby-initiated close paths; a no-op if already removed.
    lobby.on_close(id);
    drop(connection);
    let _ = writer_task.await;
}

/// Writes queued frames in order until the connection closes, then flushes
/// whatever was queued before the close and shuts the stream down.
async fn write_loop<W>(mut writer: W, mut outbound: OutboundReceiver)
where
    W: AsyncWrite + Unpin,
{
    let mut interrupted = false;

    loop {
        tokio::select! {
            biased;
            frame = outbound.frames.recv() => {
                let Some(frame) = frame else { break };
                // A close gives an in-flight write a grace period, not an
                // immediate abort, so farewells and kick notices still go out.
                let grace = async {
                    wait_closed(&mut outbound.closed).await;
                    sleep(CLOSE_FLUSH_TIMEOUT).await;
                };
                tokio::select! {
                    biased;
                    result = write_frame(&mut writer, &frame) => {
                        if let Err(e) = result {
                            warn!("Write failed: {}", e);
                            interrupted = true;
                            break;
                        }
                    }
                    _ = grace => {
                        interrupted = true;
                        break;
                    }
                }
            }
            _ = wait_closed(&mut outbound.closed) => break,
        }
    }

    let _ = timeout(CLOSE_FLUSH_TIMEOUT, async {
        if !interrupted {
            while let Ok(frame) = outbound.frames.try_recv() {
                if write_frame(&mut writer, &frame).await.is_err() {
                    break;
                }
            }
        }
        let _ = writer.shutdown().await;
    })
    .await;
}

async fn write_frame<W>(writer: &mut W, frame: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await
}
