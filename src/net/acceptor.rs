//! TCP acceptor: one listener; per-connection session with its own reader and writer task.

use crate::error::TransportError;
use crate::gateway::Ingress;
use crate::net::session::{InFlight, SessionRegistry};
use crate::shutdown::ShutdownSignal;
use crate::types::PeerAddr;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Run the accept loop on `listener` until `shutdown` fires. Each connection is served
/// by its own task; a failing session never affects the others. The listener is
/// dropped (and the port released) when this returns.
pub async fn run_acceptor(
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    ingress: Arc<Ingress>,
    max_line_bytes: usize,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.wait() => break,
            res = listener.accept() => res,
        };
        match accepted {
            Ok((stream, addr)) => {
                let registry = Arc::clone(&registry);
                let ingress = Arc::clone(&ingress);
                let signal = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        handle_connection(stream, addr, registry, ingress, max_line_bytes, signal).await
                    {
                        warn!("session error peer={} error={}", addr, e);
                    }
                });
            }
            Err(e) => {
                // e.g. EMFILE; back off instead of spinning.
                warn!("accept error: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
    info!("acceptor stopped");
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    ingress: Arc<Ingress>,
    max_line_bytes: usize,
    mut shutdown: ShutdownSignal,
) -> Result<(), TransportError> {
    stream.set_nodelay(true)?;
    let peer = PeerAddr::from(addr);
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let session_id = registry.register(peer.clone(), tx);
    debug!("session opened peer={} session={}", peer, session_id);

    let writer = tokio::spawn(write_loop(write_half, rx));
    let inflight = InFlight::new();
    let result = tokio::select! {
        r = read_loop(read_half, &peer, &ingress, &inflight, max_line_bytes) => r,
        _ = shutdown.wait() => Ok(()),
    };

    // Read side reached EOF; the peer may still be reading replies.
    if result.is_ok() && !shutdown.is_triggered() && inflight.pending() > 0 {
        debug!("draining peer={} pending={}", peer, inflight.pending());
        tokio::select! {
            _ = inflight.wait_idle() => {}
            _ = shutdown.wait() => {}
        }
    }

    // Dropping the registry's sender lets the writer drain what is queued and exit.
    registry.unregister(&peer, session_id);
    if shutdown.is_triggered() {
        writer.abort();
    }
    if let Ok(Err(e)) = writer.await {
        debug!("session writer error peer={} error={}", peer, e);
    }
    debug!("session closed peer={} session={}", peer, session_id);
    result
}

/// One message per line. `\r\n` is tolerated and blank lines are skipped.
async fn read_loop(
    read_half: OwnedReadHalf,
    peer: &PeerAddr,
    ingress: &Ingress,
    inflight: &Arc<InFlight>,
    max_line_bytes: usize,
) -> Result<(), TransportError> {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(1024);
    let limit = (max_line_bytes as u64).saturating_add(1);
    loop {
        buf.clear();
        let n = (&mut reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Ok(());
        }
        if n > max_line_bytes && buf.last() != Some(&b'\n') {
            return Err(TransportError::LineTooLong {
                limit: max_line_bytes,
            });
        }
        let text = match std::str::from_utf8(&buf) {
            Ok(s) => s.to_string(),
            Err(_) => {
                warn!("invalid utf-8 from peer={}, decoding lossily", peer);
                String::from_utf8_lossy(&buf).into_owned()
            }
        };
        let line = text.trim_end_matches(|c| c == '\n' || c == '\r');
        if line.trim().is_empty() {
            continue;
        }
        ingress.deliver(peer, line.to_string(), inflight.begin()).await;
    }
}

/// Sole consumer of the session outbox: replies go out in the order they were queued.
async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut outbox: mpsc::UnboundedReceiver<String>,
) -> std::io::Result<()> {
    while let Some(mut line) = outbox.recv().await {
        if !line.ends_with('\n') {
            line.push('\n');
        }
        write_half.write_all(line.as_bytes()).await?;
    }
    write_half.shutdown().await
}
