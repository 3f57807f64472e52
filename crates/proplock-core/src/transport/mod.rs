//! TCP transport for the lock hub
//!
//! Clients speak newline-delimited JSON (see [`protocol`]). Every accepted
//! socket becomes one connection: a reader loop dispatching requests into the
//! [`LockHub`] and a writer task draining the connection's outbound queue.
//! Whichever side ends first tears the connection down, after which the
//! disconnect purge runs exactly once.

pub mod protocol;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::Config;
use crate::domain::locking::{ConnectionId, LockRegistry};
use crate::error::{Error, Result};
use crate::hub::{Broadcaster, ConnectionHub, EventReceiver, HubEvent, LockHub};
use protocol::ClientRequest;

/// How long a closing connection may spend flushing queued events
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP server exposing a [`LockHub`]
#[derive(Debug, Clone)]
pub struct LockServer {
    bind_addr: String,
    max_line_bytes: usize,
    hub: LockHub,
    connections: Arc<ConnectionHub>,
}

impl LockServer {
    /// Create a server with a fresh registry, wired from `config`
    pub fn new(config: &Config) -> Self {
        let connections = Arc::new(ConnectionHub::new(config.hub.outbound_buffer));
        let hub = LockHub::new(Arc::new(LockRegistry::new()), connections.clone());

        Self {
            bind_addr: config.server.bind_addr.clone(),
            max_line_bytes: config.server.max_line_bytes,
            hub,
            connections,
        }
    }

    /// Get the lock hub
    pub fn hub(&self) -> &LockHub {
        &self.hub
    }

    /// Get the connection table
    pub fn connections(&self) -> &ConnectionHub {
        &self.connections
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "Lock server listening");
        Ok(listener)
    }

    /// Accept connections until `shutdown` is cancelled
    ///
    /// Waits for every open connection to finish its disconnect purge before
    /// returning.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let tracker = TaskTracker::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = self.clone();
                        let shutdown = shutdown.clone();
                        tracker.spawn(async move {
                            server.handle_connection(stream, peer, shutdown).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
            }
        }

        tracker.close();
        tracker.wait().await;
        info!("Lock server stopped");
        Ok(())
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, shutdown: CancellationToken) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Could not set TCP_NODELAY");
        }

        let (id, outbound) = self.connections.connect().await;
        let span = info_span!("connection", connection_id = %id, peer = %peer);

        async move {
            info!("Client connected");

            let (read_half, write_half) = stream.into_split();
            let closed = CancellationToken::new();
            let mut writer = tokio::spawn(
                write_events(write_half, outbound, closed.clone()).in_current_span(),
            );

            if let Err(e) = self.connections.send_to(&id, HubEvent::Connected(id.clone())).await {
                warn!(error = %e, "Greeting not delivered");
            }

            let reason = self.read_requests(&id, read_half, &shutdown, &closed).await;
            info!(reason, "Client disconnected");

            // Unregister first so the purge broadcasts only reach live connections
            self.connections.disconnect(&id).await;
            self.hub.on_disconnect(&id).await;

            match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Writer task failed"),
                Err(_) => {
                    debug!("Outbound queue not drained in time, dropping it");
                    writer.abort();
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Dispatch requests until the connection ends, returning why it ended
    async fn read_requests(
        &self,
        id: &ConnectionId,
        read_half: OwnedReadHalf,
        shutdown: &CancellationToken,
        closed: &CancellationToken,
    ) -> &'static str {
        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                _ = shutdown.cancelled() => return "server shutdown",
                _ = closed.cancelled() => return "outbound closed",
                read = read_line_limited(&mut reader, &mut buf, self.max_line_bytes) => read,
            };

            match read {
                Ok(LineRead::Eof) => return "eof",
                Ok(LineRead::TooLong) => {
                    let error = Error::InvalidRequest(format!(
                        "request exceeds {} bytes",
                        self.max_line_bytes
                    ));
                    self.reject(id, error).await;
                    return "request too long";
                }
                Ok(LineRead::Line) => match std::str::from_utf8(&buf) {
                    Ok(line) => self.dispatch(id, line).await,
                    Err(e) => {
                        let error =
                            Error::InvalidRequest(format!("request is not valid UTF-8: {e}"));
                        self.reject(id, error).await;
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Read failed");
                    return "read error";
                }
            }
        }
    }

    async fn dispatch(&self, id: &ConnectionId, line: &str) {
        match protocol::parse_request(line) {
            Ok(None) => {}
            Ok(Some(ClientRequest::LockProperty { property_id })) => {
                self.hub.on_acquire_request(id, property_id).await;
            }
            Ok(Some(ClientRequest::UnlockProperty { property_id })) => {
                self.hub.on_release_request(id, property_id).await;
            }
            Ok(Some(ClientRequest::GetLockedProperties)) => {
                self.hub.on_snapshot_request(id).await;
            }
            Err(e) => self.reject(id, e).await,
        }
    }

    async fn reject(&self, id: &ConnectionId, error: Error) {
        debug!(code = error.code(), error = %error, "Rejected request");
        if let Err(e) = self.connections.send_to(id, HubEvent::protocol_error(&error)).await {
            debug!(error = %e, "Protocol error not delivered");
        }
    }
}

enum LineRead {
    Line,
    Eof,
    TooLong,
}

/// Read one line of raw bytes, refusing to buffer more than `max` of them
///
/// A line of exactly `max` bytes plus its newline is accepted.
async fn read_line_limited(
    reader: &mut BufReader<OwnedReadHalf>,
    buf: &mut Vec<u8>,
    max: usize,
) -> Result<LineRead> {
    let limit = u64::try_from(max).unwrap_or(u64::MAX).saturating_add(1);
    let read = reader.take(limit).read_until(b'\n', buf).await?;

    if read == 0 {
        Ok(LineRead::Eof)
    } else if buf.last() != Some(&b'\n') && read > max {
        Ok(LineRead::TooLong)
    } else {
        Ok(LineRead::Line)
    }
}

/// Drain the outbound queue onto the socket until it closes
async fn write_events(
    mut write_half: OwnedWriteHalf,
    mut outbound: EventReceiver,
    closed: CancellationToken,
) {
    while let Some(event) = outbound.recv().await {
        let line = match protocol::encode_event(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(event = event.name(), error = %e, "Failed to encode event");
                continue;
            }
        };
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }

    // Either the hub dropped us or the socket is gone; stop the reader too
    closed.cancel();
    let _ = write_half.shutdown().await;
}
