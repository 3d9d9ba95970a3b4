//! Per-connection task.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::protocol::{FrameBuffer, Inbound, Outbound, Push};
use crate::session::{Session, SessionRegistry};
use crate::transfer;

use super::event::{EventSender, ListenerEvent};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Everything a connection task needs besides its socket.
pub(crate) struct Connection {
    pub session: Arc<Session>,
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub registry: Arc<SessionRegistry>,
    pub events: EventSender,
    pub download_dir: PathBuf,
    pub read_buffer_size: usize,
    pub max_message_size: usize,
    pub idle_flush: Duration,
}

/// Why the connection loop stopped.
enum Exit {
    /// Peer shut down, or the session was closed locally.
    Closed,

    /// Transport failure.
    Failed(String),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Connection {
    /// Serve one peer until it disconnects, fails, or is closed.
    ///
    /// Reads and queued writes are handled in one task so this peer's events
    /// stay in arrival order. The session leaves the registry before the
    /// final event is reported.
    pub(crate) async fn run(mut self, stream: TcpStream) {
        let id = self.session.id();
        let peer = self.session.peer();
        let (mut reader, mut writer) = stream.into_split();
        let mut buf = vec![0u8; self.read_buffer_size];
        let mut frames = FrameBuffer::new(self.max_message_size);

        let exit = loop {
            tokio::select! {
                _ = self.session.closed() => {
                    tracing::debug!(session_id = %id, "Session closed locally");
                    break Exit::Closed;
                }
                msg = self.outbound.recv() => {
                    let Some(msg) = msg else {
                        break Exit::Closed;
                    };
                    let bytes = match msg.encode() {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            tracing::warn!(session_id = %id, "Dropping unencodable message: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = writer.write_all(&bytes).await {
                        break Exit::Failed(e.to_string());
                    }
                    if let Err(e) = writer.flush().await {
                        break Exit::Failed(e.to_string());
                    }
                }
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        if let Some(message) = frames.flush() {
                            self.handle_message(&message).await;
                        }
                        break Exit::Closed;
                    }
                    Ok(n) => {
                        if let Push::Oversized { limit } = frames.push(&buf[..n], n == buf.len()) {
                            tracing::warn!(session_id = %id, limit, "Discarding oversized message");
                            let _ = self.events.send(ListenerEvent::Oversized { id, peer, limit });
                        }
                        while let Some(message) = frames.next_message() {
                            self.handle_message(&message).await;
                        }
                    }
                    Err(e) => break Exit::Failed(e.to_string()),
                },
                _ = tokio::time::sleep(self.idle_flush), if frames.is_pending() => {
                    if let Some(message) = frames.flush() {
                        self.handle_message(&message).await;
                    }
                }
            }
        };

        let _ = writer.shutdown().await;
        self.registry.remove(id).await;

        let event = match exit {
            Exit::Closed => {
                tracing::info!(session_id = %id, %peer, "Connection closed");
                ListenerEvent::Closed { id, peer }
            }
            Exit::Failed(reason) => {
                tracing::warn!(session_id = %id, %peer, "Connection error: {}", reason);
                ListenerEvent::TransportError { id, peer, reason }
            }
        };
        let _ = self.events.send(event);
    }

    /// Decode one complete message and act on it.
    async fn handle_message(&self, chunk: &[u8]) {
        let id = self.session.id();
        let peer = self.session.peer();

        let msg = match Inbound::decode(chunk) {
            Ok(Some(msg)) => msg,
            Ok(None) => return,
            Err(e) => {
                tracing::debug!(session_id = %id, "Malformed message: {}", e);
                let _ = self.events.send(ListenerEvent::Unrecognized {
                    id,
                    peer,
                    text: String::from_utf8_lossy(chunk).trim().to_string(),
                    reason: Some(e.to_string()),
                });
                return;
            }
        };

        match msg {
            Inbound::Output(text) => {
                let _ = self.events.send(ListenerEvent::Output { id, peer, text });
            }
            Inbound::FileContent { name, data } => {
                let _guard = self.session.begin_transfer();
                let event = match transfer::receive_file(&self.download_dir, &name, &data).await {
                    Ok(path) => ListenerEvent::FileSaved { id, peer, path },
                    Err(e) => {
                        tracing::warn!(session_id = %id, file = %name, "File save failed: {}", e);
                        ListenerEvent::FileSaveFailed {
                            id,
                            peer,
                            name,
                            reason: e.to_string(),
                        }
                    }
                };
                let _ = self.events.send(event);
            }
            Inbound::UploadRequest(path) => {
                // Failures are already reported to both sides.
                let _ = transfer::send_file(&self.session, &path, &self.events).await;
            }
            Inbound::Unrecognized(text) => {
                let _ = self.events.send(ListenerEvent::Unrecognized {
                    id,
                    peer,
                    text,
                    reason: None,
                });
            }
        }
    }
}
