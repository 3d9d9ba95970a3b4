//! Events reported to the operator.

use std::fmt;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::session::SessionId;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Sender half of the event stream.
pub type EventSender = mpsc::UnboundedSender<ListenerEvent>;

/// Receiver half of the event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<ListenerEvent>;

/// Something the operator should see, tagged with the originating peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// A peer connected and was registered.
    Connected { id: SessionId, peer: SocketAddr },

    /// A peer shut down gracefully, or the session was terminated locally.
    Closed { id: SessionId, peer: SocketAddr },

    /// Transport failure; the session has been dropped.
    TransportError {
        id: SessionId,
        peer: SocketAddr,
        reason: String,
    },

    /// A peer was refused before registration.
    Rejected { peer: SocketAddr, reason: String },

    /// Command output or command error text.
    Output {
        id: SessionId,
        peer: SocketAddr,
        text: String,
    },

    /// Unknown or malformed message.
    Unrecognized {
        id: SessionId,
        peer: SocketAddr,
        text: String,
        reason: Option<String>,
    },

    /// An inbound message grew past the size limit and was dropped.
    Oversized {
        id: SessionId,
        peer: SocketAddr,
        limit: usize,
    },

    /// An inbound file was written to disk.
    FileSaved {
        id: SessionId,
        peer: SocketAddr,
        path: PathBuf,
    },

    /// An inbound file could not be written.
    FileSaveFailed {
        id: SessionId,
        peer: SocketAddr,
        name: String,
        reason: String,
    },

    /// A local file was queued for the peer.
    FileSent {
        id: SessionId,
        peer: SocketAddr,
        name: String,
        bytes: usize,
    },

    /// A local file could not be sent; the peer got an error text instead.
    FileSendFailed {
        id: SessionId,
        peer: SocketAddr,
        path: String,
        reason: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ListenerEvent {
    /// Session the event belongs to, if it was registered.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::Rejected { .. } => None,
            Self::Connected { id, .. }
            | Self::Closed { id, .. }
            | Self::TransportError { id, .. }
            | Self::Output { id, .. }
            | Self::Unrecognized { id, .. }
            | Self::Oversized { id, .. }
            | Self::FileSaved { id, .. }
            | Self::FileSaveFailed { id, .. }
            | Self::FileSent { id, .. }
            | Self::FileSendFailed { id, .. } => Some(*id),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ListenerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { peer, .. } => {
                write!(f, "[+] CONNECTED: {} : {}", peer.ip(), peer.port())
            }
            Self::Closed { peer, .. } => write!(f, "[-] CONNECTION CLOSED: {}", peer),
            Self::TransportError { peer, reason, .. } => {
                write!(f, "[!] Error: {}: {}", peer, reason)
            }
            Self::Rejected { peer, reason } => write!(f, "[!] Rejected {}: {}", peer, reason),
            Self::Output { peer, text, .. } => write!(f, "[Client {}]: {}", peer, text),
            Self::Unrecognized {
                peer,
                text,
                reason: None,
                ..
            } => write!(f, "[Unknown message from client {}]: {}", peer, preview(text)),
            Self::Unrecognized {
                peer,
                text,
                reason: Some(reason),
                ..
            } => write!(
                f,
                "[Unknown message from client {}]: {} ({})",
                peer,
                preview(text),
                reason
            ),
            Self::Oversized { peer, limit, .. } => write!(
                f,
                "[!] Message from {} exceeded {} bytes and was discarded",
                peer, limit
            ),
            Self::FileSaved { peer, path, .. } => {
                write!(f, "[{}] File saved as: {}", peer, path.display())
            }
            Self::FileSaveFailed {
                peer, name, reason, ..
            } => write!(f, "[{}] Error saving file {}: {}", peer, name, reason),
            Self::FileSent {
                peer, name, bytes, ..
            } => write!(f, "[{}] Sent file {} ({} bytes)", peer, name, bytes),
            Self::FileSendFailed {
                peer, path, reason, ..
            } => write!(f, "[{}] Error reading file {}: {}", peer, path, reason),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Print every event as one line until all senders are gone.
pub async fn render_events<W: Write>(mut rx: EventReceiver, mut out: W) {
    while let Some(event) = rx.recv().await {
        tracing::debug!(session_id = ?event.session_id(), "Rendering event");
        if writeln!(out, "{}", event).and_then(|_| out.flush()).is_err() {
            break;
        }
    }
}

/// Malformed messages can carry whole base64 payloads; keep the line readable.
fn preview(text: &str) -> String {
    const MAX: usize = 120;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "192.168.1.5:51234".parse().unwrap()
    }

    #[test]
    fn test_display_lines_carry_peer() {
        let id = SessionId::from_raw(1);
        let connected = ListenerEvent::Connected { id, peer: peer() };
        assert_eq!(connected.to_string(), "[+] CONNECTED: 192.168.1.5 : 51234");

        let output = ListenerEvent::Output {
            id,
            peer: peer(),
            text: "Command output: ok".into(),
        };
        assert_eq!(
            output.to_string(),
            "[Client 192.168.1.5:51234]: Command output: ok"
        );

        let closed = ListenerEvent::Closed { id, peer: peer() };
        assert_eq!(closed.to_string(), "[-] CONNECTION CLOSED: 192.168.1.5:51234");
    }

    #[test]
    fn test_unrecognized_preview_truncates() {
        let event = ListenerEvent::Unrecognized {
            id: SessionId::from_raw(1),
            peer: peer(),
            text: "x".repeat(500),
            reason: Some("bad".into()),
        };
        let line = event.to_string();
        assert!(line.len() < 200);
        assert!(line.ends_with("... (bad)"));

        let event = ListenerEvent::Unrecognized {
            id: SessionId::from_raw(1),
            peer: peer(),
            text: "y".repeat(64 * 1024),
            reason: None,
        };
        let line = event.to_string();
        assert!(line.len() < 200);
        assert!(line.ends_with("..."));
    }

    #[test]
    fn test_session_id() {
        let rejected = ListenerEvent::Rejected {
            peer: peer(),
            reason: "full".into(),
        };
        assert_eq!(rejected.session_id(), None);
    }

    #[tokio::test]
    async fn test_render_events_until_senders_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ListenerEvent::Connected {
            id: SessionId::from_raw(3),
            peer: peer(),
        })
        .unwrap();
        drop(tx);

        let mut out = Vec::new();
        render_events(rx, &mut out).await;
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[+] CONNECTED: 192.168.1.5 : 51234\n"
        );
    }
}
