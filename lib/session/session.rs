//! A connected peer session.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};

use crate::protocol::Outbound;
use crate::types::{ListenerError, Result};

use super::id::SessionId;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Snapshot of a session's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier.
    pub session_id: SessionId,

    /// Remote peer address and port.
    pub peer: SocketAddr,

    /// Working directory of the listener process at accept time.
    ///
    /// This describes the local side, not the peer's filesystem.
    pub context: PathBuf,

    /// Accept timestamp.
    pub connected_at: DateTime<Utc>,

    /// Whether a file transfer is running on this session.
    pub transfer_in_progress: bool,
}

/// A live connection from a remote peer.
///
/// Attributes are fixed at accept. The socket itself is owned by the
/// connection task; the session only holds the queue feeding it.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    context: PathBuf,
    connected_at: DateTime<Utc>,
    transfer_in_progress: AtomicBool,
    outbound: mpsc::UnboundedSender<Outbound>,
    close: Notify,
}

/// Clears the transfer flag when dropped.
pub struct TransferGuard<'a> {
    session: &'a Session,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Session {
    /// Create a session that writes through `outbound`.
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        context: PathBuf,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            id,
            peer,
            context,
            connected_at: Utc::now(),
            transfer_in_progress: AtomicBool::new(false),
            outbound,
            close: Notify::new(),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Remote peer address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Get session information.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id,
            peer: self.peer,
            context: self.context.clone(),
            connected_at: self.connected_at,
            transfer_in_progress: self.transfer_in_progress(),
        }
    }

    /// Queue a message for the peer.
    pub fn send(&self, msg: Outbound) -> Result<()> {
        tracing::debug!(session_id = %self.id, kind = msg.kind(), "Queueing outbound message");
        self.outbound
            .send(msg)
            .map_err(|_| ListenerError::SessionClosed(self.id))
    }

    /// Ask the connection task to shut the socket down.
    pub fn close(&self) {
        self.close.notify_one();
    }

    /// Resolves once `close` has been called.
    pub async fn closed(&self) {
        self.close.notified().await;
    }

    /// Mark a transfer as running until the guard drops.
    pub fn begin_transfer(&self) -> TransferGuard<'_> {
        self.transfer_in_progress.store(true, Ordering::SeqCst);
        TransferGuard { session: self }
    }

    /// Whether a transfer is running.
    pub fn transfer_in_progress(&self) -> bool {
        self.transfer_in_progress.load(Ordering::SeqCst)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for TransferGuard<'_> {
    fn drop(&mut self) {
        self.session
            .transfer_in_progress
            .store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("context", &self.context)
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
