//! Registry of live sessions.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::{ListenerError, Result};

use super::id::{SessionId, SessionIdGenerator};
use super::session::{Session, SessionInfo};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Owns every live session.
///
/// Only the listener's accept and close paths insert or remove entries. The
/// console reads through `get` and `list` and must not keep the returned
/// session past a single command, since the peer may disconnect at any time.
pub struct SessionRegistry {
    /// Sessions keyed by id, which keeps them in accept order.
    sessions: RwLock<BTreeMap<SessionId, Arc<Session>>>,

    ids: SessionIdGenerator,

    max_sessions: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            ids: SessionIdGenerator::new(),
            max_sessions,
        }
    }

    /// Allocate an id for a newly accepted connection.
    pub fn next_id(&self) -> SessionId {
        self.ids.generate()
    }

    /// Add a session.
    pub async fn register(&self, session: Arc<Session>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(ListenerError::MaxSessionsReached(self.max_sessions));
        }
        sessions.insert(session.id(), session);
        Ok(())
    }

    /// Remove a session, returning it if it was present.
    pub async fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(&id)
    }

    /// Look up a session by id.
    pub async fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Look up a session by id, failing if it is gone.
    pub async fn require(&self, id: SessionId) -> Result<Arc<Session>> {
        self.get(id)
            .await
            .ok_or(ListenerError::SessionNotFound(id))
    }

    /// Snapshot of all sessions in accept order.
    pub async fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .read()
            .await
            .values()
            .map(|session| session.info())
            .collect()
    }

    /// Count live sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Close and forget every session.
    pub async fn close_all(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();

        for (id, session) in std::mem::take(&mut *sessions) {
            tracing::info!(session_id = %id, peer = %session.peer(), "Closing session on shutdown");
            session.close();
        }

        count
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
