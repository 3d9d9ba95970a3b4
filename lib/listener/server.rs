//! TCP accept loop.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::GlobalConfig;
use crate::session::{Session, SessionRegistry};
use crate::types::{ListenerError, Result};

use super::connection::Connection;
use super::event::{EventSender, ListenerEvent};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Handle to a running listener.
pub struct Listener {
    /// Address actually bound.
    local_addr: SocketAddr,

    /// Live sessions.
    registry: Arc<SessionRegistry>,

    /// Shutdown signal.
    shutdown_tx: mpsc::Sender<()>,

    /// Accept loop task handle.
    handle: Option<tokio::task::JoinHandle<()>>,
}

/// State owned by the accept loop.
struct AcceptLoop {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    events: EventSender,
    download_dir: PathBuf,
    read_buffer_size: usize,
    max_message_size: usize,
    idle_flush: Duration,
    connections: JoinSet<()>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Listener {
    /// Bind the configured port and start accepting peers.
    ///
    /// Binding failures are returned to the caller, which should treat them as fatal.
    pub async fn bind(config: &GlobalConfig, events: EventSender) -> Result<Self> {
        config.validate()?;

        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let registry = Arc::new(SessionRegistry::new(config.max_sessions));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let accept_loop = AcceptLoop {
            listener,
            registry: registry.clone(),
            events,
            download_dir: config.download_dir.clone(),
            read_buffer_size: config.read_buffer_size,
            max_message_size: config.max_message_size,
            idle_flush: config.idle_flush(),
            connections: JoinSet::new(),
        };

        let handle = tokio::spawn(accept_loop.run(shutdown_rx));
        tracing::info!(addr = %local_addr, "Listener started");

        Ok(Self {
            local_addr,
            registry,
            shutdown_tx,
            handle: Some(handle),
        })
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Stop accepting, close every session, and wait for their tasks to finish.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(()).await;

        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }

        tracing::info!("Listener stopped");
    }
}

impl AcceptLoop {
    async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        loop {
            tokio::select! {
                result = self.listener.accept() => match result {
                    Ok((stream, peer)) => self.accept(stream, peer).await,
                    Err(e) => {
                        // Usually transient (e.g. out of descriptors); keep serving.
                        tracing::error!("Accept error: {}", e);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                Some(_) = self.connections.join_next(), if !self.connections.is_empty() => {}
                _ = shutdown_rx.recv() => {
                    tracing::debug!("Listener shutdown signal received");
                    break;
                }
            }
        }

        drop(self.listener);
        let closed = self.registry.close_all().await;
        tracing::debug!(closed, "Waiting for connection tasks");
        while self.connections.join_next().await.is_some() {}
    }

    async fn accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        let id = self.registry.next_id();

        // Local working directory, not the peer's.
        let context = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("?"));

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session::new(id, peer, context, outbound_tx));

        if let Err(e) = self.registry.register(session.clone()).await {
            tracing::warn!(%peer, "Rejecting connection: {}", e);
            let _ = self.events.send(ListenerEvent::Rejected {
                peer,
                reason: e.to_string(),
            });
            return;
        }

        tracing::info!(session_id = %id, %peer, "Connection accepted");
        let _ = self.events.send(ListenerEvent::Connected { id, peer });

        let connection = Connection {
            session,
            outbound: outbound_rx,
            registry: self.registry.clone(),
            events: self.events.clone(),
            download_dir: self.download_dir.clone(),
            read_buffer_size: self.read_buffer_size,
            max_message_size: self.max_message_size,
            idle_flush: self.idle_flush,
        };
        self.connections.spawn(connection.run(stream));
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
