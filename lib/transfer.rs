//! File transfer between the listener and its peers.
//!
//! Files move as whole-file base64 payloads in a single `FILE_CONTENT`
//! message; there is no streaming or chunking. All failures here are
//! recoverable and only ever affect the transfer that hit them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::listener::{EventSender, ListenerEvent};
use crate::protocol::{Outbound, READ_ERROR_PREFIX};
use crate::session::Session;
use crate::types::{ListenerError, Result};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

static PART_COUNTER: AtomicU64 = AtomicU64::new(0);

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Push a local file to a session's peer.
///
/// On a read failure the peer receives an `Error reading file: ...` text
/// instead of a file message, and the operator is told through `events`.
/// Returns the number of payload bytes queued.
pub async fn send_file(session: &Session, local_path: &str, events: &EventSender) -> Result<usize> {
    let _guard = session.begin_transfer();

    let loaded = load_file(local_path).await.and_then(|(name, data)| {
        let bytes = data.len();
        Ok((Outbound::file_content(name.clone(), data)?, name, bytes))
    });

    match loaded {
        Ok((msg, name, bytes)) => {
            session.send(msg)?;

            tracing::info!(session_id = %session.id(), file = %name, bytes, "File queued for peer");
            let _ = events.send(ListenerEvent::FileSent {
                id: session.id(),
                peer: session.peer(),
                name,
                bytes,
            });
            Ok(bytes)
        }
        Err(e) => {
            tracing::warn!(session_id = %session.id(), path = %local_path, "File read failed: {}", e);
            session.send(Outbound::ErrorText(format!("{} {}", READ_ERROR_PREFIX, e)))?;
            let _ = events.send(ListenerEvent::FileSendFailed {
                id: session.id(),
                peer: session.peer(),
                path: local_path.to_string(),
                reason: e.to_string(),
            });
            Err(e)
        }
    }
}

/// Read a local file, returning its base name and contents.
///
/// Relative paths resolve against the process working directory.
pub async fn load_file(local_path: &str) -> Result<(String, Vec<u8>)> {
    let path = resolve_local(local_path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ListenerError::InvalidFileName(local_path.to_string()))?;

    let data = tokio::fs::read(&path)
        .await
        .map_err(|source| ListenerError::FileRead {
            path: path.clone(),
            source,
        })?;

    Ok((name, data))
}

/// Save an inbound payload under `dir`, keeping only the base name of `name`.
///
/// Bytes land in a hidden sibling first and are renamed into place, so a
/// partial write never shows up under the final name.
pub async fn receive_file(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    let file_name = sanitize_file_name(name)?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ListenerError::FileWrite {
            path: dir.to_path_buf(),
            source,
        })?;

    let dest = dir.join(&file_name);
    let part = dir.join(format!(
        ".{}.{}.part",
        file_name,
        PART_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    if let Err(source) = tokio::fs::write(&part, data).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(ListenerError::FileWrite { path: part, source });
    }

    if let Err(source) = tokio::fs::rename(&part, &dest).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(ListenerError::FileWrite { path: dest, source });
    }

    tracing::info!(path = %dest.display(), bytes = data.len(), "File saved");
    Ok(dest)
}

/// Reduce a peer-supplied name to its final component.
///
/// Both `/` and `\` count as separators so traversal is neutralized whatever
/// platform the peer runs on.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    match base {
        "" | "." | ".." => Err(ListenerError::InvalidFileName(name.to_string())),
        _ => Ok(base.to_string()),
    }
}

fn resolve_local(local_path: &str) -> Result<PathBuf> {
    let path = Path::new(local_path);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
