//! Configuration for the listener.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ListenerError, Result};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 6969;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Global configuration for the listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Host or address to bind.
    pub bind_host: String,

    /// TCP port to listen on. `0` picks an ephemeral port.
    pub port: u16,

    /// Directory where inbound `FILE_CONTENT` payloads are saved.
    pub download_dir: PathBuf,

    /// Size of the per-connection read buffer.
    pub read_buffer_size: usize,

    /// Largest inbound message accepted. Longer messages are discarded.
    pub max_message_size: usize,

    /// Quiet period, in milliseconds, after which a pending message is closed.
    pub idle_flush_ms: u64,

    /// Maximum number of concurrent sessions.
    pub max_sessions: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl GlobalConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ListenerError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| ListenerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the listener cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(ListenerError::Config(
                "read_buffer_size must be greater than zero".into(),
            ));
        }
        if self.max_message_size < self.read_buffer_size {
            return Err(ListenerError::Config(
                "max_message_size must be at least read_buffer_size".into(),
            ));
        }
        if self.idle_flush_ms == 0 {
            return Err(ListenerError::Config(
                "idle_flush_ms must be greater than zero".into(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(ListenerError::Config(
                "max_sessions must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Quiet period that closes a pending inbound message.
    pub fn idle_flush(&self) -> Duration {
        Duration::from_millis(self.idle_flush_ms)
    }

    /// The `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            download_dir: PathBuf::from("."),
            read_buffer_size: 64 * 1024,
            max_message_size: 64 * 1024 * 1024,
            idle_flush_ms: 200,
            max_sessions: 64,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GlobalConfig::default();
        assert_eq!(config.port, 6969);
        assert_eq!(config.bind_addr(), "0.0.0.0:6969");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 7000, "download_dir": "/tmp/loot"}}"#).unwrap();

        let config = GlobalConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.download_dir, PathBuf::from("/tmp/loot"));
        assert_eq!(config.max_sessions, 64);
    }

    #[test]
    fn test_load_rejects_zero_buffer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"read_buffer_size": 0}}"#).unwrap();

        let err = GlobalConfig::load(file.path()).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_message_limit_below_buffer_rejected() {
        let config = GlobalConfig {
            read_buffer_size: 4096,
            max_message_size: 1024,
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap_err().code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "port = 1").unwrap();

        assert!(GlobalConfig::load(file.path()).is_err());
    }
}
