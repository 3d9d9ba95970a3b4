//! Listener
//!
//! A single-operator TCP control point. Remote agents connect in, each
//! connection is tracked as a session, and the operator picks one session at
//! a time to run commands on or move files to and from.
//!
//! # Features
//!
//! - **Multi-Session Support**: Any number of peers stay connected while the operator works with one
//! - **Line Protocol**: Colon-delimited text messages (`SHELL_COMMAND`, `FILE_CONTENT`, ...)
//! - **File Transfer**: Whole-file base64 uploads and downloads, saved atomically
//! - **Non-Blocking Output**: Peer replies are rendered as they arrive, whatever the console is doing
//!
//! There is no authentication or encryption; run it only on networks you control.

pub mod config;
pub mod console;
pub mod listener;
pub mod protocol;
pub mod session;
pub mod transfer;
pub mod types;

pub use config::GlobalConfig;
pub use console::{Console, ConsoleState};
pub use listener::{Listener, ListenerEvent};
pub use session::{SessionId, SessionInfo, SessionRegistry};
pub use types::{ListenerError, Result};
