//! Session management.

mod id;
mod registry;
mod session;

pub use id::{SessionId, SessionIdGenerator};
pub use registry::SessionRegistry;
pub use session::{Session, SessionInfo, TransferGuard};
