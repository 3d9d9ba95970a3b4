//! Session identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Opaque handle of one accepted connection.
///
/// Ids are assigned in accept order and never reused within a process, so
/// ordering by id is ordering by accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

/// Hands out fresh session ids.
#[derive(Debug)]
pub struct SessionIdGenerator {
    next: AtomicU64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SessionId {
    /// Wrap a raw id.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl SessionIdGenerator {
    /// Create a generator starting at `sess_1`.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Generate a unique session id.
    pub fn generate(&self) -> SessionId {
        SessionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess_{}", self.0)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_session_id_format() {
        let ids = SessionIdGenerator::new();
        assert_eq!(ids.generate().to_string(), "sess_1");
        assert_eq!(ids.generate().to_string(), "sess_2");
    }

    #[test]
    fn test_session_id_uniqueness() {
        let ids = SessionIdGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(ids.generate()), "Duplicate session ID generated");
        }
    }

    #[test]
    fn test_session_id_ordering() {
        let ids = SessionIdGenerator::new();
        let first = ids.generate();
        let second = ids.generate();
        assert!(first < second);
    }
}
