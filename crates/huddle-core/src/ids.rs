//! Session identifiers.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identity of one connected session.
///
/// Serialized as a bare JSON number so browsers can compare ids directly.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw numeric id.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The numeric value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Hands out session ids in increasing order, starting at 0.
///
/// Ids are never reused, even after the session holding one disconnects.
#[derive(Debug, Default)]
pub struct SessionIdAllocator {
    next: AtomicU64,
}

impl SessionIdAllocator {
    /// Create an allocator whose first id is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> SessionId {
        SessionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn allocator_starts_at_zero() {
        let alloc = SessionIdAllocator::new();
        assert_eq!(alloc.next_id(), SessionId::from_raw(0));
        assert_eq!(alloc.next_id(), SessionId::from_raw(1));
        assert_eq!(alloc.next_id(), SessionId::from_raw(2));
    }

    #[test]
    fn allocator_unique_across_threads() {
        let alloc = Arc::new(SessionIdAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || (0..500).map(|_| alloc.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&SessionId::from_raw(7)).unwrap();
        assert_eq!(json, "7");
        let back: SessionId = serde_json::from_str("7").unwrap();
        assert_eq!(back.as_u64(), 7);
    }

    #[test]
    fn display_and_parse() {
        let id = SessionId::from_raw(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<SessionId>().unwrap(), id);
        assert!("abc".parse::<SessionId>().is_err());
    }
}
