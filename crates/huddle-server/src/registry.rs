//! Shared table of live sessions and the names they have claimed.
//!
//! One `RwLock` guards both the session map and the name index, so a
//! reader never sees a name that points at a departed session, and two
//! racing claims for the same name cannot both succeed. The lock is never
//! held across an `.await`; everything done under it is a map operation or
//! a non-blocking enqueue.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_core::ids::SessionIdAllocator;
use huddle_core::{ClaimError, ServerMessage, SessionId};
use parking_lot::RwLock;
use tracing::debug;

use crate::websocket::connection::PeerConnection;

/// One live connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    /// Empty until `join-peers` succeeds. Only written under the registry's
    /// write lock.
    name: RwLock<String>,
    connection: PeerConnection,
}

impl Session {
    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Claimed name, or an empty string.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Whether the session has joined the peer stream.
    pub fn is_peer(&self) -> bool {
        !self.name.read().is_empty()
    }

    /// Outbound queue for this session.
    pub fn connection(&self) -> &PeerConnection {
        &self.connection
    }

    /// Encode and enqueue a server message.
    pub fn send(&self, message: &ServerMessage) -> bool {
        self.connection.send_message(message)
    }
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, Arc<Session>>,
    names: HashMap<String, SessionId>,
}

/// Concurrent session registry.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
    ids: SessionIdAllocator,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and add an unnamed session.
    pub fn register(&self, connection: PeerConnection) -> Arc<Session> {
        let session = Arc::new(Session {
            id: self.ids.next_id(),
            name: RwLock::new(String::new()),
            connection,
        });
        let mut inner = self.inner.write();
        let _ = inner.sessions.insert(session.id, Arc::clone(&session));
        debug!(session_id = %session.id, total = inner.sessions.len(), "session registered");
        session
    }

    /// Remove a session and free its name. Returns the removed session so the
    /// caller can see whether it had joined.
    pub fn unregister(&self, id: SessionId) -> Option<Arc<Session>> {
        let mut inner = self.inner.write();
        let session = inner.sessions.remove(&id)?;
        let name = session.name();
        if !name.is_empty() && inner.names.get(&name) == Some(&id) {
            let _ = inner.names.remove(&name);
        }
        debug!(session_id = %id, total = inner.sessions.len(), "session unregistered");
        Some(session)
    }

    /// Look a session up by id.
    pub fn lookup_by_id(&self, id: SessionId) -> Option<Arc<Session>> {
        self.inner.read().sessions.get(&id).cloned()
    }

    /// Look a session up by claimed name.
    pub fn lookup_by_name(&self, name: &str) -> Option<Arc<Session>> {
        let inner = self.inner.read();
        let id = inner.names.get(name)?;
        inner.sessions.get(id).cloned()
    }

    /// Claim `name` for session `id`.
    ///
    /// Re-claiming the name already held is a no-op. Claiming a different
    /// name frees the previous one.
    pub fn claim_name(&self, id: SessionId, name: &str) -> Result<(), ClaimError> {
        if name.trim().is_empty() {
            return Err(ClaimError::Blank);
        }
        let mut inner = self.inner.write();
        let session = inner
            .sessions
            .get(&id)
            .cloned()
            .ok_or(ClaimError::NotRegistered)?;
        if let Some(holder) = inner.names.get(name) {
            if *holder != id {
                return Err(ClaimError::Duplicate(name.to_owned()));
            }
        }
        let previous = std::mem::replace(&mut *session.name.write(), name.to_owned());
        if !previous.is_empty() && previous != name {
            let _ = inner.names.remove(&previous);
        }
        let _ = inner.names.insert(name.to_owned(), id);
        Ok(())
    }

    /// Clear the name of session `id`. Returns the released name, or `None`
    /// if the session had none or is not registered.
    pub fn release_name(&self, id: SessionId) -> Option<String> {
        let mut inner = self.inner.write();
        let session = inner.sessions.get(&id).cloned()?;
        let previous = std::mem::take(&mut *session.name.write());
        if previous.is_empty() {
            return None;
        }
        let _ = inner.names.remove(&previous);
        Some(previous)
    }

    /// Sessions that have joined the peer stream.
    pub fn active_count(&self) -> usize {
        self.inner.read().names.len()
    }

    /// All registered sessions, named or not.
    pub fn connection_count(&self) -> usize {
        self.inner.read().sessions.len()
    }

    /// Snapshot of every session except `origin`.
    pub fn others(&self, origin: SessionId) -> Vec<Arc<Session>> {
        self.inner
            .read()
            .sessions
            .values()
            .filter(|s| s.id != origin)
            .cloned()
            .collect()
    }

    /// Call `f` for every session except `origin`.
    ///
    /// Works from a snapshot, so `f` runs without the lock held and may
    /// itself use the registry.
    pub fn for_each_other(&self, origin: SessionId, mut f: impl FnMut(&Session)) {
        for session in self.others(origin) {
            f(&session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::sync::mpsc;

    fn connect(registry: &SessionRegistry) -> (Arc<Session>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(16);
        (registry.register(PeerConnection::new(tx)), rx)
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        let (b, _rb) = connect(&registry);
        assert_eq!(a.id(), SessionId::from_raw(0));
        assert_eq!(b.id(), SessionId::from_raw(1));
        assert_eq!(registry.connection_count(), 2);
        assert_eq!(registry.active_count(), 0);
        assert!(!a.is_peer());
    }

    #[test]
    fn ids_not_reused_after_unregister() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        let _ = registry.unregister(a.id());
        let (b, _rb) = connect(&registry);
        assert_eq!(b.id(), SessionId::from_raw(1));
    }

    #[test]
    fn claim_and_lookup_by_name() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        registry.claim_name(a.id(), "alice").unwrap();
        assert_eq!(a.name(), "alice");
        assert!(a.is_peer());
        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.lookup_by_name("alice").unwrap().id(), a.id());
        assert!(registry.lookup_by_name("bob").is_none());
    }

    #[test]
    fn blank_names_rejected() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        assert_eq!(registry.claim_name(a.id(), ""), Err(ClaimError::Blank));
        assert_eq!(registry.claim_name(a.id(), "  \t"), Err(ClaimError::Blank));
        assert!(!a.is_peer());
    }

    #[test]
    fn duplicate_name_rejected() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        let (b, _rb) = connect(&registry);
        registry.claim_name(a.id(), "alice").unwrap();
        assert_matches!(
            registry.claim_name(b.id(), "alice"),
            Err(ClaimError::Duplicate(name)) if name == "alice"
        );
        assert_eq!(b.name(), "");
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn reclaiming_own_name_is_ok() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        registry.claim_name(a.id(), "alice").unwrap();
        registry.claim_name(a.id(), "alice").unwrap();
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn renaming_frees_previous_name() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        let (b, _rb) = connect(&registry);
        registry.claim_name(a.id(), "alice").unwrap();
        registry.claim_name(a.id(), "alicia").unwrap();
        assert!(registry.lookup_by_name("alice").is_none());
        registry.claim_name(b.id(), "alice").unwrap();
        assert_eq!(registry.active_count(), 2);
    }

    #[test]
    fn claim_for_unknown_session() {
        let registry = SessionRegistry::new();
        assert_eq!(
            registry.claim_name(SessionId::from_raw(99), "ghost"),
            Err(ClaimError::NotRegistered)
        );
    }

    #[test]
    fn release_name_is_idempotent() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        assert_eq!(registry.release_name(a.id()), None);
        registry.claim_name(a.id(), "alice").unwrap();
        assert_eq!(registry.release_name(a.id()).as_deref(), Some("alice"));
        assert_eq!(registry.release_name(a.id()), None);
        assert!(registry.lookup_by_name("alice").is_none());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn unregister_frees_name() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        let (b, _rb) = connect(&registry);
        registry.claim_name(a.id(), "alice").unwrap();
        let removed = registry.unregister(a.id()).unwrap();
        assert!(removed.is_peer());
        assert!(registry.lookup_by_id(a.id()).is_none());
        assert!(registry.unregister(a.id()).is_none());
        registry.claim_name(b.id(), "alice").unwrap();
    }

    #[test]
    fn others_excludes_origin() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        let (b, _rb) = connect(&registry);
        let (c, _rc) = connect(&registry);
        let mut seen = Vec::new();
        registry.for_each_other(b.id(), |s| seen.push(s.id()));
        seen.sort();
        assert_eq!(seen, vec![a.id(), c.id()]);
    }

    #[test]
    fn for_each_other_may_reenter_registry() {
        let registry = SessionRegistry::new();
        let (a, _ra) = connect(&registry);
        let (_b, _rb) = connect(&registry);
        registry.for_each_other(a.id(), |s| {
            registry.claim_name(s.id(), "nested").unwrap();
        });
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn concurrent_claims_single_winner() {
        let registry = Arc::new(SessionRegistry::new());
        let mut sessions = Vec::new();
        for _ in 0..16 {
            sessions.push(connect(&registry));
        }
        let handles: Vec<_> = sessions
            .iter()
            .map(|(s, _)| {
                let registry = Arc::clone(&registry);
                let id = s.id();
                std::thread::spawn(move || registry.claim_name(id, "popular").is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.active_count(), 1);
    }
}
