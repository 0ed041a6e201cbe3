use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use tracing::debug;

use super::context::SessionContext;

/// Handle to a session as stored in the registry. The connection task that
/// created it is the only one expected to hold the lock for long.
pub type SharedSession = Arc<Mutex<SessionContext>>;

/// Process-wide lookup tables for live sessions: by client endpoint and by
/// claimed nickname.
///
/// Built once at startup and shared with every connection handler. Lookups
/// hand back a cloned handle, so no map shard stays locked while the caller
/// waits on the session or on Slack.
#[derive(Default)]
pub struct SessionRegistry {
    by_endpoint: DashMap<SocketAddr, SharedSession>,
    by_nick: DashMap<String, SharedSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── By endpoint ─────────────────────────────────────────────────

    /// Register a session for an endpoint. Replaces any existing entry and
    /// returns it.
    pub fn register_endpoint(
        &self,
        peer: SocketAddr,
        session: SharedSession,
    ) -> Option<SharedSession> {
        self.by_endpoint.insert(peer, session)
    }

    pub fn lookup_endpoint(&self, peer: &SocketAddr) -> Option<SharedSession> {
        self.by_endpoint.get(peer).map(|s| s.clone())
    }

    pub fn unregister_endpoint(&self, peer: &SocketAddr) -> Option<SharedSession> {
        self.by_endpoint.remove(peer).map(|(_, s)| s)
    }

    // ── By nickname ─────────────────────────────────────────────────

    /// Register a session under a nickname. Last write wins; uniqueness is
    /// checked by the caller with [`SessionRegistry::is_nick_available`].
    pub fn register_nick(&self, nick: &str, session: SharedSession) -> Option<SharedSession> {
        self.by_nick.insert(nick.to_string(), session)
    }

    /// Register a session under a nickname only if nobody holds it.
    pub fn claim_nick(&self, nick: &str, session: SharedSession) -> bool {
        match self.by_nick.entry(nick.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(session);
                true
            }
        }
    }

    pub fn lookup_nick(&self, nick: &str) -> Option<SharedSession> {
        self.by_nick.get(nick).map(|s| s.clone())
    }

    pub fn unregister_nick(&self, nick: &str) -> Option<SharedSession> {
        self.by_nick.remove(nick).map(|(_, s)| s)
    }

    pub fn is_nick_available(&self, nick: &str) -> bool {
        !self.by_nick.contains_key(nick)
    }

    /// Move a session from `old` to `new`. Fails if `new` belongs to a
    /// different session.
    pub fn rename_nick(
        &self,
        old: &str,
        new: &str,
        session: &SharedSession,
    ) -> Result<(), String> {
        match self.by_nick.entry(new.to_string()) {
            Entry::Occupied(entry) if !Arc::ptr_eq(entry.get(), session) => {
                return Err(format!("Nickname {new} is already in use"));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(session.clone());
            }
        }
        if old != new {
            self.by_nick.remove_if(old, |_, s| Arc::ptr_eq(s, session));
        }
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Remove a session from both tables on disconnect. Entries that have
    /// since been taken over by another session are left alone.
    pub fn unregister_session(&self, peer: &SocketAddr, nick: &str, session: &SharedSession) {
        self.by_endpoint.remove_if(peer, |_, s| Arc::ptr_eq(s, session));
        self.by_nick.remove_if(nick, |_, s| Arc::ptr_eq(s, session));
        debug!(%peer, %nick, remaining = self.by_endpoint.len(), "session unregistered");
    }

    pub fn session_count(&self) -> usize {
        self.by_endpoint.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::fake::FakeSlack;

    fn session(peer: &str, nick: &str) -> SharedSession {
        Arc::new(Mutex::new(SessionContext::new(
            peer.parse().unwrap(),
            nick.into(),
            nick.into(),
            String::new(),
            "slirc".into(),
            Arc::new(FakeSlack::default()),
        )))
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_endpoint_last_write_wins_then_unregister() {
        let registry = SessionRegistry::new();
        let a = session("10.0.0.1:4000", "alice");
        let b = session("10.0.0.1:4000", "bob");
        let ep = addr("10.0.0.1:4000");

        assert!(registry.register_endpoint(ep, a.clone()).is_none());
        let replaced = registry.register_endpoint(ep, b.clone()).unwrap();
        assert!(Arc::ptr_eq(&replaced, &a));

        let found = registry.lookup_endpoint(&ep).unwrap();
        assert!(Arc::ptr_eq(&found, &b));
        assert_eq!(found.lock().await.nick, "bob");

        registry.unregister_endpoint(&ep);
        assert!(registry.lookup_endpoint(&ep).is_none());
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_nick_registration_and_availability() {
        let registry = SessionRegistry::new();
        let a = session("10.0.0.1:4000", "alice");

        assert!(registry.is_nick_available("alice"));
        registry.register_nick("alice", a.clone());
        assert!(!registry.is_nick_available("alice"));
        assert!(Arc::ptr_eq(&registry.lookup_nick("alice").unwrap(), &a));

        registry.unregister_nick("alice");
        assert!(registry.is_nick_available("alice"));
        assert!(registry.lookup_nick("alice").is_none());
    }

    #[test]
    fn test_claim_nick_is_exclusive() {
        let registry = SessionRegistry::new();
        let a = session("10.0.0.1:4000", "alice");
        let b = session("10.0.0.2:4000", "alice");

        assert!(registry.claim_nick("alice", a.clone()));
        assert!(!registry.claim_nick("alice", b));
        assert!(Arc::ptr_eq(&registry.lookup_nick("alice").unwrap(), &a));
    }

    #[test]
    fn test_rename_nick() {
        let registry = SessionRegistry::new();
        let a = session("10.0.0.1:4000", "alice");
        let b = session("10.0.0.2:4000", "bob");
        registry.register_nick("alice", a.clone());
        registry.register_nick("bob", b.clone());

        assert!(registry.rename_nick("alice", "bob", &a).is_err());
        assert!(Arc::ptr_eq(&registry.lookup_nick("alice").unwrap(), &a));

        registry.rename_nick("alice", "ally", &a).unwrap();
        assert!(registry.lookup_nick("alice").is_none());
        assert!(Arc::ptr_eq(&registry.lookup_nick("ally").unwrap(), &a));

        // Renaming to the current nick is a no-op.
        registry.rename_nick("ally", "ally", &a).unwrap();
        assert!(Arc::ptr_eq(&registry.lookup_nick("ally").unwrap(), &a));
    }

    #[test]
    fn test_unregister_session_leaves_newer_owner() {
        let registry = SessionRegistry::new();
        let old = session("10.0.0.1:4000", "alice");
        let new = session("10.0.0.1:4000", "alice");
        let ep = addr("10.0.0.1:4000");

        registry.register_endpoint(ep, old.clone());
        registry.register_nick("alice", old.clone());
        registry.register_endpoint(ep, new.clone());
        registry.register_nick("alice", new.clone());

        registry.unregister_session(&ep, "alice", &old);
        assert!(Arc::ptr_eq(&registry.lookup_endpoint(&ep).unwrap(), &new));
        assert!(Arc::ptr_eq(&registry.lookup_nick("alice").unwrap(), &new));

        registry.unregister_session(&ep, "alice", &new);
        assert!(registry.lookup_endpoint(&ep).is_none());
        assert!(registry.is_nick_available("alice"));
    }

    #[tokio::test]
    async fn test_concurrent_register_and_lookup() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();
        for i in 0..32u16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let peer = format!("10.0.1.{}:{}", i, 5000 + i);
                let nick = format!("user{i}");
                let s = session(&peer, &nick);
                registry.register_endpoint(addr(&peer), s.clone());
                registry.register_nick(&nick, s.clone());
                assert!(registry.lookup_nick(&nick).is_some());
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(registry.session_count(), 32);
    }
}
