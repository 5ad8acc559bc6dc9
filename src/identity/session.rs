use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use crate::tprintln;

use super::principal::Principal;

pub type SessionToken = String;

/// Fixed session lifetime: 24 hours.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_token() -> String {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Process-wide session state, owned by the server and handed to request
/// handlers by reference. Not a global: constructing two stores yields two
/// independent session universes, which is what deterministic tests want.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self { Self::with_ttl(SESSION_TTL) }
}

impl SessionStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()) }
    }

    /// Mint a session for an authenticated principal and return it.
    /// The caller hands the token to the client as an opaque cookie value.
    pub fn create(&self, principal: Principal) -> Session {
        let now = Instant::now();
        let token = gen_token();
        let sess = Session {
            token: token.clone(),
            principal,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(token, sess.clone());
        tprintln!("session.create user={} ttl_secs={}", sess.principal.username, self.ttl.as_secs());
        sess
    }

    /// Resolve a token to its principal. Expired sessions are treated as
    /// absent and dropped lazily on this lookup; no background sweep runs.
    pub fn resolve(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        let mut drop_key: Option<String> = None;
        let out = {
            let map = self.sessions.read();
            if let Some(sess) = map.get(token) {
                if sess.expires_at > now {
                    Some(sess.principal.clone())
                } else {
                    drop_key = Some(token.to_string());
                    None
                }
            } else { None }
        };
        if let Some(k) = drop_key {
            self.sessions.write().remove(&k);
        }
        out
    }

    /// Remove a session unconditionally. Destroying an unknown or expired
    /// token is a no-op.
    pub fn destroy(&self, token: &str) {
        if self.sessions.write().remove(token).is_some() {
            tprintln!("session.destroy token_len={}", token.len());
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize { self.sessions.read().len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    fn alice() -> Principal { Principal::new("admin", Role::Admin) }

    #[test]
    fn create_then_resolve_round_trips() {
        let store = SessionStore::default();
        let sess = store.create(alice());
        let p = store.resolve(&sess.token).expect("token resolves");
        assert_eq!(p.username, "admin");
        assert_eq!(p.role, Role::Admin);
    }

    #[test]
    fn unknown_token_resolves_to_none() {
        let store = SessionStore::default();
        assert!(store.resolve("no-such-token").is_none());
    }

    #[test]
    fn expired_session_is_dropped_lazily() {
        let store = SessionStore::with_ttl(Duration::from_millis(0));
        let sess = store.create(alice());
        assert_eq!(store.len(), 1);
        assert!(store.resolve(&sess.token).is_none());
        // The lookup above removed the dead entry
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn destroy_is_idempotent() {
        let store = SessionStore::default();
        let sess = store.create(alice());
        store.destroy(&sess.token);
        assert!(store.resolve(&sess.token).is_none());
        // Second destroy of the same token is a no-op, not an error
        store.destroy(&sess.token);
        store.destroy("never-existed");
    }

    #[test]
    fn tokens_are_unique_and_opaque() {
        let store = SessionStore::default();
        let a = store.create(alice());
        let b = store.create(alice());
        assert_ne!(a.token, b.token);
        assert!(a.token.len() >= 40);
    }
}
