//! In-process session store.
//!
//! Sessions are volatile by definition — losing them on restart only
//! forces players to log in again — so an in-process table is a real
//! deployment option for a single gateway instance, not just a test
//! double.
//!
//! # Concurrency note
//!
//! All state sits behind one `tokio::sync::Mutex`. Every operation takes
//! the lock once and does no I/O while holding it, which is what makes
//! each operation atomic per key.

use std::collections::{HashMap, HashSet};

use gatehouse_protocol::{AccountId, Ticket};
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{Session, SessionConfig, SessionError, SessionStore};

/// A [`SessionStore`] backed by in-memory hash maps.
///
/// ## Expiry
///
/// ```text
/// issue() ──→ [Active] ──(ttl)──→ [Expired] ──→ evicted on:
///                │                               - resolve()/revoke() of that ticket
///                │                               - evict_expired()
///                │                               - the sweep inside issue()
///                └──(revoke / revoke_all)──→ gone
/// ```
pub struct MemorySessionStore {
    inner: Mutex<Inner>,
    config: SessionConfig,
}

struct Inner {
    /// Sessions keyed by `"session:" + ticket`.
    sessions: HashMap<String, Session>,

    /// Index from account to the keys of its sessions, kept in sync with
    /// `sessions`. Lets `revoke_all` avoid a full scan.
    by_account: HashMap<AccountId, HashSet<String>>,

    /// Table size that triggers a sweep in `issue`.
    sweep_at: usize,
}

impl Inner {
    /// Removes one session and its index entry.
    fn remove(&mut self, key: &str) -> Option<Session> {
        let session = self.sessions.remove(key)?;
        if let Some(keys) = self.by_account.get_mut(&session.account_id) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_account.remove(&session.account_id);
            }
        }
        Some(session)
    }

    fn sweep(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| !s.is_active_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }
}

impl MemorySessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                by_account: HashMap::new(),
                sweep_at: config.sweep_threshold,
            }),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of stored sessions, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.sessions.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionStore for MemorySessionStore {
    async fn issue(&self, account_id: AccountId) -> Result<Ticket, SessionError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        if inner.sessions.len() >= inner.sweep_at {
            let evicted = inner.sweep(now);
            inner.sweep_at = (inner.sessions.len() * 2).max(self.config.sweep_threshold);
            tracing::debug!(evicted, "swept expired sessions");
        }

        // 128 random bits make a collision practically impossible, but
        // the check is a single lookup.
        let ticket = loop {
            let candidate = generate_ticket();
            if !inner.sessions.contains_key(&candidate.session_key()) {
                break candidate;
            }
        };

        let key = ticket.session_key();
        let session = Session::new(ticket.clone(), account_id, now, self.config.ttl)?;
        inner.sessions.insert(key.clone(), session);
        inner.by_account.entry(account_id).or_default().insert(key);

        tracing::debug!(%account_id, %ticket, "session issued");
        Ok(ticket)
    }

    async fn resolve(&self, ticket: &Ticket) -> Result<Option<AccountId>, SessionError> {
        let now = Instant::now();
        let key = ticket.session_key();
        let mut inner = self.inner.lock().await;

        let Some(session) = inner.sessions.get(&key) else {
            return Ok(None);
        };
        if session.is_active_at(now) {
            return Ok(Some(session.account_id));
        }

        // Lazy eviction: the first lookup after expiry cleans up.
        inner.remove(&key);
        tracing::debug!(%ticket, "session expired");
        Ok(None)
    }

    async fn revoke(&self, ticket: &Ticket) -> Result<bool, SessionError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        let revoked = inner
            .remove(&ticket.session_key())
            .is_some_and(|session| session.is_active_at(now));

        if revoked {
            tracing::info!(%ticket, "session revoked");
        }
        Ok(revoked)
    }

    async fn revoke_all(&self, account_id: AccountId) -> Result<usize, SessionError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        let keys = inner.by_account.remove(&account_id).unwrap_or_default();
        let live = keys
            .iter()
            .filter_map(|key| inner.sessions.remove(key))
            .filter(|session| session.is_active_at(now))
            .count();

        tracing::info!(%account_id, live, "all sessions revoked");
        Ok(live)
    }

    async fn evict_expired(&self) -> Result<usize, SessionError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        Ok(inner.sweep(now))
    }
}

/// Generates a random 32-character hex ticket (128 bits of entropy).
///
/// `rand::rng()` is a CSPRNG seeded from the operating system, so
/// tickets can't be predicted from earlier ones.
pub(crate) fn generate_ticket() -> Ticket {
    let bytes: [u8; 16] = rand::rng().random();
    Ticket::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

// =========================================================================
// Tests
// =========================================================================
