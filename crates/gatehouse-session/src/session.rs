//! Session types: the record behind a ticket.
//!
//! A session ties a ticket to an account for a bounded window:
//! - WHO it belongs to (`AccountId`)
//! - WHICH ticket proves it (`Ticket`)
//! - WHEN it stops working (`expires_at`)
//!
//! Sessions are immutable once issued. There is no renewal and no
//! sliding expiration.

use std::time::Duration;

use gatehouse_protocol::{AccountId, Ticket};
use tokio::time::Instant;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session stores.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a ticket stays valid after issuance.
    ///
    /// Default: 1 hour.
    pub ttl: Duration,

    /// Table size at which `issue` sweeps expired entries before
    /// inserting. After a sweep the mark moves to twice the surviving
    /// size, so sweeping stays amortized O(1) per issue.
    ///
    /// Default: 1024.
    pub sweep_threshold: usize,
}

impl SessionConfig {
    /// Longest TTL a gateway accepts from its configuration: 30 days.
    pub const MAX_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            sweep_threshold: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a stored session is in its lifecycle.
///
/// ```text
///   Active ──(ttl elapses)──→ Expired ──(evicted)──→ gone
///      │
///      └──────(revoked)──────────────────────────→ gone
/// ```
///
/// Revocation deletes the entry outright, so a revoked session is never
/// observed in a state — it simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Within its TTL. The ticket resolves.
    Active,
    /// TTL elapsed. The store treats it as absent and evicts it.
    Expired,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One issued ticket and the account it resolves to.
#[derive(Debug, Clone)]
pub struct Session {
    pub ticket: Ticket,
    pub account_id: AccountId,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

impl Session {
    /// Creates a session issued at `now` that lives for `ttl`.
    ///
    /// # Errors
    /// [`SessionError::InvalidTtl`] if `now + ttl` is not representable.
    pub fn new(
        ticket: Ticket,
        account_id: AccountId,
        now: Instant,
        ttl: Duration,
    ) -> Result<Self, SessionError> {
        let expires_at = now
            .checked_add(ttl)
            .ok_or(SessionError::InvalidTtl(ttl))?;
        Ok(Self {
            ticket,
            account_id,
            issued_at: now,
            expires_at,
        })
    }

    /// State of this session at `now`. Expiry is inclusive: a session
    /// with a zero TTL is already expired at the instant it's issued.
    pub fn state_at(&self, now: Instant) -> SessionState {
        if now >= self.expires_at {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }

    pub fn is_active_at(&self, now: Instant) -> bool {
        self.state_at(now) == SessionState::Active
    }
}
