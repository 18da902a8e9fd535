//! The session store seam.

use std::future::Future;

use gatehouse_protocol::{AccountId, Ticket};

use crate::SessionError;

/// A TTL-keyed mapping from ticket to account.
///
/// Each operation is atomic per key. No cross-key transactions are
/// offered or needed: the service orders revocation after durable
/// writes itself.
///
/// Implementations decide how expiry happens (lazy eviction, native key
/// TTLs on a key/value server, ...). Callers only rely on `resolve`
/// returning `None` once the TTL has elapsed.
pub trait SessionStore: Send + Sync + 'static {
    /// Mints a new random ticket bound to `account_id`.
    ///
    /// Never invalidates other tickets of the same account.
    fn issue(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Ticket, SessionError>> + Send;

    /// Returns the account behind `ticket`, or `None` if the ticket is
    /// unknown, revoked, or past its TTL.
    fn resolve(
        &self,
        ticket: &Ticket,
    ) -> impl Future<Output = Result<Option<AccountId>, SessionError>> + Send;

    /// Removes `ticket`. Returns `true` iff a live session was removed.
    fn revoke(
        &self,
        ticket: &Ticket,
    ) -> impl Future<Output = Result<bool, SessionError>> + Send;

    /// Removes every ticket of `account_id`, returning how many were live.
    fn revoke_all(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<usize, SessionError>> + Send;

    /// Drops every entry whose TTL has elapsed, returning how many.
    fn evict_expired(
        &self,
    ) -> impl Future<Output = Result<usize, SessionError>> + Send;
}
