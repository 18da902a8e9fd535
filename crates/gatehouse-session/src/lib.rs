//! Session tickets for Gatehouse.
//!
//! A session ticket is the only credential a client holds after
//! register/login. This crate owns its lifecycle:
//!
//! 1. **Issuance** — a fresh 128-bit random ticket per login
//!    ([`SessionStore::issue`]). Earlier tickets of the same account stay
//!    valid; concurrent sessions are allowed.
//! 2. **Resolution** — ticket → account, or nothing once the TTL elapsed
//!    ([`SessionStore::resolve`]).
//! 3. **Revocation** — logout removes one ticket, account deletion
//!    removes all of them ([`SessionStore::revoke`],
//!    [`SessionStore::revoke_all`]).
//!
//! Two stores implement [`SessionStore`]: [`MemorySessionStore`] for a
//! single gateway process and [`RedisSessionStore`] for gateways that
//! share tickets through a Redis server.
//!
//! # How it fits in the stack
//!
//! ```text
//! AuthService (above)   ← resolves tickets before every privileged call
//!     ↕
//! Session layer (this crate)   ← ticket → account, with TTL
//!     ↕
//! Protocol layer (below)   ← provides Ticket, AccountId
//! ```

mod error;
mod memory;
mod redis_store;
mod session;
mod store;

pub use error::SessionError;
pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;
pub use session::{Session, SessionConfig, SessionState};
pub use store::SessionStore;
