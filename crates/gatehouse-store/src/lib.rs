//! Durable stores for Gatehouse accounts and characters.
//!
//! Three seams, all implemented by each backend:
//!
//! - [`CredentialStore`] — username ↔ account, unique on username.
//! - [`PlayerStore`] — characters, each owned by one account, unique on
//!   name, capped per owner.
//! - [`AccountPurge`] — the one multi-row unit of work: delete an account
//!   together with all of its characters, or nothing at all.
//!
//! Backends:
//!
//! - [`SqliteStore`] — the persistent store (`sqlx` + SQLite). Uniqueness
//!   and the per-owner cap are enforced by the database itself.
//! - [`MemoryStore`] — an in-process double with identical semantics, for
//!   tests and demos. Selected by construction, never as a global.

mod error;
mod memory;
mod model;
mod sqlite;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{Account, Character, DEFAULT_HP};
pub use sqlite::SqliteStore;
pub use store::{AccountPurge, CredentialStore, Persistence, PlayerStore};
