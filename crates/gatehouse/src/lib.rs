//! # Gatehouse
//!
//! Account and session gateway for an online game.
//!
//! Players register and log in here, receive a short-lived session
//! ticket, and manage a small roster of characters. Gameplay servers
//! never see passwords: they ask Gatehouse whether a ticket is live and
//! owns the character a client wants to play.
//!
//! The crate composes the lower layers:
//!
//! - [`gatehouse_protocol`] — wire types and codec.
//! - [`gatehouse_session`] — ticket issuance and TTL expiry.
//! - [`gatehouse_store`] — durable accounts and characters.
//!
//! and adds the [`AuthService`] operations, request dispatch, and a
//! WebSocket [`GatehouseServer`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gatehouse::prelude::*;
//!
//! # async fn start() -> Result<(), GatehouseError> {
//! let store = SqliteStore::connect("sqlite://gatehouse.db").await?;
//! let service = AuthService::new(store, MemorySessionStore::default());
//!
//! let server = GatehouseServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(service)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod gateway;
mod handler;
mod log;
mod password;
mod rules;
mod server;
mod service;

pub use config::{AuthConfig, GatehouseConfig, ServerConfig};
pub use error::{AuthError, BAD_CREDENTIALS, GatehouseError, INVALID_TICKET};
pub use log::{EventLog, LogLevel, TracingLog};
pub use password::{Argon2Hasher, PasswordError, PasswordHasher};
pub use server::{GatehouseServer, GatehouseServerBuilder};
pub use service::{AccountDeletion, AuthService};

/// Convenient imports for running a gateway.
///
/// ```rust
/// use gatehouse::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AccountDeletion, Argon2Hasher, AuthConfig, AuthError, AuthService, EventLog,
        GatehouseConfig, GatehouseError, GatehouseServer, GatehouseServerBuilder, LogLevel,
        PasswordHasher, ServerConfig, TracingLog,
    };

    pub use gatehouse_protocol::{
        AccountId, CharacterName, CharacterSnapshot, Codec, Envelope, ErrorKind, JsonCodec,
        Password, PlayerId, Request, Response, Ticket, Username,
    };

    pub use gatehouse_session::{
        MemorySessionStore, RedisSessionStore, SessionConfig, SessionStore,
    };

    pub use gatehouse_store::{
        AccountPurge, CredentialStore, MemoryStore, Persistence, PlayerStore, SqliteStore,
    };
}

pub use gatehouse_protocol;
pub use gatehouse_session;
pub use gatehouse_store;
