//! Wire protocol for Gatehouse.
//!
//! This crate defines the "language" that game clients, gameplay servers
//! and the account gateway speak:
//!
//! - **Identity types** ([`AccountId`], [`PlayerId`], [`Username`],
//!   [`Password`], [`Ticket`], [`CharacterName`]) — distinct newtypes so
//!   a ticket can never be passed where a username is expected.
//! - **Messages** ([`Request`], [`Response`], [`Envelope`]) — one request
//!   variant per gateway operation, one response shape per outcome.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`], [`ErrorKind`]) — codec failures and
//!   the failure taxonomy reported to callers.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (Envelope<Request>) → AuthService
//! ```
//!
//! The protocol layer knows nothing about stores or sessions. It only
//! describes what travels between the gateway and its callers.

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{ErrorKind, ProtocolError};
pub use messages::{CharacterSnapshot, Envelope, Request, Response};
pub use types::{
    AccountId, CharacterName, Password, PlayerId, Ticket, Username,
};
