//! Error types for the gateway.
//!
//! - [`AuthError`] is the taxonomy every account operation reports. Its
//!   `Display` text is what the caller sees, so it never carries store
//!   internals.
//! - [`GatehouseError`] wraps the sub-crate errors for startup and the
//!   server loop, where the failure is ours rather than the caller's.

use gatehouse_protocol::{ErrorKind, ProtocolError};
use gatehouse_session::SessionError;
use gatehouse_store::StoreError;

/// Message for every credential failure. Identical for "no such user"
/// and "wrong password" so responses don't reveal which usernames exist.
pub const BAD_CREDENTIALS: &str = "invalid username or password";

/// Message for tickets that are unknown, expired, revoked, or whose
/// account no longer exists.
pub const INVALID_TICKET: &str = "invalid or expired session ticket";

/// Failure of an account or character operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Malformed input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate username or character name.
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials or an unusable ticket. Only ever one of the two
    /// fixed messages above.
    #[error("{0}")]
    Authentication(&'static str),

    /// Valid session, wrong owner.
    #[error("{0}")]
    Authorization(String),

    #[error("character limit of {0} reached")]
    LimitExceeded(usize),

    /// Store or transaction failure. Details go to the event log only.
    #[error("internal error")]
    Internal,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::LimitExceeded(_) => ErrorKind::LimitExceeded,
            Self::Internal => ErrorKind::Internal,
        }
    }

    pub(crate) fn bad_credentials() -> Self {
        Self::Authentication(BAD_CREDENTIALS)
    }

    pub(crate) fn invalid_ticket() -> Self {
        Self::Authentication(INVALID_TICKET)
    }
}

/// Top-level error for running a gateway.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` lifts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GatehouseError {
    /// Binding or accepting sockets failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The WebSocket handshake or a frame failed.
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Encoding or decoding a frame failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Opening or migrating the durable store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// An environment variable held an unusable value.
    #[error("invalid configuration: {0}")]
    Config(String),
}
