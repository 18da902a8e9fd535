//! Error types for the protocol layer.
//!
//! Two different things live here:
//!
//! - [`ProtocolError`] — what went wrong turning bytes into messages (or
//!   back). These never reach the account logic.
//! - [`ErrorKind`] — the failure taxonomy the gateway reports to callers.
//!   It's part of the wire format, so it lives next to the messages.

use serde::{Deserialize, Serialize};

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, an
    /// unknown `op`, or a truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// The category of a failed gateway operation.
///
/// Serialized in `snake_case` (`"limit_exceeded"`), which client SDKs
/// match on. The status codes follow HTTP conventions so an HTTP front
/// end can pass them through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input. Never worth retrying unchanged.
    Validation,
    /// The referenced resource doesn't exist.
    NotFound,
    /// Duplicate username or character name.
    Conflict,
    /// Bad credentials, or an invalid/expired ticket.
    Authentication,
    /// Valid session, but the resource belongs to another account.
    Authorization,
    /// The account already owns the maximum number of characters.
    LimitExceeded,
    /// A store or transaction failed. Details stay in the server log.
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Authentication => 401,
            Self::Authorization => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::LimitExceeded => 422,
            Self::Internal => 500,
        }
    }
}
