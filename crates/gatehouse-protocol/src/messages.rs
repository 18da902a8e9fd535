//! Request and response messages exchanged with the gateway.
//!
//! Every frame on the wire is an [`Envelope`]: a caller-chosen `id` plus
//! a body. The gateway echoes the `id` back so a client can pipeline
//! requests on one connection and still match up the replies.
//!
//! ```text
//! → {"id":7,"body":{"op":"login","username":"alice","password":"pw1"}}
//! ← {"id":7,"body":{"type":"ticket","ticket":"3f9c…"}}
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    AccountId, CharacterName, ErrorKind, Password, PlayerId, Ticket, Username,
};

/// Correlation wrapper around a request or response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Caller-chosen correlation id, echoed in the reply.
    pub id: u64,
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(id: u64, body: T) -> Self {
        Self { id, body }
    }
}

/// The public view of a character, as returned by verify, list and create.
///
/// Ownership and timestamps stay server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub player_id: PlayerId,
    pub name: CharacterName,
    pub pos_x: f32,
    pub pos_y: f32,
    pub hp: i32,
    pub max_hp: i32,
}

/// One variant per gateway operation.
///
/// Internally tagged on `op`: `{"op":"logout","ticket":"…"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Register {
        username: Username,
        password: Password,
    },
    Login {
        username: Username,
        password: Password,
    },
    /// Gameplay server asks: does this ticket own this character?
    Verify {
        ticket: Ticket,
        player_id: PlayerId,
    },
    /// Ticket-only verification; answers with the account's oldest
    /// character.
    VerifyPrimary {
        ticket: Ticket,
    },
    ListCharacters {
        ticket: Ticket,
    },
    CreateCharacter {
        ticket: Ticket,
        name: CharacterName,
    },
    Logout {
        ticket: Ticket,
    },
    DeleteAccount {
        ticket: Ticket,
        password: Password,
    },
}

impl Request {
    /// Operation name, for log fields.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Login { .. } => "login",
            Self::Verify { .. } => "verify",
            Self::VerifyPrimary { .. } => "verify_primary",
            Self::ListCharacters { .. } => "list_characters",
            Self::CreateCharacter { .. } => "create_character",
            Self::Logout { .. } => "logout",
            Self::DeleteAccount { .. } => "delete_account",
        }
    }
}

/// The outcome of a request. Tagged on `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Register and login both answer with a fresh ticket.
    Ticket { ticket: Ticket },
    Character { character: CharacterSnapshot },
    Characters { characters: Vec<CharacterSnapshot> },
    LoggedOut,
    AccountDeleted {
        account_id: AccountId,
        deleted_character_count: u64,
    },
    Error {
        kind: ErrorKind,
        code: u16,
        message: String,
    },
}

impl Response {
    /// Builds an error response, filling `code` from the kind.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            code: kind.status_code(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
