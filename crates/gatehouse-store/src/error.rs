//! Error types for the durable stores.

use gatehouse_protocol::AccountId;

/// Errors a durable store can report.
///
/// The first three are business outcomes the store enforces atomically
/// (the service maps them onto its own taxonomy). The rest are failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique column already holds this value.
    /// `field` is `"username"` or `"character name"`.
    #[error("{field} '{value}' already exists")]
    Conflict { field: &'static str, value: String },

    /// The owner already has `limit` characters.
    #[error("account {owner} already owns {limit} characters")]
    LimitReached { owner: AccountId, limit: usize },

    /// The referenced account row doesn't exist (or vanished mid-operation).
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    /// The SQL layer failed: connection, constraint, or transaction error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A non-SQL backend failed.
    #[error("store backend failed: {0}")]
    Backend(String),
}
