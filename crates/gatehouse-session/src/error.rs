//! Error types for the session layer.

/// Errors a session store can report.
///
/// The in-memory store only fails on an unusable TTL; the Redis store
/// surfaces server and connection failures through [`Backend`].
///
/// [`Backend`]: SessionError::Backend
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backing key/value service failed or was unreachable.
    #[error("session backend failed: {0}")]
    Backend(String),

    /// The configured TTL can't be added to the current time.
    #[error("session ttl {0:?} is out of range")]
    InvalidTtl(std::time::Duration),
}

impl From<redis::RedisError> for SessionError {
    fn from(e: redis::RedisError) -> Self {
        SessionError::Backend(e.to_string())
    }
}
