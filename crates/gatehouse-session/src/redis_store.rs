//! Session store on a Redis server.
//!
//! Lets several gateway instances share tickets. Layout:
//!
//! ```text
//! session:{ticket}          → account id        (PX = ttl)
//! session-index:{account}   → set of session keys (PX = ttl, refreshed per issue)
//! ```
//!
//! Redis expires session keys itself. Every operation that touches both
//! keys runs as one Lua script, so it is atomic on the server.

use gatehouse_protocol::{AccountId, Ticket};
use redis::AsyncCommands;
use redis::Script;
use redis::aio::ConnectionManager;

use crate::memory::generate_ticket;
use crate::{SessionConfig, SessionError, SessionStore};

const INDEX_PREFIX: &str = "session-index:";

/// KEYS: session key, index key. ARGV: account id, ttl in ms.
/// Returns 0 if the session key is already taken.
const ISSUE_SCRIPT: &str = r"
if not redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[2], 'NX') then
    return 0
end
redis.call('SADD', KEYS[2], KEYS[1])
redis.call('PEXPIRE', KEYS[2], ARGV[2])
return 1
";

/// KEYS: session key. ARGV: index prefix.
const REVOKE_SCRIPT: &str = r"
local account = redis.call('GET', KEYS[1])
if not account then
    return 0
end
redis.call('DEL', KEYS[1])
redis.call('SREM', ARGV[1] .. account, KEYS[1])
return 1
";

/// KEYS: index key. Returns how many member keys were still live.
const REVOKE_ALL_SCRIPT: &str = r"
local live = 0
for _, key in ipairs(redis.call('SMEMBERS', KEYS[1])) do
    live = live + redis.call('DEL', key)
end
redis.call('DEL', KEYS[1])
return live
";

/// KEYS: index key. Drops members whose session key has expired.
const PRUNE_SCRIPT: &str = r"
local pruned = 0
for _, key in ipairs(redis.call('SMEMBERS', KEYS[1])) do
    if redis.call('EXISTS', key) == 0 then
        redis.call('SREM', KEYS[1], key)
        pruned = pruned + 1
    end
end
return pruned
";

/// A [`SessionStore`] on a Redis server, shared by every gateway that
/// points at it.
///
/// `sweep_threshold` from [`SessionConfig`] is unused: Redis evicts
/// expired keys on its own.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    config: SessionConfig,
    ttl_ms: u64,
    issue_script: Script,
    revoke_script: Script,
    revoke_all_script: Script,
    prune_script: Script,
}

impl RedisSessionStore {
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    /// [`SessionError::InvalidTtl`] as for [`new`](Self::new), checked
    /// before connecting, or [`SessionError::Backend`] if the URL is bad
    /// or the server can't be reached.
    pub async fn connect(url: &str, config: SessionConfig) -> Result<Self, SessionError> {
        let ttl_ms = ttl_millis(&config)?;
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(ttl_ms, "connected to redis session store");
        Ok(Self::with_ttl(conn, config, ttl_ms))
    }

    /// Wraps an existing connection.
    ///
    /// # Errors
    /// [`SessionError::InvalidTtl`] if the TTL is under one millisecond
    /// or too large for a Redis expiry.
    pub fn new(conn: ConnectionManager, config: SessionConfig) -> Result<Self, SessionError> {
        let ttl_ms = ttl_millis(&config)?;
        Ok(Self::with_ttl(conn, config, ttl_ms))
    }

    fn with_ttl(conn: ConnectionManager, config: SessionConfig, ttl_ms: u64) -> Self {
        Self {
            conn,
            config,
            ttl_ms,
            issue_script: Script::new(ISSUE_SCRIPT),
            revoke_script: Script::new(REVOKE_SCRIPT),
            revoke_all_script: Script::new(REVOKE_ALL_SCRIPT),
            prune_script: Script::new(PRUNE_SCRIPT),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// TTL as a Redis `PX` argument: at least 1 ms, at most `i64::MAX` ms.
fn ttl_millis(config: &SessionConfig) -> Result<u64, SessionError> {
    u64::try_from(config.ttl.as_millis())
        .ok()
        .filter(|ms| (1..=i64::MAX as u64).contains(ms))
        .ok_or(SessionError::InvalidTtl(config.ttl))
}

fn index_key(account_id: AccountId) -> String {
    format!("{INDEX_PREFIX}{}", account_id.0)
}

impl SessionStore for RedisSessionStore {
    async fn issue(&self, account_id: AccountId) -> Result<Ticket, SessionError> {
        let mut conn = self.conn.clone();
        let index = index_key(account_id);

        let ticket = loop {
            let candidate = generate_ticket();
            let stored: i64 = self
                .issue_script
                .key(candidate.session_key())
                .key(&index)
                .arg(account_id.0)
                .arg(self.ttl_ms)
                .invoke_async(&mut conn)
                .await?;
            if stored == 1 {
                break candidate;
            }
        };

        tracing::debug!(%account_id, %ticket, "session issued");
        Ok(ticket)
    }

    async fn resolve(&self, ticket: &Ticket) -> Result<Option<AccountId>, SessionError> {
        let mut conn = self.conn.clone();
        let account: Option<i64> = conn.get(ticket.session_key()).await?;
        Ok(account.map(AccountId))
    }

    async fn revoke(&self, ticket: &Ticket) -> Result<bool, SessionError> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .revoke_script
            .key(ticket.session_key())
            .arg(INDEX_PREFIX)
            .invoke_async(&mut conn)
            .await?;

        let revoked = removed == 1;
        if revoked {
            tracing::info!(%ticket, "session revoked");
        }
        Ok(revoked)
    }

    async fn revoke_all(&self, account_id: AccountId) -> Result<usize, SessionError> {
        let mut conn = self.conn.clone();
        let live: usize = self
            .revoke_all_script
            .key(index_key(account_id))
            .invoke_async(&mut conn)
            .await?;

        tracing::info!(%account_id, live, "all sessions revoked");
        Ok(live)
    }

    /// Session keys expire on the server; this prunes index entries that
    /// point at them and returns how many.
    async fn evict_expired(&self) -> Result<usize, SessionError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{INDEX_PREFIX}*");
        let mut cursor: u64 = 0;
        let mut pruned = 0;

        loop {
            let (next, indexes): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            for index in indexes {
                let n: usize = self
                    .prune_script
                    .key(index)
                    .invoke_async(&mut conn)
                    .await?;
                pruned += n;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!(pruned, "pruned expired session index entries");
        Ok(pruned)
    }
}
