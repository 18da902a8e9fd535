//! Gateway configuration.
//!
//! Every setting has a default, so `GatehouseConfig::default()` runs a
//! working gateway on localhost. [`GatehouseConfig::from_env`] overrides
//! individual settings from `GATEHOUSE_*` variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use gatehouse_session::SessionConfig;

use crate::GatehouseError;

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

/// Limits enforced by [`AuthService`](crate::AuthService).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Characters one account may own at the same time.
    ///
    /// Default: 3.
    pub max_characters: usize,

    /// Inclusive bounds on character-name length, in characters.
    ///
    /// Default: 2 to 20.
    pub character_name_min: usize,
    pub character_name_max: usize,

    /// Upper bound on username length, in characters.
    ///
    /// Default: 32.
    pub username_max: usize,

    /// Upper bound on password length, in bytes. Keeps a caller from
    /// feeding megabytes into the hasher.
    ///
    /// Default: 128.
    pub password_max: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_characters: 3,
            character_name_min: 2,
            character_name_max: 20,
            username_max: 32,
            password_max: 128,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Settings for the WebSocket front end.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// A connection that sends nothing for this long is closed.
    ///
    /// Default: 60 seconds.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// GatehouseConfig
// ---------------------------------------------------------------------------

/// Everything a gateway process needs.
#[derive(Debug, Clone)]
pub struct GatehouseConfig {
    /// SQLite URL for the durable store.
    pub database_url: String,

    /// Redis URL for a shared session store. `None` keeps sessions in
    /// process memory.
    pub redis_url: Option<String>,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
}

impl Default for GatehouseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://gatehouse.db".to_string(),
            redis_url: None,
            auth: AuthConfig::default(),
            session: SessionConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl GatehouseConfig {
    /// Reads overrides from the process environment.
    ///
    /// | Variable | Setting |
    /// |---|---|
    /// | `GATEHOUSE_BIND` | `server.bind_addr` |
    /// | `GATEHOUSE_DATABASE_URL` | `database_url` |
    /// | `GATEHOUSE_REDIS_URL` | `redis_url` |
    /// | `GATEHOUSE_SESSION_TTL_SECS` | `session.ttl` |
    /// | `GATEHOUSE_IDLE_TIMEOUT_SECS` | `server.idle_timeout` |
    /// | `GATEHOUSE_MAX_CHARACTERS` | `auth.max_characters` |
    ///
    /// # Errors
    /// [`GatehouseError::Config`] if a numeric variable doesn't parse, or
    /// the session TTL is zero or longer than [`SessionConfig::MAX_TTL`].
    pub fn from_env() -> Result<Self, GatehouseError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading from `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, GatehouseError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("GATEHOUSE_BIND") {
            config.server.bind_addr = addr;
        }
        if let Some(url) = lookup("GATEHOUSE_DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(url) = lookup("GATEHOUSE_REDIS_URL").filter(|url| !url.trim().is_empty()) {
            config.redis_url = Some(url);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "GATEHOUSE_SESSION_TTL_SECS")? {
            let ttl = Duration::from_secs(secs);
            if ttl.is_zero() || ttl > SessionConfig::MAX_TTL {
                return Err(GatehouseError::Config(format!(
                    "GATEHOUSE_SESSION_TTL_SECS must be between 1 and {}, got {secs}",
                    SessionConfig::MAX_TTL.as_secs()
                )));
            }
            config.session.ttl = ttl;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "GATEHOUSE_IDLE_TIMEOUT_SECS")? {
            config.server.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var::<usize>(&lookup, "GATEHOUSE_MAX_CHARACTERS")? {
            config.auth.max_characters = max;
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, GatehouseError> {
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                GatehouseError::Config(format!("{key} must be a number, got '{raw}'"))
            })
        })
        .transpose()
}
