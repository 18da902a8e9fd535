//! SQLite-backed persistent store.
//!
//! Uniqueness lives in the schema (`UNIQUE` on `accounts.username` and
//! `characters.name`), so the database rejects duplicates even when two
//! requests pass the service's pre-checks at the same time. The
//! per-owner character cap is enforced by a single conditional
//! `INSERT ... SELECT ... WHERE count < cap` statement: SQLite takes its
//! write lock before evaluating the count, so two racing inserts for one
//! owner are serialized.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use gatehouse_protocol::{AccountId, CharacterName, PlayerId, Username};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::{
    Account, AccountPurge, Character, CredentialStore, PlayerStore, StoreError,
    DEFAULT_HP,
};

const MAX_CONNECTIONS: u32 = 8;

/// A [`Persistence`](crate::Persistence) implementation over a SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wraps an existing pool and creates the schema if it's missing.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        // `AUTOINCREMENT` keeps ids strictly increasing even after
        // deletes, so ordering by id is ordering by creation.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_digest TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                player_id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_account_id INTEGER NOT NULL REFERENCES accounts(id),
                name TEXT NOT NULL UNIQUE,
                pos_x REAL NOT NULL,
                pos_y REAL NOT NULL,
                hp INTEGER NOT NULL,
                max_hp INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_characters_owner ON characters(owner_account_id)",
        )
        .execute(&pool)
        .await?;

        tracing::debug!("sqlite schema ready");
        Ok(Self { pool })
    }

    /// Connects to a database URL such as `sqlite://gatehouse.db`,
    /// creating the file if needed.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?;
        Self::connect_with(options).await
    }

    /// Opens (or creates) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().filename(path);
        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let options = options
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        Self::new(pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    username: String,
    password_digest: String,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: AccountId(row.id),
            username: Username::new(row.username),
            password_digest: row.password_digest,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CharacterRow {
    player_id: i64,
    owner_account_id: i64,
    name: String,
    pos_x: f32,
    pos_y: f32,
    hp: i32,
    max_hp: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CharacterRow> for Character {
    fn from(row: CharacterRow) -> Self {
        Self {
            player_id: PlayerId(row.player_id),
            owner_account_id: AccountId(row.owner_account_id),
            name: CharacterName::new(row.name),
            pos_x: row.pos_x,
            pos_y: row.pos_y,
            hp: row.hp,
            max_hp: row.max_hp,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, password_digest, created_at";
const CHARACTER_COLUMNS: &str =
    "player_id, owner_account_id, name, pos_x, pos_y, hp, max_hp, created_at, updated_at";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl CredentialStore for SqliteStore {
    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?"
        ))
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn find_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
        ))
        .bind(account_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    async fn create_account(
        &self,
        username: &Username,
        password_digest: &str,
    ) -> Result<Account, StoreError> {
        let row: AccountRow = sqlx::query_as(&format!(
            "INSERT INTO accounts (username, password_digest, created_at) \
             VALUES (?, ?, ?) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(username.as_str())
        .bind(password_digest)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict {
                    field: "username",
                    value: username.to_string(),
                }
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(row.into())
    }

    async fn delete_account(&self, account_id: AccountId) -> Result<bool, StoreError> {
        // The foreign key on `characters` rejects this while characters
        // still reference the account.
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(account_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl PlayerStore for SqliteStore {
    async fn find_first_by_owner(
        &self,
        owner: AccountId,
    ) -> Result<Option<Character>, StoreError> {
        let row: Option<CharacterRow> = sqlx::query_as(&format!(
            "SELECT {CHARACTER_COLUMNS} FROM characters \
             WHERE owner_account_id = ? ORDER BY player_id LIMIT 1"
        ))
        .bind(owner.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Character::from))
    }

    async fn list_by_owner(&self, owner: AccountId) -> Result<Vec<Character>, StoreError> {
        let rows: Vec<CharacterRow> = sqlx::query_as(&format!(
            "SELECT {CHARACTER_COLUMNS} FROM characters \
             WHERE owner_account_id = ? ORDER BY player_id"
        ))
        .bind(owner.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Character::from).collect())
    }

    async fn find_character(
        &self,
        player_id: PlayerId,
    ) -> Result<Option<Character>, StoreError> {
        let row: Option<CharacterRow> = sqlx::query_as(&format!(
            "SELECT {CHARACTER_COLUMNS} FROM characters WHERE player_id = ?"
        ))
        .bind(player_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Character::from))
    }

    async fn name_exists(&self, name: &CharacterName) -> Result<bool, StoreError> {
        let (exists,): (i64,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM characters WHERE name = ?)")
                .bind(name.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists != 0)
    }

    async fn create_character(
        &self,
        owner: AccountId,
        name: &CharacterName,
        cap: usize,
    ) -> Result<Character, StoreError> {
        let now = Utc::now();
        let row: Option<CharacterRow> = sqlx::query_as(&format!(
            "INSERT INTO characters \
               (owner_account_id, name, pos_x, pos_y, hp, max_hp, created_at, updated_at) \
             SELECT ?, ?, 0.0, 0.0, ?, ?, ?, ? \
             WHERE (SELECT COUNT(*) FROM characters WHERE owner_account_id = ?) < ? \
             RETURNING {CHARACTER_COLUMNS}"
        ))
        .bind(owner.0)
        .bind(name.as_str())
        .bind(DEFAULT_HP)
        .bind(DEFAULT_HP)
        .bind(now)
        .bind(now)
        .bind(owner.0)
        .bind(i64::try_from(cap).unwrap_or(i64::MAX))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict {
                    field: "character name",
                    value: name.to_string(),
                }
            } else if is_foreign_key_violation(&e) {
                StoreError::AccountNotFound(owner)
            } else {
                StoreError::Database(e)
            }
        })?;

        row.map(Character::from)
            .ok_or(StoreError::LimitReached { owner, limit: cap })
    }

    async fn delete_all_by_owner(&self, owner: AccountId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM characters WHERE owner_account_id = ?")
            .bind(owner.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl AccountPurge for SqliteStore {
    async fn purge_account(&self, account_id: AccountId) -> Result<u64, StoreError> {
        // Dropping `tx` without `commit` rolls it back, so every `?`
        // below leaves both tables as they were.
        let mut tx = self.pool.begin().await?;

        let characters = sqlx::query("DELETE FROM characters WHERE owner_account_id = ?")
            .bind(account_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let accounts = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(account_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if accounts == 0 {
            tx.rollback().await?;
            return Err(StoreError::AccountNotFound(account_id));
        }

        tx.commit().await?;
        tracing::debug!(%account_id, characters, "account purged");
        Ok(characters)
    }
}
