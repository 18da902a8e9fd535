//! `AuthService`: the account and session operations.
//!
//! The service owns no state of its own. It composes a durable store
//! (accounts and characters), a session store (tickets), a password
//! hasher and an event log, all chosen by the caller:
//!
//! ```text
//!   register / login ──► CredentialStore ──► SessionStore::issue
//!   verify / list / create ──► SessionStore::resolve ──► PlayerStore
//!   delete_account ──► AccountPurge (one unit) ──► SessionStore::revoke_all
//! ```
//!
//! Every ticket-taking operation goes through [`AuthService::authenticate`]
//! first, so an expired, revoked or orphaned ticket fails the same way
//! everywhere.

use std::fmt::Display;
use std::sync::Arc;

use gatehouse_protocol::{
    AccountId, CharacterName, CharacterSnapshot, Password, PlayerId, Ticket, Username,
};
use gatehouse_session::SessionStore;
use gatehouse_store::{Account, Persistence, StoreError};
use tokio::sync::OnceCell;

use crate::log::{EventLog, LogLevel, TracingLog};
use crate::password::{Argon2Hasher, PasswordHasher};
use crate::rules;
use crate::{AuthConfig, AuthError};

/// Result of a successful [`AuthService::delete_account`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountDeletion {
    pub account_id: AccountId,
    pub deleted_character_count: u64,
}

/// Account, character and session operations over pluggable backends.
///
/// # Type parameters
/// - `P` — durable store for accounts and characters.
/// - `S` — ticket store.
/// - `H` — password hasher, [`Argon2Hasher`] unless replaced.
/// - `L` — sink for operator-facing failures, [`TracingLog`] unless replaced.
pub struct AuthService<P, S, H = Argon2Hasher, L = TracingLog> {
    store: P,
    sessions: S,
    // Shared with blocking-pool tasks while hashing.
    hasher: Arc<H>,
    log: L,
    config: AuthConfig,
    // Digest of a fixed password, verified against when the username is
    // unknown. Hashed with `hasher` on first use.
    decoy: OnceCell<String>,
}

/// Input for the decoy digest. Never matches a real account's digest
/// because it is never stored.
const DECOY_PASSWORD: &str = "gatehouse-decoy-password";

impl<P, S> AuthService<P, S>
where
    P: Persistence,
    S: SessionStore,
{
    pub fn new(store: P, sessions: S) -> Self {
        Self {
            store,
            sessions,
            hasher: Arc::new(Argon2Hasher),
            log: TracingLog,
            config: AuthConfig::default(),
            decoy: OnceCell::new(),
        }
    }
}

impl<P, S, H, L> AuthService<P, S, H, L>
where
    P: Persistence,
    S: SessionStore,
    H: PasswordHasher,
    L: EventLog,
{
    /// Replaces the password hasher.
    pub fn with_hasher<H2: PasswordHasher>(self, hasher: H2) -> AuthService<P, S, H2, L> {
        AuthService {
            store: self.store,
            sessions: self.sessions,
            hasher: Arc::new(hasher),
            log: self.log,
            config: self.config,
            decoy: OnceCell::new(),
        }
    }

    /// Replaces the event log.
    pub fn with_log<L2: EventLog>(self, log: L2) -> AuthService<P, S, H, L2> {
        AuthService {
            store: self.store,
            sessions: self.sessions,
            hasher: self.hasher,
            log,
            config: self.config,
            decoy: self.decoy,
        }
    }

    pub fn with_config(mut self, config: AuthConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    /// Creates an account and logs it in.
    ///
    /// # Errors
    /// - [`AuthError::Validation`] — malformed username or password.
    /// - [`AuthError::Conflict`] — the username is taken.
    pub async fn register(
        &self,
        username: &Username,
        password: &Password,
    ) -> Result<Ticket, AuthError> {
        rules::validate_username(username, &self.config)?;
        rules::validate_password(password, &self.config)?;

        // Cheap pre-check so a taken name doesn't cost a hash. The
        // store's own uniqueness guard still decides races.
        let existing = self
            .store
            .find_by_username(username)
            .await
            .map_err(|e| self.internal("register", e, &[]))?;
        if existing.is_some() {
            return Err(username_taken());
        }

        let digest = self.hash_password(password).await?;

        let account = match self.store.create_account(username, &digest).await {
            Ok(account) => account,
            Err(StoreError::Conflict { .. }) => return Err(username_taken()),
            Err(e) => return Err(self.internal("register", e, &[])),
        };

        let ticket = self.issue(account.id, "register").await?;
        tracing::info!(account_id = %account.id, %username, "account registered");
        Ok(ticket)
    }

    /// Exchanges credentials for a new ticket.
    ///
    /// Earlier tickets of the account stay valid.
    ///
    /// # Errors
    /// [`AuthError::Authentication`] with the same message whether the
    /// username is unknown or the password is wrong. Both cases run one
    /// password verification.
    pub async fn login(
        &self,
        username: &Username,
        password: &Password,
    ) -> Result<Ticket, AuthError> {
        let found = self
            .store
            .find_by_username(username)
            .await
            .map_err(|e| self.internal("login", e, &[]))?;

        let Some(account) = found else {
            self.verify_decoy(password).await?;
            tracing::debug!(%username, "login for unknown username");
            return Err(AuthError::bad_credentials());
        };

        if !self.verify_password(password, &account).await? {
            tracing::debug!(account_id = %account.id, "login rejected");
            return Err(AuthError::bad_credentials());
        }

        let ticket = self.issue(account.id, "login").await?;
        tracing::info!(account_id = %account.id, "logged in");
        Ok(ticket)
    }

    /// Revokes one ticket.
    ///
    /// # Errors
    /// [`AuthError::NotFound`] if the ticket is unknown, expired, or was
    /// already revoked.
    pub async fn logout(&self, ticket: &Ticket) -> Result<(), AuthError> {
        let removed = self
            .sessions
            .revoke(ticket)
            .await
            .map_err(|e| self.internal("logout", e, &[]))?;

        if !removed {
            return Err(AuthError::NotFound(
                "session not found or already logged out".into(),
            ));
        }
        tracing::info!(%ticket, "logged out");
        Ok(())
    }

    /// Deletes the account behind `ticket` together with every character
    /// it owns, then revokes all of its tickets.
    ///
    /// The password is re-checked against the stored digest, so a
    /// leaked ticket alone can't delete an account.
    ///
    /// # Errors
    /// - [`AuthError::Authentication`] — bad ticket or wrong password.
    /// - [`AuthError::Internal`] — the deletion failed and was rolled
    ///   back; nothing was removed.
    pub async fn delete_account(
        &self,
        ticket: &Ticket,
        password: &Password,
    ) -> Result<AccountDeletion, AuthError> {
        let account = self.authenticate(ticket).await?;

        if !self.verify_password(password, &account).await? {
            tracing::debug!(account_id = %account.id, "account deletion rejected");
            return Err(AuthError::bad_credentials());
        }

        let deleted_character_count = match self.store.purge_account(account.id).await {
            Ok(count) => count,
            // Deleted by a concurrent request between authenticate and here.
            Err(StoreError::AccountNotFound(_)) => return Err(AuthError::invalid_ticket()),
            Err(e) => {
                return Err(self.internal(
                    "delete_account",
                    e,
                    &[("account_id", account.id.to_string())],
                ));
            }
        };

        // The durable deletion is committed at this point. If revocation
        // fails, the leftover tickets still fail `authenticate` because
        // their account is gone.
        let revoked = match self.sessions.revoke_all(account.id).await {
            Ok(n) => n,
            Err(e) => {
                self.log.log(
                    LogLevel::Warn,
                    "ticket revocation after account deletion failed",
                    &[
                        ("account_id", account.id.to_string()),
                        ("error", e.to_string()),
                    ],
                );
                0
            }
        };

        tracing::info!(
            account_id = %account.id,
            characters = deleted_character_count,
            revoked,
            "account deleted"
        );
        Ok(AccountDeletion {
            account_id: account.id,
            deleted_character_count,
        })
    }

    // -----------------------------------------------------------------------
    // Characters
    // -----------------------------------------------------------------------

    /// Checks that `ticket` is live and its account owns `player_id`.
    ///
    /// This is what a gameplay server calls when a client joins.
    ///
    /// # Errors
    /// - [`AuthError::Authentication`] — bad ticket.
    /// - [`AuthError::Validation`] — `player_id` isn't positive.
    /// - [`AuthError::NotFound`] — no such character.
    /// - [`AuthError::Authorization`] — someone else's character.
    pub async fn verify_session(
        &self,
        ticket: &Ticket,
        player_id: PlayerId,
    ) -> Result<CharacterSnapshot, AuthError> {
        let account = self.authenticate(ticket).await?;
        rules::validate_player_id(player_id)?;

        let character = self
            .store
            .find_character(player_id)
            .await
            .map_err(|e| self.internal("verify_session", e, &[]))?
            .ok_or_else(|| AuthError::NotFound(format!("character {player_id} not found")))?;

        if !character.is_owned_by(account.id) {
            tracing::warn!(
                account_id = %account.id,
                %player_id,
                "verify for a character owned by another account"
            );
            return Err(AuthError::Authorization(
                "character does not belong to this account".into(),
            ));
        }

        tracing::debug!(account_id = %account.id, %player_id, "session verified");
        Ok(character.snapshot())
    }

    /// Ticket-only verification: returns the account's oldest character.
    ///
    /// # Errors
    /// - [`AuthError::Authentication`] — bad ticket.
    /// - [`AuthError::NotFound`] — the account has no characters.
    pub async fn verify_primary(&self, ticket: &Ticket) -> Result<CharacterSnapshot, AuthError> {
        let account = self.authenticate(ticket).await?;

        let character = self
            .store
            .find_first_by_owner(account.id)
            .await
            .map_err(|e| self.internal("verify_primary", e, &[]))?
            .ok_or_else(|| AuthError::NotFound("account has no characters".into()))?;

        Ok(character.snapshot())
    }

    /// The account's characters, oldest first.
    pub async fn list_characters(
        &self,
        ticket: &Ticket,
    ) -> Result<Vec<CharacterSnapshot>, AuthError> {
        let account = self.authenticate(ticket).await?;

        let characters = self
            .store
            .list_by_owner(account.id)
            .await
            .map_err(|e| self.internal("list_characters", e, &[]))?;

        Ok(characters.iter().map(|c| c.snapshot()).collect())
    }

    /// Creates a character at the origin with full health.
    ///
    /// # Errors
    /// - [`AuthError::Authentication`] — bad ticket.
    /// - [`AuthError::Validation`] — name length or characters.
    /// - [`AuthError::Conflict`] — name taken by any account.
    /// - [`AuthError::LimitExceeded`] — the account is at its cap.
    pub async fn create_character(
        &self,
        ticket: &Ticket,
        name: &CharacterName,
    ) -> Result<CharacterSnapshot, AuthError> {
        let account = self.authenticate(ticket).await?;
        rules::validate_character_name(name, &self.config)?;

        // Reports a taken name ahead of a full roster. The store repeats
        // both checks atomically with the insert.
        let taken = self
            .store
            .name_exists(name)
            .await
            .map_err(|e| self.internal("create_character", e, &[]))?;
        if taken {
            return Err(name_taken());
        }

        let character = match self
            .store
            .create_character(account.id, name, self.config.max_characters)
            .await
        {
            Ok(character) => character,
            Err(StoreError::Conflict { .. }) => return Err(name_taken()),
            Err(StoreError::LimitReached { limit, .. }) => {
                return Err(AuthError::LimitExceeded(limit));
            }
            Err(StoreError::AccountNotFound(_)) => return Err(AuthError::invalid_ticket()),
            Err(e) => {
                return Err(self.internal(
                    "create_character",
                    e,
                    &[("account_id", account.id.to_string())],
                ));
            }
        };

        tracing::info!(
            account_id = %account.id,
            player_id = %character.player_id,
            name = %character.name,
            "character created"
        );
        Ok(character.snapshot())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Resolves `ticket` to a live account.
    ///
    /// The account is re-read from the durable store: a ticket that
    /// outlived its account is as invalid as an expired one.
    pub async fn authenticate(&self, ticket: &Ticket) -> Result<Account, AuthError> {
        let account_id = self
            .sessions
            .resolve(ticket)
            .await
            .map_err(|e| self.internal("authenticate", e, &[]))?
            .ok_or_else(AuthError::invalid_ticket)?;

        self.store
            .find_account(account_id)
            .await
            .map_err(|e| self.internal("authenticate", e, &[]))?
            .ok_or_else(AuthError::invalid_ticket)
    }

    async fn issue(&self, account_id: AccountId, op: &'static str) -> Result<Ticket, AuthError> {
        self.sessions
            .issue(account_id)
            .await
            .map_err(|e| self.internal(op, e, &[("account_id", account_id.to_string())]))
    }

    async fn hash_password(&self, password: &Password) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.expose().to_owned();

        match tokio::task::spawn_blocking(move || hasher.hash(&password)).await {
            Ok(Ok(digest)) => Ok(digest),
            Ok(Err(e)) => Err(self.internal("hash_password", e, &[])),
            Err(e) => Err(self.internal("hash_password", e, &[])),
        }
    }

    async fn verify_password(
        &self,
        password: &Password,
        account: &Account,
    ) -> Result<bool, AuthError> {
        self.verify_digest(password, account.password_digest.clone())
            .await
    }

    /// Verifies `password` against a digest no account owns, so an unknown
    /// username costs the same hashing work as a wrong password.
    async fn verify_decoy(&self, password: &Password) -> Result<(), AuthError> {
        let decoy = Password::new(DECOY_PASSWORD);
        let digest = self
            .decoy
            .get_or_try_init(|| self.hash_password(&decoy))
            .await?;
        self.verify_digest(password, digest.clone()).await?;
        Ok(())
    }

    async fn verify_digest(&self, password: &Password, digest: String) -> Result<bool, AuthError> {
        // Oversized input can't match a digest we produced; skip the hash.
        if password.expose().len() > self.config.password_max {
            return Ok(false);
        }

        let hasher = Arc::clone(&self.hasher);
        let password = password.expose().to_owned();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| self.internal("verify_password", e, &[]))
    }

    /// Reports an unexpected failure to the event log and returns the
    /// opaque error the caller gets.
    fn internal(
        &self,
        op: &'static str,
        error: impl Display,
        context: &[(&'static str, String)],
    ) -> AuthError {
        let mut fields = Vec::with_capacity(context.len() + 2);
        fields.push(("op", op.to_string()));
        fields.extend_from_slice(context);
        fields.push(("error", error.to_string()));

        self.log.log(LogLevel::Error, "operation failed", &fields);
        AuthError::Internal
    }
}

fn username_taken() -> AuthError {
    AuthError::Conflict("username already exists".into())
}

fn name_taken() -> AuthError {
    AuthError::Conflict("character name already exists".into())
}
