//! Store traits.
//!
//! Method names carry their record type (`find_account`,
//! `create_character`) because every backend implements all three traits
//! on one type; shared names like `create` would be ambiguous at the
//! call site.

use std::future::Future;

use gatehouse_protocol::{AccountId, CharacterName, PlayerId, Username};

use crate::{Account, Character, StoreError};

/// Durable mapping username ↔ account.
pub trait CredentialStore: Send + Sync + 'static {
    fn find_by_username(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    fn find_account(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    /// Inserts a new account.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] if the username is taken. The check and
    /// the insert are one atomic step, so two racing registrations can't
    /// both succeed.
    fn create_account(
        &self,
        username: &Username,
        password_digest: &str,
    ) -> impl Future<Output = Result<Account, StoreError>> + Send;

    /// Deletes a single account row. Returns `true` iff a row was removed.
    ///
    /// Refuses (with an error) while the account still owns characters;
    /// use [`AccountPurge`] to remove both.
    fn delete_account(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Durable character records, each owned by exactly one account.
pub trait PlayerStore: Send + Sync + 'static {
    /// Oldest character of `owner`, for single-character flows.
    fn find_first_by_owner(
        &self,
        owner: AccountId,
    ) -> impl Future<Output = Result<Option<Character>, StoreError>> + Send;

    /// All characters of `owner`, oldest first.
    fn list_by_owner(
        &self,
        owner: AccountId,
    ) -> impl Future<Output = Result<Vec<Character>, StoreError>> + Send;

    fn find_character(
        &self,
        player_id: PlayerId,
    ) -> impl Future<Output = Result<Option<Character>, StoreError>> + Send;

    fn name_exists(
        &self,
        name: &CharacterName,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Creates a character with default position and health.
    ///
    /// # Errors
    /// - [`StoreError::Conflict`] — the name is taken (by any account).
    /// - [`StoreError::LimitReached`] — `owner` already has `cap`.
    /// - [`StoreError::AccountNotFound`] — `owner` doesn't exist.
    ///
    /// Both checks happen atomically with the insert: concurrent calls
    /// for one owner can never push it past `cap`.
    fn create_character(
        &self,
        owner: AccountId,
        name: &CharacterName,
        cap: usize,
    ) -> impl Future<Output = Result<Character, StoreError>> + Send;

    /// Deletes every character of `owner`, returning how many.
    fn delete_all_by_owner(
        &self,
        owner: AccountId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// The account-deletion unit of work.
pub trait AccountPurge: Send + Sync + 'static {
    /// Deletes every character of `account_id` and then the account, as
    /// one unit. Returns the number of characters removed.
    ///
    /// Either both deletions are visible afterwards or neither is.
    ///
    /// # Errors
    /// [`StoreError::AccountNotFound`] if the account row is missing
    /// (nothing is deleted); any other error also leaves both tables
    /// untouched.
    fn purge_account(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// Everything the auth service needs from durable storage.
pub trait Persistence: CredentialStore + PlayerStore + AccountPurge {}

impl<T> Persistence for T where T: CredentialStore + PlayerStore + AccountPurge {}
