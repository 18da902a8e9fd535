//! In-process store with the same guarantees as the SQLite backend.
//!
//! Both tables sit behind one `tokio::sync::Mutex`. Holding that single
//! lock across check-and-insert is what gives `create_account` and
//! `create_character` their atomicity, and what lets `purge_account`
//! touch both tables as one unit.

use std::collections::BTreeMap;

use chrono::Utc;
use gatehouse_protocol::{AccountId, CharacterName, PlayerId, Username};
use tokio::sync::Mutex;

use crate::{
    Account, AccountPurge, Character, CredentialStore, PlayerStore, StoreError,
};

/// A [`Persistence`](crate::Persistence) implementation in plain maps.
///
/// `BTreeMap`s keyed by monotonically assigned ids keep iteration in
/// creation order, which is the order `list_by_owner` promises.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    characters: BTreeMap<PlayerId, Character>,
    last_account_id: i64,
    last_player_id: i64,
    /// Set by [`MemoryStore::fail_next_account_removal`].
    fail_account_removal: bool,
}

impl Tables {
    fn owned_by(&self, owner: AccountId) -> impl Iterator<Item = &Character> {
        self.characters.values().filter(move |c| c.is_owned_by(owner))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next account-row removal fail with
    /// [`StoreError::Backend`], after the characters were already
    /// removed. Exists to exercise the rollback path of
    /// [`AccountPurge::purge_account`].
    pub async fn fail_next_account_removal(&self) {
        self.tables.lock().await.fail_account_removal = true;
    }

    pub async fn account_count(&self) -> usize {
        self.tables.lock().await.accounts.len()
    }

    pub async fn character_count(&self) -> usize {
        self.tables.lock().await.characters.len()
    }
}

impl CredentialStore for MemoryStore {
    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .values()
            .find(|a| &a.username == username)
            .cloned())
    }

    async fn find_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self.tables.lock().await.accounts.get(&account_id).cloned())
    }

    async fn create_account(
        &self,
        username: &Username,
        password_digest: &str,
    ) -> Result<Account, StoreError> {
        let mut tables = self.tables.lock().await;

        if tables.accounts.values().any(|a| &a.username == username) {
            return Err(StoreError::Conflict {
                field: "username",
                value: username.to_string(),
            });
        }

        tables.last_account_id += 1;
        let account = Account {
            id: AccountId(tables.last_account_id),
            username: username.clone(),
            password_digest: password_digest.to_string(),
            created_at: Utc::now(),
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn delete_account(
        &self,
        account_id: AccountId,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;

        if tables.owned_by(account_id).next().is_some() {
            return Err(StoreError::Backend(format!(
                "account {account_id} still owns characters"
            )));
        }
        Ok(tables.accounts.remove(&account_id).is_some())
    }
}

impl PlayerStore for MemoryStore {
    async fn find_first_by_owner(
        &self,
        owner: AccountId,
    ) -> Result<Option<Character>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.owned_by(owner).next().cloned())
    }

    async fn list_by_owner(
        &self,
        owner: AccountId,
    ) -> Result<Vec<Character>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.owned_by(owner).cloned().collect())
    }

    async fn find_character(
        &self,
        player_id: PlayerId,
    ) -> Result<Option<Character>, StoreError> {
        Ok(self.tables.lock().await.characters.get(&player_id).cloned())
    }

    async fn name_exists(&self, name: &CharacterName) -> Result<bool, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.characters.values().any(|c| &c.name == name))
    }

    async fn create_character(
        &self,
        owner: AccountId,
        name: &CharacterName,
        cap: usize,
    ) -> Result<Character, StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.accounts.contains_key(&owner) {
            return Err(StoreError::AccountNotFound(owner));
        }
        if tables.characters.values().any(|c| &c.name == name) {
            return Err(StoreError::Conflict {
                field: "character name",
                value: name.to_string(),
            });
        }
        if tables.owned_by(owner).count() >= cap {
            return Err(StoreError::LimitReached { owner, limit: cap });
        }

        tables.last_player_id += 1;
        let character = Character::spawn(
            PlayerId(tables.last_player_id),
            owner,
            name.clone(),
            Utc::now(),
        );
        tables.characters.insert(character.player_id, character.clone());
        Ok(character)
    }

    async fn delete_all_by_owner(&self, owner: AccountId) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.characters.len();
        tables.characters.retain(|_, c| !c.is_owned_by(owner));
        Ok((before - tables.characters.len()) as u64)
    }
}

impl AccountPurge for MemoryStore {
    async fn purge_account(&self, account_id: AccountId) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.accounts.contains_key(&account_id) {
            return Err(StoreError::AccountNotFound(account_id));
        }

        let owned: Vec<PlayerId> =
            tables.owned_by(account_id).map(|c| c.player_id).collect();
        let removed: Vec<Character> = owned
            .iter()
            .filter_map(|id| tables.characters.remove(id))
            .collect();

        if std::mem::take(&mut tables.fail_account_removal) {
            // Compensate: put the characters back before reporting.
            for character in removed {
                tables.characters.insert(character.player_id, character);
            }
            return Err(StoreError::Backend(format!(
                "injected failure removing account {account_id}"
            )));
        }

        tables.accounts.remove(&account_id);
        Ok(removed.len() as u64)
    }
}
