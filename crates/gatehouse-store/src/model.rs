//! Persisted records.

use chrono::{DateTime, Utc};
use gatehouse_protocol::{
    AccountId, CharacterName, CharacterSnapshot, PlayerId, Username,
};

/// Starting (and maximum) hit points of a new character.
pub const DEFAULT_HP: i32 = 100;

/// A set of credentials. Only ever created and deleted here; the digest
/// is the hasher's output, never the plaintext.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub username: Username,
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
}

/// An in-game persona owned by exactly one account.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub player_id: PlayerId,
    pub owner_account_id: AccountId,
    pub name: CharacterName,
    pub pos_x: f32,
    pub pos_y: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Character {
    /// A freshly created character: origin position, full health.
    pub fn spawn(
        player_id: PlayerId,
        owner_account_id: AccountId,
        name: CharacterName,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            player_id,
            owner_account_id,
            name,
            pos_x: 0.0,
            pos_y: 0.0,
            hp: DEFAULT_HP,
            max_hp: DEFAULT_HP,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, account_id: AccountId) -> bool {
        self.owner_account_id == account_id
    }

    /// The caller-facing view: no owner, no timestamps.
    pub fn snapshot(&self) -> CharacterSnapshot {
        CharacterSnapshot {
            player_id: self.player_id,
            name: self.name.clone(),
            pos_x: self.pos_x,
            pos_y: self.pos_y,
            hp: self.hp,
            max_hp: self.max_hp,
        }
    }
}
