//! Player profile, friends roster, and guild summaries.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constants::STARTING_LEVEL;

/// Reward keys held inline; most runs collect only a handful.
pub type KeyRing = SmallVec<[String; 4]>;

/// Presence of a friend on the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendStatus {
    Online,
    #[default]
    Offline,
}

/// A friend entry as shown on the profile dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub id: String,
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub status: FriendStatus,
}

/// Aggregate group entity accumulating a share of members' earned points.
/// The authoritative record lives in the guild store; this is a local mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub leader_id: String,
    #[serde(default)]
    pub leader_name: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub total_score: u64,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub description: String,
}

/// The locally-owned player record. Levels and XP evolve under the reward
/// ledger; keys are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub level: u32,
    pub xp: u32,
    #[serde(default)]
    pub unlocked_keys: KeyRing,
    #[serde(default)]
    pub friends: Vec<Friend>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
}

impl UserProfile {
    /// Create a fresh level-one profile for a new player.
    #[must_use]
    pub fn new(id: &str, username: &str) -> Self {
        Self {
            id: id.to_string(),
            username: username.to_string(),
            level: STARTING_LEVEL,
            xp: 0,
            unlocked_keys: KeyRing::new(),
            friends: Vec::new(),
            guild_id: None,
            achievements: vec![String::from("FIRST_STEP")],
        }
    }

    /// Append a reward key if it is not already held.
    pub fn push_key(&mut self, key_id: &str) {
        if !self.unlocked_keys.iter().any(|key| key == key_id) {
            self.unlocked_keys.push(key_id.to_string());
        }
    }
}
