//! Lorekeys Game Engine
//!
//! Platform-agnostic core game logic for the Lorekeys riddle-exploration
//! game. This crate provides the progression state machine, the duel
//! synchronization protocol, and the collaborator contracts, without UI or
//! platform-specific dependencies.

pub mod catalog;
pub mod constants;
pub mod duel;
pub mod invite;
pub mod profile;
pub mod progression;
pub mod rewards;
pub mod riddle;
pub mod state;

// Re-export commonly used types
pub use catalog::{
    Catalog, CatalogError, Category, NodeStatus, Period, QuestGraph, QuestionKind, RiddleNode,
    TargetZone, UnlockKind,
};
pub use constants::{
    DEFAULT_WAGER, LEVEL_XP_STEP, NODE_COMPLETION_SCORE, NODE_COMPLETION_XP, WAGER_PRESETS,
};
pub use duel::{
    ClientError, DuelError, DuelEvent, DuelGameClient, DuelMove, DuelPlayer, DuelSession,
    DuelStatus, InMemoryRemote, RemoteDuelGateway, Subscription, SyncError, WagerSettlement,
    apply_remote_session, session_id_for_invite,
};
pub use invite::{AcceptedChallenge, Invite, InviteError, InviteStatus};
pub use profile::{Friend, FriendStatus, Guild, KeyRing, UserProfile};
pub use progression::{
    CompletionOutcome, CompletionReward, ProgressionError, TeamProgress, complete_node,
};
pub use rewards::{
    GuildStore, NullGuildStore, WagerOutcome, XpGrant, apply_wager, contribute_to_guild, grant_xp,
};
pub use riddle::{UnlockFormula, digit_sum, validate_answer, validate_unlock};
pub use state::{CommandError, GameMode, GameSession, GameState};

/// Trait for abstracting content repository access.
/// Platform-specific implementations should provide this.
pub trait ContentSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the full content catalog from the platform-specific source.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    fn load_catalog(&self) -> Result<Catalog, Self::Error>;

    /// Load configuration data for a specific system.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned;
}

/// Trait for abstracting snapshot persistence for offline resume.
/// Platform-specific implementations should provide this.
pub trait StateStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist the whole game state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be saved.
    fn save(&self, state: &GameState) -> Result<(), Self::Error>;

    /// Load the persisted game state, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be loaded.
    fn load(&self) -> Result<Option<GameState>, Self::Error>;

    /// Delete the persisted game state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be deleted.
    fn clear(&self) -> Result<(), Self::Error>;
}

/// Main engine wiring the content source and the snapshot store.
pub struct GameEngine<L, S>
where
    L: ContentSource,
    S: StateStore,
{
    content: L,
    store: S,
}

impl<L, S> GameEngine<L, S>
where
    L: ContentSource,
    S: StateStore,
{
    /// Create a new engine with the provided content source and store.
    pub const fn new(content: L, store: S) -> Self {
        Self { content, store }
    }

    /// Set up a fresh game session for the given participants.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub fn new_game(&self, user_id: &str, names: &[&str]) -> Result<GameSession, L::Error> {
        let catalog = self.content.load_catalog()?;
        Ok(GameSession::new(GameState::setup(user_id, names, catalog)))
    }

    /// Persist a session snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be saved.
    pub fn save(&self, state: &GameState) -> Result<(), S::Error> {
        self.store.save(state)
    }

    /// Load the persisted session, refreshing catalog content while
    /// carrying node progress forward.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be loaded or the catalog
    /// refresh fails.
    pub fn load(&self) -> Result<Option<GameSession>, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        if let Some(mut game_state) = self.store.load().map_err(Into::into)? {
            let catalog = self.content.load_catalog().map_err(Into::into)?;
            game_state.refresh_content(catalog);
            Ok(Some(GameSession::new(game_state)))
        } else {
            Ok(None)
        }
    }
}
