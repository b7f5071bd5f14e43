//! Whole-game state and the owning command wrapper.
//!
//! `GameState` is an explicit struct, not a free-form blob: every mutation
//! goes through a narrow command (`GameSession` here, `DuelGameClient` for
//! the duel path), each returning a typed outcome or a typed error.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Catalog, QuestGraph};
use crate::constants::{LOG_DUEL_CREATED, LOG_NODE_COMPLETED, LOG_NODE_DUPLICATE, LOG_SETUP_COMPLETE};
use crate::duel::DuelSession;
use crate::invite::Invite;
use crate::profile::{Guild, UserProfile};
use crate::progression::{
    CompletionOutcome, ProgressionError, TeamProgress, complete_node,
};
use crate::rewards::{GuildStore, contribute_to_guild};

/// Play mode of the local client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    #[default]
    Solo,
    Duel,
}

/// The complete local game state, persisted as one snapshot for offline
/// resume. While a duel is active, the remote session document is the
/// arbiter of duel score truth; `teams` and `duel` are reconciled caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub user: UserProfile,
    pub catalog: Catalog,
    pub teams: Vec<TeamProgress>,
    pub active_team_index: usize,
    pub mode: GameMode,
    #[serde(default)]
    pub active_category_id: Option<String>,
    #[serde(default)]
    pub active_period_id: Option<String>,
    #[serde(default)]
    pub active_duel_id: Option<String>,
    #[serde(default)]
    pub active_wager: Option<u32>,
    /// Local mirror of the active duel document.
    #[serde(default)]
    pub duel: Option<DuelSession>,
    /// Mirrors of invite documents involving this user.
    #[serde(default)]
    pub invites: Vec<Invite>,
    #[serde(default)]
    pub available_guilds: Vec<Guild>,
    /// Event journal of dotted log keys, newest last.
    #[serde(default)]
    pub logs: Vec<String>,
}

impl GameState {
    /// Set up a fresh game: one team per participant name, a level-one
    /// profile for the local player.
    #[must_use]
    pub fn setup(user_id: &str, names: &[&str], catalog: Catalog) -> Self {
        let username = names.first().copied().unwrap_or("Nameless Warden");
        let teams = names.iter().map(|name| TeamProgress::new(name)).collect();
        let mut state = Self {
            user: UserProfile::new(user_id, username),
            catalog,
            teams,
            active_team_index: 0,
            mode: GameMode::Solo,
            active_category_id: None,
            active_period_id: None,
            active_duel_id: None,
            active_wager: None,
            duel: None,
            invites: Vec::new(),
            available_guilds: Vec::new(),
            logs: Vec::new(),
        };
        state.journal(LOG_SETUP_COMPLETE);
        state
    }

    /// Append a journal key.
    pub fn journal(&mut self, key: &str) {
        self.logs.push(String::from(key));
    }

    /// Adopt a freshly published catalog, carrying node progress forward by
    /// node id. Nodes new to the content keep the statuses they shipped
    /// with.
    pub fn refresh_content(&mut self, mut fresh: Catalog) {
        let mut statuses = std::collections::HashMap::new();
        for category in self.catalog.all_categories() {
            for node in &category.graph.nodes {
                statuses.insert(node.id.clone(), node.status);
            }
        }
        fresh.for_each_graph_mut(|graph| {
            for node in &mut graph.nodes {
                if let Some(status) = statuses.get(&node.id) {
                    node.status = *status;
                }
            }
        });
        self.catalog = fresh;
    }

    /// Node count of a category's graph, the duel completion threshold.
    #[must_use]
    pub fn total_nodes_for(&self, category_id: &str) -> Option<usize> {
        self.catalog
            .category(category_id)
            .map(|category| category.graph.total_nodes())
    }

    /// The graph currently being played, if a category is selected.
    #[must_use]
    pub fn active_graph(&self) -> Option<&QuestGraph> {
        self.active_category_id
            .as_deref()
            .and_then(|id| self.catalog.category(id))
            .map(|category| &category.graph)
    }

    /// The team currently taking actions.
    #[must_use]
    pub fn active_team(&self) -> Option<&TeamProgress> {
        self.teams.get(self.active_team_index)
    }

    /// Bind this client to a freshly created duel session: switch mode,
    /// remember the wager, and ensure a score mirror per participant keyed
    /// by stable player id.
    pub fn bind_duel(&mut self, session: &DuelSession) {
        self.mode = GameMode::Duel;
        self.active_duel_id = Some(session.id.clone());
        self.active_wager = Some(session.wager_amount);
        self.active_category_id = Some(session.category_id.clone());
        // Both players race through the category from scratch.
        if let Some(category) = self.catalog.category_mut(&session.category_id) {
            category.graph.normalize();
        }
        for player in [&session.player1, &session.player2] {
            let mirrored = self
                .teams
                .iter()
                .any(|team| team.owner_id.as_deref() == Some(player.id.as_str()));
            if !mirrored {
                self.teams
                    .push(TeamProgress::for_player(&player.name, &player.id));
            }
        }
        self.duel = Some(session.clone());
        self.journal(LOG_DUEL_CREATED);
    }
}

/// Errors from session-level commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("no category is selected")]
    NoActiveCategory,
    #[error("category {category_id} does not exist")]
    UnknownCategory { category_id: String },
    #[error("team {team_index} does not exist")]
    UnknownTeam { team_index: usize },
    #[error(transparent)]
    Progression(#[from] ProgressionError),
}

/// High-level wrapper binding narrow game commands to a mutable state.
#[derive(Debug, Clone)]
pub struct GameSession {
    state: GameState,
}

impl GameSession {
    /// Construct a session over existing state (fresh or loaded).
    #[must_use]
    pub const fn new(state: GameState) -> Self {
        Self { state }
    }

    /// Select the category to play, resetting nothing: graphs keep their
    /// statuses so an interrupted run resumes where it stopped.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::UnknownCategory` for ids missing from the
    /// catalog.
    pub fn begin_category(&mut self, category_id: &str) -> Result<(), CommandError> {
        if self.state.catalog.category(category_id).is_none() {
            return Err(CommandError::UnknownCategory {
                category_id: category_id.to_string(),
            });
        }
        self.state.active_category_id = Some(category_id.to_string());
        Ok(())
    }

    /// Complete the given node in the active category for the active team,
    /// granting rewards and contributing the guild share of earned points.
    ///
    /// # Errors
    ///
    /// `NoActiveCategory` when no category is selected; otherwise the
    /// progression errors of `complete_node`.
    pub fn complete_node<G: GuildStore>(
        &mut self,
        node_id: &str,
        guild_store: &G,
    ) -> Result<CompletionOutcome, CommandError> {
        let category_id = self
            .state
            .active_category_id
            .clone()
            .ok_or(CommandError::NoActiveCategory)?;
        let team_index = self.state.active_team_index;

        let Some(category) = self.state.catalog.category_mut(&category_id) else {
            return Err(CommandError::UnknownCategory { category_id });
        };
        let Some(team) = self.state.teams.get_mut(team_index) else {
            return Err(CommandError::UnknownTeam { team_index });
        };

        let outcome = complete_node(&mut category.graph, node_id, team, &mut self.state.user)?;
        match &outcome {
            CompletionOutcome::Completed(reward) => {
                let points = reward.points;
                self.state.journal(LOG_NODE_COMPLETED);
                if reward.xp.leveled_up {
                    self.state.journal(crate::constants::LOG_LEVEL_UP);
                }
                contribute_to_guild(guild_store, &self.state.user, points);
            }
            CompletionOutcome::AlreadyCompleted => {
                self.state.journal(LOG_NODE_DUPLICATE);
            }
        }
        Ok(outcome)
    }

    /// Borrow the underlying immutable game state.
    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// Borrow the underlying mutable game state.
    pub const fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    /// Apply a closure to the mutable game state.
    pub fn with_state_mut<R>(&mut self, f: impl FnOnce(&mut GameState) -> R) -> R {
        f(&mut self.state)
    }

    /// Consume the session, returning the underlying game state.
    #[must_use]
    pub fn into_state(self) -> GameState {
        self.state
    }
}
