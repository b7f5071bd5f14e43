//! Centralized balance and tuning constants for Lorekeys game logic.
//!
//! These values define the deterministic reward math for the progression
//! engine and the duel protocol. Keeping them together ensures that balance
//! can only be adjusted via code changes reviewed in version control, rather
//! than through external JSON assets.

// Journal keys -------------------------------------------------------------
pub(crate) const LOG_SETUP_COMPLETE: &str = "log.setup-complete";
pub(crate) const LOG_NODE_COMPLETED: &str = "log.node.completed";
pub(crate) const LOG_NODE_DUPLICATE: &str = "log.node.duplicate";
pub(crate) const LOG_LEVEL_UP: &str = "log.level-up";
pub(crate) const LOG_DUEL_CREATED: &str = "log.duel.created";
pub(crate) const LOG_DUEL_MOVE: &str = "log.duel.move";
pub(crate) const LOG_DUEL_STALE_PATCH: &str = "log.duel.stale-patch";
pub(crate) const LOG_DUEL_SETTLED: &str = "log.duel.settled";
pub(crate) const LOG_DUEL_DRAW: &str = "log.duel.draw";
pub(crate) const LOG_INVITE_ACCEPTED: &str = "log.invite.accepted";
pub(crate) const LOG_INVITE_REJECTED: &str = "log.invite.rejected";

// Progression rewards ------------------------------------------------------
/// Team score granted for every completed node.
pub const NODE_COMPLETION_SCORE: u32 = 150;
/// User XP granted for every completed node.
pub const NODE_COMPLETION_XP: u32 = 250;

// Level curve --------------------------------------------------------------
/// XP required for the next level is `level * LEVEL_XP_STEP`.
pub const LEVEL_XP_STEP: u32 = 1_000;
/// Level assigned to freshly created profiles.
pub const STARTING_LEVEL: u32 = 1;

// Guild contribution -------------------------------------------------------
/// Numerator/denominator of the guild share of earned points (20%).
pub(crate) const GUILD_SHARE_NUM: u64 = 20;
pub(crate) const GUILD_SHARE_DENOM: u64 = 100;

// Duel tuning --------------------------------------------------------------
/// Wager presets offered when accepting a challenge.
pub const WAGER_PRESETS: [u32; 4] = [100, 250, 500, 1_000];
/// Default wager when the recipient does not pick one.
pub const DEFAULT_WAGER: u32 = 100;
