//! Reward ledger: XP grants, level-ups, wager payouts, guild contributions.
use crate::constants::{GUILD_SHARE_DENOM, GUILD_SHARE_NUM, LEVEL_XP_STEP};
use crate::profile::UserProfile;

/// Result of an XP grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpGrant {
    pub amount: u32,
    /// Set when the grant crossed the current level threshold.
    pub leveled_up: bool,
    pub level: u32,
}

/// Grant XP and apply a single-step level check: one threshold comparison
/// per grant, XP resets to zero on level-up. A grant far above the current
/// threshold still advances at most one level; this mirrors the shipped
/// behavior and is deliberate (see DESIGN.md).
pub fn grant_xp(user: &mut UserProfile, amount: u32) -> XpGrant {
    user.xp += amount;
    let leveled_up = user.xp >= user.level * LEVEL_XP_STEP;
    if leveled_up {
        user.level += 1;
        user.xp = 0;
    }
    XpGrant {
        amount,
        leveled_up,
        level: user.level,
    }
}

/// One side of a settled wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WagerOutcome {
    Won,
    Lost,
    Draw,
}

/// Apply a settled wager to a profile. Winnings run through the normal XP
/// grant (and can level the player up); losses are clamped at zero and never
/// touch the level.
pub fn apply_wager(user: &mut UserProfile, outcome: WagerOutcome, wager: u32) -> Option<XpGrant> {
    match outcome {
        WagerOutcome::Won => Some(grant_xp(user, wager)),
        WagerOutcome::Lost => {
            user.xp = user.xp.saturating_sub(wager);
            None
        }
        WagerOutcome::Draw => None,
    }
}

/// External guild-score collaborator.
pub trait GuildStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Add points to a guild's aggregate score.
    ///
    /// # Errors
    ///
    /// Returns an error if the guild store rejects the write.
    fn add_guild_score(&self, guild_id: &str, delta: u64) -> Result<(), Self::Error>;
}

/// Guild store for clients without a guild backend; accepts and discards
/// every contribution.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGuildStore;

impl GuildStore for NullGuildStore {
    type Error = std::convert::Infallible;

    fn add_guild_score(&self, _guild_id: &str, _delta: u64) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Contribute the guild share of earned points. Fire-and-forget: a store
/// failure is logged and never fails the caller's operation.
pub fn contribute_to_guild<G: GuildStore>(store: &G, user: &UserProfile, points_earned: u32) {
    let Some(guild_id) = user.guild_id.as_deref() else {
        return;
    };
    let share = u64::from(points_earned) * GUILD_SHARE_NUM / GUILD_SHARE_DENOM;
    if share == 0 {
        return;
    }
    if let Err(error) = store.add_guild_score(guild_id, share) {
        log::warn!("guild contribution for {guild_id} dropped: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::convert::Infallible;

    #[derive(Default)]
    struct RecordingGuildStore {
        writes: RefCell<Vec<(String, u64)>>,
    }

    impl GuildStore for RecordingGuildStore {
        type Error = Infallible;

        fn add_guild_score(&self, guild_id: &str, delta: u64) -> Result<(), Self::Error> {
            self.writes.borrow_mut().push((guild_id.to_string(), delta));
            Ok(())
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("guild store offline")]
    struct Offline;

    struct FailingGuildStore;

    impl GuildStore for FailingGuildStore {
        type Error = Offline;

        fn add_guild_score(&self, _guild_id: &str, _delta: u64) -> Result<(), Self::Error> {
            Err(Offline)
        }
    }

    #[test]
    fn grant_below_threshold_accumulates() {
        let mut user = UserProfile::new("u1", "Warden");
        let grant = grant_xp(&mut user, 400);
        assert!(!grant.leveled_up);
        assert_eq!(user.xp, 400);
        assert_eq!(user.level, 1);
    }

    #[test]
    fn grant_crossing_threshold_levels_once_and_resets_xp() {
        let mut user = UserProfile::new("u1", "Warden");
        user.xp = 800;
        let grant = grant_xp(&mut user, 250);
        assert!(grant.leveled_up);
        assert_eq!(user.level, 2);
        assert_eq!(user.xp, 0);
    }

    #[test]
    fn oversized_grant_still_levels_only_once() {
        let mut user = UserProfile::new("u1", "Warden");
        let grant = grant_xp(&mut user, 5_000);
        assert!(grant.leveled_up);
        assert_eq!(user.level, 2);
        assert_eq!(user.xp, 0);
    }

    #[test]
    fn lost_wager_clamps_at_zero() {
        let mut user = UserProfile::new("u1", "Warden");
        user.xp = 60;
        assert!(apply_wager(&mut user, WagerOutcome::Lost, 100).is_none());
        assert_eq!(user.xp, 0);
        assert_eq!(user.level, 1);
    }

    #[test]
    fn draw_changes_nothing() {
        let mut user = UserProfile::new("u1", "Warden");
        user.xp = 321;
        apply_wager(&mut user, WagerOutcome::Draw, 100);
        assert_eq!(user.xp, 321);
    }

    #[test]
    fn guild_share_is_twenty_percent_floored() {
        let store = RecordingGuildStore::default();
        let mut user = UserProfile::new("u1", "Warden");
        user.guild_id = Some("g1".to_string());
        contribute_to_guild(&store, &user, 153);
        assert_eq!(store.writes.borrow().as_slice(), [("g1".to_string(), 30)]);
    }

    #[test]
    fn guildless_users_and_store_failures_are_silent() {
        let store = RecordingGuildStore::default();
        let user = UserProfile::new("u1", "Warden");
        contribute_to_guild(&store, &user, 150);
        assert!(store.writes.borrow().is_empty());

        let mut member = UserProfile::new("u2", "Keeper");
        member.guild_id = Some("g1".to_string());
        // Must not panic or surface the error.
        contribute_to_guild(&FailingGuildStore, &member, 150);
    }
}
