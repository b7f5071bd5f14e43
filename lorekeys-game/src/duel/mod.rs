//! Two-player wagered duels: the shared session document and its pure
//! transitions.
//!
//! A duel session is the only state shared between two clients. Every
//! transition here is pure and order-deterministic; the authoritative copy
//! applies them under a single writer (see `memory`), and clients converge
//! on the result through version-guarded notifications (see `sync`).
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::invite::AcceptedChallenge;
use crate::rewards::WagerOutcome;

pub mod client;
pub mod memory;
pub mod sync;

pub use client::{ClientError, DuelGameClient};
pub use memory::InMemoryRemote;
pub use sync::{
    DuelEvent, RemoteDuelGateway, Subscription, SyncError, apply_remote_session,
    session_id_for_invite,
};

/// One side of a duel as stored in the shared document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelPlayer {
    pub id: String,
    pub name: String,
    pub score: u32,
}

impl DuelPlayer {
    #[must_use]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            score: 0,
        }
    }
}

/// Append-only move log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelMove {
    pub user_id: String,
    pub node_id: String,
    pub timestamp_ms: i64,
}

/// Session lifecycle. `Active -> Finished`, one way, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuelStatus {
    #[default]
    Active,
    Finished,
}

impl DuelStatus {
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for DuelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "ACTIVE",
            Self::Finished => "FINISHED",
        })
    }
}

/// The shared duel document. While a duel is active this document is the
/// arbiter of score truth; local team mirrors are caches reconciled on every
/// notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelSession {
    pub id: String,
    pub player1: DuelPlayer,
    pub player2: DuelPlayer,
    /// Soft turn token; the remote store also enforces it on commit.
    pub current_turn_user_id: String,
    pub category_id: String,
    pub wager_amount: u32,
    pub status: DuelStatus,
    #[serde(default)]
    pub winner_id: Option<String>,
    pub created_at_ms: i64,
    pub last_move_at_ms: i64,
    #[serde(default)]
    pub moves: Vec<DuelMove>,
    /// Monotonic write counter bumped by the store on every committed
    /// change; stale notifications are dropped by comparing against it.
    #[serde(default)]
    pub version: u64,
}

/// Errors raised by duel transitions. A failed transition mutates nothing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DuelError {
    /// The acting player does not hold the turn token.
    #[error("user {acting_user_id} moved out of turn (turn belongs to {current_turn_user_id})")]
    OffTurn {
        acting_user_id: String,
        current_turn_user_id: String,
    },
    /// The session already settled.
    #[error("duel {session_id} is finished")]
    SessionFinished { session_id: String },
    /// The user is not one of the two participants.
    #[error("user {user_id} is not part of duel {session_id}")]
    NotAParticipant { session_id: String, user_id: String },
    /// No duel is currently active on this client.
    #[error("no active duel")]
    NoActiveDuel,
}

/// Outcome of the completion check once enough moves have been played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WagerSettlement {
    /// `None` on an equal-score draw.
    pub winner_id: Option<String>,
    pub loser_id: Option<String>,
    pub wager: u32,
}

impl DuelSession {
    /// Create the session for an accepted challenge. The challenger is
    /// always player one and always moves first.
    #[must_use]
    pub fn from_challenge(
        session_id: &str,
        challenge: &AcceptedChallenge,
        recipient_name: &str,
        category_id: &str,
        now_ms: i64,
    ) -> Self {
        Self {
            id: session_id.to_string(),
            player1: DuelPlayer::new(&challenge.challenger_id, &challenge.challenger_name),
            player2: DuelPlayer::new(&challenge.recipient_id, recipient_name),
            current_turn_user_id: challenge.challenger_id.clone(),
            category_id: category_id.to_string(),
            wager_amount: challenge.wager,
            status: DuelStatus::Active,
            winner_id: None,
            created_at_ms: now_ms,
            last_move_at_ms: now_ms,
            moves: Vec::new(),
            version: 0,
        }
    }

    /// Whether the user plays in this session.
    #[must_use]
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.player1.id == user_id || self.player2.id == user_id
    }

    /// Borrow a player slot by stable id. Matching is by id, never by
    /// display name; duplicate names must not misattribute scores.
    #[must_use]
    pub fn player(&self, user_id: &str) -> Option<&DuelPlayer> {
        [&self.player1, &self.player2]
            .into_iter()
            .find(|player| player.id == user_id)
    }

    fn player_mut(&mut self, user_id: &str) -> Option<&mut DuelPlayer> {
        [&mut self.player1, &mut self.player2]
            .into_iter()
            .find(|player| player.id == user_id)
    }

    /// The opponent of the given participant.
    #[must_use]
    pub fn opponent_id(&self, user_id: &str) -> Option<&str> {
        if self.player1.id == user_id {
            Some(self.player2.id.as_str())
        } else if self.player2.id == user_id {
            Some(self.player1.id.as_str())
        } else {
            None
        }
    }

    /// Guard an attempted move without mutating anything. Clients run this
    /// before issuing a remote write; the store runs it again on commit.
    ///
    /// # Errors
    ///
    /// `SessionFinished`, `NotAParticipant`, or `OffTurn`.
    pub fn check_turn(&self, acting_user_id: &str) -> Result<(), DuelError> {
        if !self.status.is_active() {
            return Err(DuelError::SessionFinished {
                session_id: self.id.clone(),
            });
        }
        if !self.is_participant(acting_user_id) {
            return Err(DuelError::NotAParticipant {
                session_id: self.id.clone(),
                user_id: acting_user_id.to_string(),
            });
        }
        if self.current_turn_user_id != acting_user_id {
            return Err(DuelError::OffTurn {
                acting_user_id: acting_user_id.to_string(),
                current_turn_user_id: self.current_turn_user_id.clone(),
            });
        }
        Ok(())
    }

    /// Apply one accepted move: append to the log, credit the acting
    /// player's score, flip the turn token, stamp `last_move_at_ms`. One
    /// atomic transition; the move log and the score never diverge.
    ///
    /// # Errors
    ///
    /// Fails with the same guards as `check_turn`, mutating nothing.
    pub fn apply_move(
        &mut self,
        acting_user_id: &str,
        node_id: &str,
        points: u32,
        now_ms: i64,
    ) -> Result<(), DuelError> {
        self.check_turn(acting_user_id)?;

        self.moves.push(DuelMove {
            user_id: acting_user_id.to_string(),
            node_id: node_id.to_string(),
            timestamp_ms: now_ms,
        });
        if let Some(player) = self.player_mut(acting_user_id) {
            player.score += points;
        }
        if let Some(opponent) = self.opponent_id(acting_user_id).map(str::to_string) {
            self.current_turn_user_id = opponent;
        }
        self.last_move_at_ms = now_ms;
        Ok(())
    }

    /// Decide whether the session is due for settlement: every node in the
    /// category has been answered and the session is still active. Returns
    /// the wager split; equal scores settle as a draw.
    #[must_use]
    pub fn settlement_due(&self, total_nodes: usize) -> Option<WagerSettlement> {
        if !self.status.is_active() || self.moves.len() < total_nodes || total_nodes == 0 {
            return None;
        }
        let settlement = match self.player1.score.cmp(&self.player2.score) {
            std::cmp::Ordering::Greater => WagerSettlement {
                winner_id: Some(self.player1.id.clone()),
                loser_id: Some(self.player2.id.clone()),
                wager: self.wager_amount,
            },
            std::cmp::Ordering::Less => WagerSettlement {
                winner_id: Some(self.player2.id.clone()),
                loser_id: Some(self.player1.id.clone()),
                wager: self.wager_amount,
            },
            std::cmp::Ordering::Equal => WagerSettlement {
                winner_id: None,
                loser_id: None,
                wager: self.wager_amount,
            },
        };
        Some(settlement)
    }

    /// Transition to `Finished`, recording the winner. Idempotent: a second
    /// call is a no-op and reports `false`, which is what makes settlement
    /// exactly-once under duplicated notifications.
    pub fn finish(&mut self, winner_id: Option<&str>) -> bool {
        if !self.status.is_active() {
            return false;
        }
        self.status = DuelStatus::Finished;
        self.winner_id = winner_id.map(str::to_string);
        true
    }

    /// The wager outcome for one participant of a finished session.
    #[must_use]
    pub fn outcome_for(&self, user_id: &str) -> WagerOutcome {
        match self.winner_id.as_deref() {
            Some(winner) if winner == user_id => WagerOutcome::Won,
            Some(_) => WagerOutcome::Lost,
            None => WagerOutcome::Draw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge() -> AcceptedChallenge {
        AcceptedChallenge {
            invite_id: "inv-1".to_string(),
            challenger_id: "u-alp".to_string(),
            challenger_name: "Alp".to_string(),
            recipient_id: "u-asena".to_string(),
            wager: 100,
        }
    }

    fn session() -> DuelSession {
        DuelSession::from_challenge("duel-1", &challenge(), "Asena", "cat-1", 1_000)
    }

    #[test]
    fn challenger_is_player_one_and_moves_first() {
        let session = session();
        assert_eq!(session.player1.id, "u-alp");
        assert_eq!(session.player2.id, "u-asena");
        assert_eq!(session.current_turn_user_id, "u-alp");
        assert_eq!(session.status, DuelStatus::Active);
        assert!(session.moves.is_empty());
    }

    #[test]
    fn turns_alternate_strictly() {
        let mut session = session();
        for turn in 0..4 {
            let expected = if turn % 2 == 0 { "u-alp" } else { "u-asena" };
            assert_eq!(session.current_turn_user_id, expected);
            session
                .apply_move(expected, &format!("node-{turn}"), 150, 2_000 + turn)
                .unwrap();
        }
        assert_eq!(session.moves.len(), 4);
        assert_eq!(session.current_turn_user_id, "u-alp");
    }

    #[test]
    fn off_turn_move_rejected_without_mutation() {
        let mut session = session();
        let before = session.clone();
        let result = session.apply_move("u-asena", "node-0", 150, 2_000);
        assert_eq!(
            result,
            Err(DuelError::OffTurn {
                acting_user_id: "u-asena".to_string(),
                current_turn_user_id: "u-alp".to_string(),
            })
        );
        assert_eq!(session, before);
    }

    #[test]
    fn outsider_move_rejected() {
        let mut session = session();
        assert!(matches!(
            session.apply_move("u-stranger", "node-0", 150, 2_000),
            Err(DuelError::NotAParticipant { .. })
        ));
    }

    #[test]
    fn scores_are_monotonic_across_moves() {
        let mut session = session();
        let mut last = (0, 0);
        for turn in 0..6 {
            let actor = session.current_turn_user_id.clone();
            session
                .apply_move(&actor, &format!("node-{turn}"), 150, 2_000 + turn)
                .unwrap();
            let now = (session.player1.score, session.player2.score);
            assert!(now.0 >= last.0 && now.1 >= last.1);
            last = now;
        }
    }

    #[test]
    fn settlement_waits_for_all_nodes() {
        let mut session = session();
        session.apply_move("u-alp", "node-0", 150, 2_000).unwrap();
        assert!(session.settlement_due(3).is_none());

        session.apply_move("u-asena", "node-1", 150, 2_100).unwrap();
        session.apply_move("u-alp", "node-2", 150, 2_200).unwrap();
        let settlement = session.settlement_due(3).unwrap();
        // Alp answered two nodes, Asena one.
        assert_eq!(settlement.winner_id.as_deref(), Some("u-alp"));
        assert_eq!(settlement.loser_id.as_deref(), Some("u-asena"));
        assert_eq!(settlement.wager, 100);
    }

    #[test]
    fn equal_scores_settle_as_draw() {
        let mut session = session();
        session.apply_move("u-alp", "node-0", 150, 2_000).unwrap();
        session.apply_move("u-asena", "node-1", 150, 2_100).unwrap();
        let settlement = session.settlement_due(2).unwrap();
        assert_eq!(settlement.winner_id, None);
        assert_eq!(settlement.loser_id, None);
    }

    #[test]
    fn finish_is_one_way_and_idempotent() {
        let mut session = session();
        assert!(session.finish(Some("u-alp")));
        assert_eq!(session.status, DuelStatus::Finished);
        assert_eq!(session.winner_id.as_deref(), Some("u-alp"));

        assert!(!session.finish(Some("u-asena")));
        assert_eq!(session.winner_id.as_deref(), Some("u-alp"));

        assert!(matches!(
            session.apply_move("u-alp", "node-9", 150, 9_000),
            Err(DuelError::SessionFinished { .. })
        ));
        assert!(session.settlement_due(1).is_none());
    }

    #[test]
    fn outcome_for_maps_winner_loser_draw() {
        let mut session = session();
        session.finish(Some("u-alp"));
        assert_eq!(session.outcome_for("u-alp"), WagerOutcome::Won);
        assert_eq!(session.outcome_for("u-asena"), WagerOutcome::Lost);

        let mut draw = DuelSession::from_challenge("duel-2", &challenge(), "Asena", "cat-1", 0);
        draw.finish(None);
        assert_eq!(draw.outcome_for("u-alp"), WagerOutcome::Draw);
    }
}
