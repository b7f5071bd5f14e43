//! Remote synchronization: the gateway contract and the patch reducer.
//!
//! The remote store is consumed through `RemoteDuelGateway`; no wire format
//! is implied. Incoming session documents flow through
//! `apply_remote_session`, a one-directional reducer over local state:
//! stale versions are dropped, team mirrors are reconciled by player id,
//! and the `Active -> Finished` edge settles the wager exactly once.
use async_trait::async_trait;
use thiserror::Error;

use crate::constants::{
    LOG_DUEL_DRAW, LOG_DUEL_MOVE, LOG_DUEL_SETTLED, LOG_DUEL_STALE_PATCH,
};
use crate::duel::{DuelError, DuelSession, WagerSettlement};
use crate::invite::{Invite, InviteError, InviteStatus};
use crate::rewards::{WagerOutcome, XpGrant, apply_wager};
use crate::state::{GameMode, GameState};

/// Failures at the remote boundary. The core never retries; callers decide
/// whether to prompt for a manual retry.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Conditional write lost the race; re-read and reconsider.
    #[error("remote write conflicted (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
    #[error("duel session {session_id} does not exist")]
    UnknownSession { session_id: String },
    #[error("invite {invite_id} does not exist")]
    UnknownInvite { invite_id: String },
    /// The store-side turn guard rejected the move.
    #[error(transparent)]
    MoveRejected(#[from] DuelError),
    /// The store-side invite guard rejected the transition.
    #[error(transparent)]
    InviteRejected(#[from] InviteError),
    #[error("remote store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Callback invoked with every committed session document, in commit order.
pub type SessionCallback = Box<dyn Fn(DuelSession)>;
/// Callback invoked with invite documents relevant to the subscribed user.
pub type InviteCallback = Box<dyn Fn(Invite)>;

/// RAII handle for a subscription; dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    #[must_use]
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Abstract push/subscribe interface over the shared duel documents.
///
/// The client model is single-threaded with cooperative suspension, so the
/// trait is `?Send`. Writes are conditional: `commit_move` carries the
/// expected turn holder and version, and the store rejects mismatches
/// instead of letting a stale client clobber the document.
#[async_trait(?Send)]
pub trait RemoteDuelGateway {
    /// Publish a freshly created session document.
    async fn create_session(&self, session: &DuelSession) -> Result<(), SyncError>;

    /// Read the current session document.
    async fn fetch_session(&self, session_id: &str) -> Result<DuelSession, SyncError>;

    /// Commit one move as a single conditional write: append the move,
    /// credit the score, flip the turn, bump the version. Fails with
    /// `Conflict` when `expected_version` is stale and with `MoveRejected`
    /// when the store-side turn guard refuses.
    async fn commit_move(
        &self,
        session_id: &str,
        expected_turn_user_id: &str,
        expected_version: u64,
        node_id: &str,
        points: u32,
        now_ms: i64,
    ) -> Result<DuelSession, SyncError>;

    /// Terminal transition to FINISHED, recording the winner. Idempotent at
    /// the store: finishing a finished session is a no-op echo.
    async fn finish_session(
        &self,
        session_id: &str,
        winner_id: Option<&str>,
    ) -> Result<DuelSession, SyncError>;

    /// Subscribe to committed changes of one session, delivered in commit
    /// order. The returned handle unsubscribes on drop.
    fn subscribe(
        &self,
        session_id: &str,
        on_change: SessionCallback,
    ) -> Result<Subscription, SyncError>;

    /// Publish a new invite.
    async fn create_invite(&self, invite: &Invite) -> Result<(), SyncError>;

    /// Subscribe to invite documents involving the user: challenges
    /// addressed to them, and status changes of challenges they sent.
    fn subscribe_invites(
        &self,
        user_id: &str,
        on_incoming: InviteCallback,
    ) -> Result<Subscription, SyncError>;

    /// Resolve a pending invite to a terminal status.
    async fn resolve_invite(
        &self,
        invite_id: &str,
        status: InviteStatus,
    ) -> Result<Invite, SyncError>;
}

/// Deterministic session id for an accepted invite. Both clients derive it
/// locally, so neither has to learn it out of band.
#[must_use]
pub fn session_id_for_invite(invite_id: &str) -> String {
    format!("duel-{invite_id}")
}

/// Effects the reducer surfaced to the caller (UI layer or tester).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuelEvent {
    /// A move beyond the local mirror was applied remotely.
    MoveApplied { user_id: String, node_id: String },
    /// All nodes are answered; the session is due for settlement.
    CompletionDue(WagerSettlement),
    /// The session finished and the local user's side of the wager was
    /// applied.
    Settled {
        outcome: WagerOutcome,
        wager: u32,
        winner_id: Option<String>,
        xp: Option<XpGrant>,
    },
    /// A stale or duplicated notification was dropped.
    StalePatchDropped { version: u64 },
}

/// Apply one incoming session document to local state.
///
/// Pure with respect to the gateway: no writes are issued here. Duplicate
/// and reordered notifications are tolerated: version-stale patches are
/// dropped, and settlement runs exactly once because the duel binding is
/// cleared on the FINISHED edge, after which further patches for the
/// session no longer match.
pub fn apply_remote_session(state: &mut GameState, incoming: &DuelSession) -> Vec<DuelEvent> {
    let mut events = Vec::new();

    if state.active_duel_id.as_deref() != Some(incoming.id.as_str()) {
        return events;
    }
    if let Some(mirror) = &state.duel {
        if incoming.version <= mirror.version {
            state.journal(LOG_DUEL_STALE_PATCH);
            events.push(DuelEvent::StalePatchDropped {
                version: incoming.version,
            });
            return events;
        }
    }

    let known_moves = state.duel.as_ref().map_or(0, |mirror| mirror.moves.len());
    for entry in incoming.moves.iter().skip(known_moves) {
        state.journal(LOG_DUEL_MOVE);
        events.push(DuelEvent::MoveApplied {
            user_id: entry.user_id.clone(),
            node_id: entry.node_id.clone(),
        });
    }

    // The remote document is the arbiter of score truth; local teams are
    // caches keyed by stable player id.
    for player in [&incoming.player1, &incoming.player2] {
        let answered = incoming
            .moves
            .iter()
            .filter(|entry| entry.user_id == player.id)
            .count();
        if let Some(team) = state
            .teams
            .iter_mut()
            .find(|team| team.owner_id.as_deref() == Some(player.id.as_str()))
        {
            team.score = player.score;
            team.current_stage = u32::try_from(answered).unwrap_or(u32::MAX);
        }
    }

    state.duel = Some(incoming.clone());

    if incoming.status.is_active() {
        if let Some(total) = state.total_nodes_for(&incoming.category_id) {
            if let Some(settlement) = incoming.settlement_due(total) {
                events.push(DuelEvent::CompletionDue(settlement));
            }
        }
        return events;
    }

    // FINISHED edge: apply this user's side of the wager, then drop the
    // duel binding so replays of the terminal document no-op.
    let outcome = incoming.outcome_for(&state.user.id);
    let xp = apply_wager(&mut state.user, outcome, incoming.wager_amount);
    state.journal(if incoming.winner_id.is_some() {
        LOG_DUEL_SETTLED
    } else {
        LOG_DUEL_DRAW
    });
    state.mode = GameMode::Solo;
    state.active_duel_id = None;
    state.active_wager = None;
    events.push(DuelEvent::Settled {
        outcome,
        wager: incoming.wager_amount,
        winner_id: incoming.winner_id.clone(),
        xp,
    });

    events
}
