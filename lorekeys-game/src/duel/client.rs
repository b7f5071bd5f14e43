//! Client shell for the duel path: narrow async commands over shared state.
//!
//! One `DuelGameClient` runs per player process, single-threaded with
//! cooperative suspension around remote I/O. The shell never applies
//! optimistic duel state: it issues conditional writes and lets the
//! subscription echo drive the local mirror through the patch reducer.
use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::constants::{LOG_INVITE_ACCEPTED, LOG_INVITE_REJECTED, NODE_COMPLETION_SCORE};
use crate::duel::sync::{
    DuelEvent, RemoteDuelGateway, Subscription, SyncError, apply_remote_session,
    session_id_for_invite,
};
use crate::duel::{DuelError, DuelSession, WagerSettlement};
use crate::invite::{Invite, InviteError, InviteStatus};
use crate::progression::{CompletionOutcome, CompletionReward, ProgressionError, complete_node};
use crate::rewards::{GuildStore, XpGrant, contribute_to_guild};
use crate::state::{CommandError, GameState};

/// Errors surfaced by duel client commands.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Duel(#[from] DuelError),
    #[error(transparent)]
    Invite(#[from] InviteError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Progression(#[from] ProgressionError),
    #[error("invite {invite_id} is not known to this client")]
    UnknownInvite { invite_id: String },
}

/// Per-client duel coordinator: binds the local game state to the remote
/// gateway and exposes the narrow duel commands.
pub struct DuelGameClient<G: RemoteDuelGateway> {
    gateway: Rc<G>,
    state: Rc<RefCell<GameState>>,
    events: Rc<RefCell<Vec<DuelEvent>>>,
    session_sub: Option<Subscription>,
    invite_sub: Option<Subscription>,
}

impl<G: RemoteDuelGateway> DuelGameClient<G> {
    #[must_use]
    pub fn new(gateway: Rc<G>, state: Rc<RefCell<GameState>>) -> Self {
        Self {
            gateway,
            state,
            events: Rc::default(),
            session_sub: None,
            invite_sub: None,
        }
    }

    /// Shared handle to the client's game state.
    #[must_use]
    pub fn state(&self) -> Rc<RefCell<GameState>> {
        Rc::clone(&self.state)
    }

    /// Drain the duel events produced by remote notifications since the
    /// last call. The UI layer renders these.
    #[must_use]
    pub fn drain_events(&self) -> Vec<DuelEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    /// Start mirroring invite documents that involve this user.
    ///
    /// # Errors
    ///
    /// Propagates `SyncError` from the gateway subscription.
    pub fn watch_invites(&mut self) -> Result<(), ClientError> {
        let user_id = self.state.borrow().user.id.clone();
        let state = Rc::clone(&self.state);
        let sub = self.gateway.subscribe_invites(
            &user_id,
            Box::new(move |invite| {
                let mut state = state.borrow_mut();
                match state.invites.iter().position(|known| known.id == invite.id) {
                    Some(index) => state.invites[index] = invite,
                    None => state.invites.push(invite),
                }
            }),
        )?;
        self.invite_sub = Some(sub);
        Ok(())
    }

    /// Send a challenge to another player.
    ///
    /// # Errors
    ///
    /// Propagates `SyncError` from the remote write.
    pub async fn challenge(
        &mut self,
        invite_id: &str,
        to_id: &str,
        now_ms: i64,
    ) -> Result<Invite, ClientError> {
        let invite = {
            let state = self.state.borrow();
            Invite::new(invite_id, &state.user.id, &state.user.username, to_id, now_ms)
        };
        self.gateway.create_invite(&invite).await?;
        Ok(invite)
    }

    /// Accept an incoming challenge with the agreed wager, creating exactly
    /// one duel session on the chosen category and binding to it.
    ///
    /// # Errors
    ///
    /// `UnknownInvite` when the invite is not mirrored locally,
    /// `InviteError::AlreadyResolved` on terminal invites, `SyncError` on
    /// remote failures.
    pub async fn accept_invite(
        &mut self,
        invite_id: &str,
        wager: u32,
        category_id: &str,
        now_ms: i64,
    ) -> Result<DuelSession, ClientError> {
        let (challenge, recipient_name) = {
            let mut state = self.state.borrow_mut();
            let recipient_name = state.user.username.clone();
            let invite = state
                .invites
                .iter_mut()
                .find(|invite| invite.id == invite_id)
                .ok_or_else(|| ClientError::UnknownInvite {
                    invite_id: invite_id.to_string(),
                })?;
            let challenge = invite.accept(wager)?;
            state.journal(LOG_INVITE_ACCEPTED);
            (challenge, recipient_name)
        };

        let session = DuelSession::from_challenge(
            &session_id_for_invite(invite_id),
            &challenge,
            &recipient_name,
            category_id,
            now_ms,
        );
        // Publish the session before resolving the invite so the challenger
        // can fetch it as soon as it learns of the acceptance.
        self.gateway.create_session(&session).await?;
        self.gateway
            .resolve_invite(invite_id, InviteStatus::Accepted)
            .await?;
        self.attach(&session)?;
        Ok(session)
    }

    /// Decline an incoming challenge.
    ///
    /// # Errors
    ///
    /// `UnknownInvite`, `InviteError::AlreadyResolved`, or `SyncError`.
    pub async fn reject_invite(&mut self, invite_id: &str) -> Result<(), ClientError> {
        {
            let mut state = self.state.borrow_mut();
            let invite = state
                .invites
                .iter_mut()
                .find(|invite| invite.id == invite_id)
                .ok_or_else(|| ClientError::UnknownInvite {
                    invite_id: invite_id.to_string(),
                })?;
            invite.reject()?;
            state.journal(LOG_INVITE_REJECTED);
        }
        self.gateway
            .resolve_invite(invite_id, InviteStatus::Rejected)
            .await?;
        Ok(())
    }

    /// Join the session spawned by an invite this client sent, once the
    /// recipient accepted it.
    ///
    /// # Errors
    ///
    /// `SyncError::UnknownSession` until the session exists.
    pub async fn join_session(&mut self, invite_id: &str) -> Result<DuelSession, ClientError> {
        let session = self
            .gateway
            .fetch_session(&session_id_for_invite(invite_id))
            .await?;
        self.attach(&session)?;
        Ok(session)
    }

    /// Submit the completion of `node_id` as this player's move.
    ///
    /// The turn check runs first: off-turn attempts are rejected before any
    /// local mutation, and the attempted node completion is discarded. On
    /// an accepted turn the node completes locally (rewards, keys, guild
    /// share), then one conditional remote write commits the move. Local
    /// duel mirrors update only when the subscription echo arrives.
    ///
    /// # Errors
    ///
    /// `DuelError::NoActiveDuel` / `OffTurn`, progression failures, or
    /// `SyncError` from the remote write.
    pub async fn submit_move<S: GuildStore>(
        &mut self,
        node_id: &str,
        guild_store: &S,
        now_ms: i64,
    ) -> Result<CompletionReward, ClientError> {
        let (session_id, acting_user_id, expected_version, points, reward) = {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            let mirror = state.duel.clone().ok_or(DuelError::NoActiveDuel)?;
            mirror.check_turn(&state.user.id)?;

            let user_id = state.user.id.clone();
            let team_index = state
                .teams
                .iter()
                .position(|team| team.owner_id.as_deref() == Some(user_id.as_str()))
                .ok_or(DuelError::NoActiveDuel)?;
            let category = state
                .catalog
                .category_mut(&mirror.category_id)
                .ok_or_else(|| CommandError::UnknownCategory {
                    category_id: mirror.category_id.clone(),
                })?;

            let outcome = complete_node(
                &mut category.graph,
                node_id,
                &mut state.teams[team_index],
                &mut state.user,
            )?;
            let reward = match outcome {
                CompletionOutcome::Completed(reward) => reward,
                // Already paid locally; the move still counts remotely.
                CompletionOutcome::AlreadyCompleted => CompletionReward {
                    reward_key_id: String::new(),
                    points: NODE_COMPLETION_SCORE,
                    xp: XpGrant {
                        amount: 0,
                        leveled_up: false,
                        level: state.user.level,
                    },
                    unlocked_node_id: None,
                },
            };
            contribute_to_guild(guild_store, &state.user, reward.points);
            (
                mirror.id.clone(),
                user_id,
                mirror.version,
                reward.points,
                reward,
            )
        };

        self.gateway
            .commit_move(
                &session_id,
                &acting_user_id,
                expected_version,
                node_id,
                points,
                now_ms,
            )
            .await?;
        Ok(reward)
    }

    /// Run the completion check against the local mirror; the first client
    /// to detect a full move log issues the terminal write. Safe to call
    /// any number of times: once the session is finished (locally or
    /// remotely) it is a no-op.
    ///
    /// # Errors
    ///
    /// `SyncError` from the terminal write.
    pub async fn check_completion(&mut self) -> Result<Option<WagerSettlement>, ClientError> {
        let due = {
            let state = self.state.borrow();
            let Some(mirror) = state.duel.as_ref() else {
                return Ok(None);
            };
            state
                .total_nodes_for(&mirror.category_id)
                .and_then(|total| mirror.settlement_due(total))
                .map(|settlement| (mirror.id.clone(), settlement))
        };
        let Some((session_id, settlement)) = due else {
            return Ok(None);
        };
        self.gateway
            .finish_session(&session_id, settlement.winner_id.as_deref())
            .await?;
        Ok(Some(settlement))
    }

    /// Stop listening to the current session, e.g. after settlement.
    pub fn detach(&mut self) {
        self.session_sub = None;
    }

    fn attach(&mut self, session: &DuelSession) -> Result<(), ClientError> {
        self.state.borrow_mut().bind_duel(session);
        let state = Rc::clone(&self.state);
        let events = Rc::clone(&self.events);
        let sub = self.gateway.subscribe(
            &session.id,
            Box::new(move |incoming| {
                let mut state = state.borrow_mut();
                let produced = apply_remote_session(&mut state, &incoming);
                events.borrow_mut().extend(produced);
            }),
        )?;
        self.session_sub = Some(sub);
        Ok(())
    }
}
