//! In-process remote store used by integration tests and the QA tester.
//!
//! Behaves as the authoritative arbiter the protocol assumes: one writer at
//! a time, conditional writes on version and turn, notifications delivered
//! to every subscriber in commit order.
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::duel::sync::{
    InviteCallback, RemoteDuelGateway, SessionCallback, Subscription, SyncError,
};
use crate::duel::{DuelSession, DuelStatus};
use crate::invite::{Invite, InviteError, InviteStatus};

#[derive(Default)]
struct Docs {
    sessions: HashMap<String, DuelSession>,
    invites: HashMap<String, Invite>,
}

#[derive(Default)]
struct Subs {
    sessions: Vec<(u64, String, Rc<dyn Fn(DuelSession)>)>,
    invites: Vec<(u64, String, Rc<dyn Fn(Invite)>)>,
}

#[derive(Default)]
struct Inner {
    docs: RefCell<Docs>,
    subs: RefCell<Subs>,
    next_sub: Cell<u64>,
}

/// Shared in-memory remote store. Cheap to clone; clones share documents
/// and subscribers, standing in for the one remote database both clients
/// talk to.
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    inner: Rc<Inner>,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn notify_session(&self, snapshot: &DuelSession) {
        // Collect handles first so a callback that subscribes or drops a
        // subscription does not alias the borrow.
        let callbacks: Vec<Rc<dyn Fn(DuelSession)>> = self
            .inner
            .subs
            .borrow()
            .sessions
            .iter()
            .filter(|(_, session_id, _)| session_id == &snapshot.id)
            .map(|(_, _, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(snapshot.clone());
        }
    }

    fn notify_invite(&self, snapshot: &Invite) {
        let callbacks: Vec<Rc<dyn Fn(Invite)>> = self
            .inner
            .subs
            .borrow()
            .invites
            .iter()
            .filter(|(_, user_id, _)| user_id == &snapshot.to_id || user_id == &snapshot.from_id)
            .map(|(_, _, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(snapshot.clone());
        }
    }

    fn subscription(&self, sub_id: u64, session_kind: bool) -> Subscription {
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut subs = inner.subs.borrow_mut();
                if session_kind {
                    subs.sessions.retain(|(id, _, _)| *id != sub_id);
                } else {
                    subs.invites.retain(|(id, _, _)| *id != sub_id);
                }
            }
        })
    }

    fn next_sub_id(&self) -> u64 {
        let id = self.inner.next_sub.get();
        self.inner.next_sub.set(id + 1);
        id
    }
}

#[async_trait(?Send)]
impl RemoteDuelGateway for InMemoryRemote {
    async fn create_session(&self, session: &DuelSession) -> Result<(), SyncError> {
        self.inner
            .docs
            .borrow_mut()
            .sessions
            .insert(session.id.clone(), session.clone());
        self.notify_session(session);
        Ok(())
    }

    async fn fetch_session(&self, session_id: &str) -> Result<DuelSession, SyncError> {
        self.inner
            .docs
            .borrow()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownSession {
                session_id: session_id.to_string(),
            })
    }

    async fn commit_move(
        &self,
        session_id: &str,
        expected_turn_user_id: &str,
        expected_version: u64,
        node_id: &str,
        points: u32,
        now_ms: i64,
    ) -> Result<DuelSession, SyncError> {
        let snapshot = {
            let mut docs = self.inner.docs.borrow_mut();
            let session =
                docs.sessions
                    .get_mut(session_id)
                    .ok_or_else(|| SyncError::UnknownSession {
                        session_id: session_id.to_string(),
                    })?;
            if session.version != expected_version {
                return Err(SyncError::Conflict {
                    expected: expected_version,
                    found: session.version,
                });
            }
            session.apply_move(expected_turn_user_id, node_id, points, now_ms)?;
            session.version += 1;
            session.clone()
        };
        self.notify_session(&snapshot);
        Ok(snapshot)
    }

    async fn finish_session(
        &self,
        session_id: &str,
        winner_id: Option<&str>,
    ) -> Result<DuelSession, SyncError> {
        let (snapshot, transitioned) = {
            let mut docs = self.inner.docs.borrow_mut();
            let session =
                docs.sessions
                    .get_mut(session_id)
                    .ok_or_else(|| SyncError::UnknownSession {
                        session_id: session_id.to_string(),
                    })?;
            if session.status == DuelStatus::Finished {
                // Idempotent echo; settlement already committed.
                (session.clone(), false)
            } else {
                session.finish(winner_id);
                session.version += 1;
                (session.clone(), true)
            }
        };
        if transitioned {
            self.notify_session(&snapshot);
        }
        Ok(snapshot)
    }

    fn subscribe(
        &self,
        session_id: &str,
        on_change: SessionCallback,
    ) -> Result<Subscription, SyncError> {
        let sub_id = self.next_sub_id();
        self.inner.subs.borrow_mut().sessions.push((
            sub_id,
            session_id.to_string(),
            Rc::from(on_change),
        ));
        Ok(self.subscription(sub_id, true))
    }

    async fn create_invite(&self, invite: &Invite) -> Result<(), SyncError> {
        self.inner
            .docs
            .borrow_mut()
            .invites
            .insert(invite.id.clone(), invite.clone());
        self.notify_invite(invite);
        Ok(())
    }

    fn subscribe_invites(
        &self,
        user_id: &str,
        on_incoming: InviteCallback,
    ) -> Result<Subscription, SyncError> {
        let sub_id = self.next_sub_id();
        self.inner.subs.borrow_mut().invites.push((
            sub_id,
            user_id.to_string(),
            Rc::from(on_incoming),
        ));
        Ok(self.subscription(sub_id, false))
    }

    async fn resolve_invite(
        &self,
        invite_id: &str,
        status: InviteStatus,
    ) -> Result<Invite, SyncError> {
        let snapshot = {
            let mut docs = self.inner.docs.borrow_mut();
            let invite =
                docs.invites
                    .get_mut(invite_id)
                    .ok_or_else(|| SyncError::UnknownInvite {
                        invite_id: invite_id.to_string(),
                    })?;
            if !invite.status.is_pending() {
                return Err(SyncError::InviteRejected(InviteError::AlreadyResolved {
                    invite_id: invite.id.clone(),
                    status: invite.status,
                }));
            }
            if status.is_pending() {
                return Err(SyncError::Unavailable {
                    reason: String::from("an invite cannot be resolved back to PENDING"),
                });
            }
            invite.status = status;
            invite.clone()
        };
        self.notify_invite(&snapshot);
        Ok(snapshot)
    }
}
