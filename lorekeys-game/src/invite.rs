//! Challenge invites: a minimal PENDING -> ACCEPTED/REJECTED machine.
//!
//! Accepting produces the typed summary the duel coordinator needs to spawn
//! exactly one session; terminal invites refuse any further response.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Resolution state of an invite. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl InviteStatus {
    /// Whether the invite can still be responded to.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending challenge from one user to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub id: String,
    pub from_id: String,
    pub from_name: String,
    pub to_id: String,
    #[serde(default)]
    pub status: InviteStatus,
    pub timestamp_ms: i64,
}

/// Errors raised when responding to an invite.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InviteError {
    /// The invite already reached a terminal state; no mutation happened.
    #[error("invite {invite_id} was already resolved as {status}")]
    AlreadyResolved {
        invite_id: String,
        status: InviteStatus,
    },
}

/// Summary handed to the duel coordinator when an invite is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedChallenge {
    pub invite_id: String,
    pub challenger_id: String,
    pub challenger_name: String,
    pub recipient_id: String,
    /// XP at stake, agreed by the recipient at accept time.
    pub wager: u32,
}

impl Invite {
    /// Create a fresh pending invite.
    #[must_use]
    pub fn new(id: &str, from_id: &str, from_name: &str, to_id: &str, now_ms: i64) -> Self {
        Self {
            id: id.to_string(),
            from_id: from_id.to_string(),
            from_name: from_name.to_string(),
            to_id: to_id.to_string(),
            status: InviteStatus::Pending,
            timestamp_ms: now_ms,
        }
    }

    fn guard_pending(&self) -> Result<(), InviteError> {
        if self.status.is_pending() {
            Ok(())
        } else {
            Err(InviteError::AlreadyResolved {
                invite_id: self.id.clone(),
                status: self.status,
            })
        }
    }

    /// Accept the challenge with the agreed wager, yielding the session
    /// seed for the duel coordinator.
    ///
    /// # Errors
    ///
    /// Returns `InviteError::AlreadyResolved` on a terminal invite.
    pub fn accept(&mut self, wager: u32) -> Result<AcceptedChallenge, InviteError> {
        self.guard_pending()?;
        self.status = InviteStatus::Accepted;
        Ok(AcceptedChallenge {
            invite_id: self.id.clone(),
            challenger_id: self.from_id.clone(),
            challenger_name: self.from_name.clone(),
            recipient_id: self.to_id.clone(),
            wager,
        })
    }

    /// Decline the challenge.
    ///
    /// # Errors
    ///
    /// Returns `InviteError::AlreadyResolved` on a terminal invite.
    pub fn reject(&mut self) -> Result<(), InviteError> {
        self.guard_pending()?;
        self.status = InviteStatus::Rejected;
        Ok(())
    }
}
