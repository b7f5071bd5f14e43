//! Sequential node completion and reward granting.
//!
//! The quest graph is strictly linear: completing the available node unlocks
//! the next locked one, exactly one node is playable at a time, and rewards
//! are granted exactly once per node regardless of duplicate requests.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{NodeStatus, QuestGraph};
use crate::constants::{NODE_COMPLETION_SCORE, NODE_COMPLETION_XP};
use crate::profile::{KeyRing, UserProfile};
use crate::rewards::{XpGrant, grant_xp};

/// Per-team run progress. One per participant; never deleted mid-session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProgress {
    pub name: String,
    /// Stable id of the owning player, set for duel mirrors. Reconciliation
    /// matches on this, never on the display name.
    #[serde(default)]
    pub owner_id: Option<String>,
    pub current_stage: u32,
    #[serde(default)]
    pub unlocked_keys: KeyRing,
    pub score: u32,
}

impl TeamProgress {
    /// Fresh team at stage zero.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner_id: None,
            current_stage: 0,
            unlocked_keys: KeyRing::new(),
            score: 0,
        }
    }

    /// Fresh team mirroring a duel participant.
    #[must_use]
    pub fn for_player(name: &str, owner_id: &str) -> Self {
        Self {
            owner_id: Some(owner_id.to_string()),
            ..Self::new(name)
        }
    }
}

/// Errors raised by `complete_node`. A failed call makes no mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressionError {
    /// The node is missing from the graph (`found: None`) or not currently
    /// available for completion.
    #[error("node {node_id} cannot be completed (state {found:?})")]
    InvalidNodeState {
        node_id: String,
        found: Option<NodeStatus>,
    },
}

/// Rewards granted by a successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReward {
    pub reward_key_id: String,
    /// Points credited to the team score; also the duel move score.
    pub points: u32,
    pub xp: XpGrant,
    /// Node made available by the strict linear unlock, if any remained.
    pub unlocked_node_id: Option<String>,
}

/// Result of a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The node paid out and the next node unlocked.
    Completed(CompletionReward),
    /// The node had already been completed; nothing changed. Distinct from
    /// an error so duplicate UI events and replayed notifications stay
    /// harmless.
    AlreadyCompleted,
}

impl CompletionOutcome {
    /// Borrow the reward when the completion actually happened.
    #[must_use]
    pub const fn reward(&self) -> Option<&CompletionReward> {
        match self {
            Self::Completed(reward) => Some(reward),
            Self::AlreadyCompleted => None,
        }
    }
}

/// Complete the available node `node_id`, granting its rewards and
/// unlocking the next locked node in order.
///
/// Completing an already-completed node is an idempotent no-op. Completing
/// a locked or unknown node fails without mutating graph, team, or user.
///
/// # Errors
///
/// Returns `ProgressionError::InvalidNodeState` for unknown or locked nodes.
pub fn complete_node(
    graph: &mut QuestGraph,
    node_id: &str,
    team: &mut TeamProgress,
    user: &mut UserProfile,
) -> Result<CompletionOutcome, ProgressionError> {
    let Some(index) = graph.position(node_id) else {
        return Err(ProgressionError::InvalidNodeState {
            node_id: node_id.to_string(),
            found: None,
        });
    };

    match graph.nodes[index].status {
        NodeStatus::Completed => return Ok(CompletionOutcome::AlreadyCompleted),
        NodeStatus::Locked => {
            return Err(ProgressionError::InvalidNodeState {
                node_id: node_id.to_string(),
                found: Some(NodeStatus::Locked),
            });
        }
        NodeStatus::Available => {}
    }

    graph.nodes[index].status = NodeStatus::Completed;
    let unlocked_node_id = graph.nodes[index + 1..]
        .iter_mut()
        .find(|node| node.status == NodeStatus::Locked)
        .map(|node| {
            node.status = NodeStatus::Available;
            node.id.clone()
        });

    let reward_key_id = graph.nodes[index].reward_key_id.clone();
    team.unlocked_keys.push(reward_key_id.clone());
    team.current_stage += 1;
    team.score += NODE_COMPLETION_SCORE;

    user.push_key(&reward_key_id);
    let xp = grant_xp(user, NODE_COMPLETION_XP);

    Ok(CompletionOutcome::Completed(CompletionReward {
        reward_key_id,
        points: NODE_COMPLETION_SCORE,
        xp,
        unlocked_node_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{QuestionKind, RiddleNode, TargetZone, UnlockKind};

    fn node(id: &str, order: u32) -> RiddleNode {
        RiddleNode {
            id: id.to_string(),
            title: format!("Node {order}"),
            order,
            status: NodeStatus::Locked,
            question_kind: QuestionKind::Year,
            question: String::new(),
            media_url: None,
            options: Vec::new(),
            answer: String::new(),
            unlock_kind: UnlockKind::Math,
            unlock_prompt: String::new(),
            unlock_options: Vec::new(),
            unlock_answer: String::new(),
            location_hint: String::new(),
            map_image_url: String::new(),
            target_zone: TargetZone::default(),
            reward_key_id: format!("KEY-{id}"),
        }
    }

    fn three_node_graph() -> QuestGraph {
        QuestGraph::from_nodes(vec![node("a", 0), node("b", 1), node("c", 2)])
    }

    #[test]
    fn completing_the_available_node_unlocks_the_next() {
        let mut graph = three_node_graph();
        let mut team = TeamProgress::new("Wardens");
        let mut user = UserProfile::new("u1", "Warden");

        let outcome = complete_node(&mut graph, "a", &mut team, &mut user).unwrap();
        let reward = outcome.reward().unwrap();

        assert_eq!(reward.reward_key_id, "KEY-a");
        assert_eq!(reward.unlocked_node_id.as_deref(), Some("b"));
        assert_eq!(graph.nodes[0].status, NodeStatus::Completed);
        assert_eq!(graph.nodes[1].status, NodeStatus::Available);
        assert_eq!(graph.nodes[2].status, NodeStatus::Locked);
        assert!(graph.is_well_formed());

        assert_eq!(team.score, 150);
        assert_eq!(team.current_stage, 1);
        assert_eq!(team.unlocked_keys.as_slice(), ["KEY-a"]);
        assert_eq!(user.xp, 250);
        assert_eq!(user.unlocked_keys.as_slice(), ["KEY-a"]);
    }

    #[test]
    fn duplicate_completion_is_a_no_op() {
        let mut graph = three_node_graph();
        let mut team = TeamProgress::new("Wardens");
        let mut user = UserProfile::new("u1", "Warden");

        complete_node(&mut graph, "a", &mut team, &mut user).unwrap();
        let snapshot = (graph.clone(), team.clone(), user.clone());

        let outcome = complete_node(&mut graph, "a", &mut team, &mut user).unwrap();
        assert_eq!(outcome, CompletionOutcome::AlreadyCompleted);
        assert_eq!((graph, team, user), snapshot);
    }

    #[test]
    fn locked_and_unknown_nodes_fail_without_mutation() {
        let mut graph = three_node_graph();
        let mut team = TeamProgress::new("Wardens");
        let mut user = UserProfile::new("u1", "Warden");
        let snapshot = (graph.clone(), team.clone(), user.clone());

        let locked = complete_node(&mut graph, "c", &mut team, &mut user);
        assert_eq!(
            locked,
            Err(ProgressionError::InvalidNodeState {
                node_id: "c".to_string(),
                found: Some(NodeStatus::Locked),
            })
        );

        let unknown = complete_node(&mut graph, "zzz", &mut team, &mut user);
        assert_eq!(
            unknown,
            Err(ProgressionError::InvalidNodeState {
                node_id: "zzz".to_string(),
                found: None,
            })
        );

        assert_eq!((graph, team, user), snapshot);
    }

    #[test]
    fn completing_the_last_node_unlocks_nothing() {
        let mut graph = three_node_graph();
        let mut team = TeamProgress::new("Wardens");
        let mut user = UserProfile::new("u1", "Warden");

        for id in ["a", "b", "c"] {
            complete_node(&mut graph, id, &mut team, &mut user).unwrap();
        }
        assert_eq!(graph.completed_count(), 3);
        assert!(graph.available_node().is_none());
        assert!(graph.is_well_formed());
        assert_eq!(team.current_stage, 3);
        assert_eq!(team.score, 450);
    }

    #[test]
    fn single_available_invariant_holds_across_a_run() {
        let mut graph = three_node_graph();
        let mut team = TeamProgress::new("Wardens");
        let mut user = UserProfile::new("u1", "Warden");

        assert!(graph.is_well_formed());
        for id in ["a", "b", "c"] {
            complete_node(&mut graph, id, &mut team, &mut user).unwrap();
            assert!(graph.is_well_formed());
        }
    }
}
