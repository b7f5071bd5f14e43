//! Content catalog: riddle nodes, quest graphs, and the category hierarchy.
//!
//! The catalog is authored externally and consumed read-only by the core.
//! Node `status` is the one field the progression engine mutates in place.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle of a single riddle node. Transitions only move forward:
/// `Locked -> Available -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    #[default]
    Locked,
    Available,
    Completed,
}

impl NodeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "LOCKED",
            Self::Available => "AVAILABLE",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the riddle question expects to be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    /// Answer is a calendar year.
    #[default]
    Year,
    /// Free-text answer compared case-insensitively.
    Text,
    /// One of the listed options.
    MultipleChoice,
}

/// How the unlock step expects to be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnlockKind {
    /// Numeric result of the node's unlock formula.
    #[default]
    Math,
    Text,
    MultipleChoice,
}

/// Map region the reward key is hidden in, as a fraction of the map image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TargetZone {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// A single unlockable step in a quest graph.
///
/// The question and unlock payloads are opaque to the progression engine;
/// only `order`, `status`, and `reward_key_id` drive the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiddleNode {
    pub id: String,
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub status: NodeStatus,

    // Question part
    #[serde(default)]
    pub question_kind: QuestionKind,
    pub question: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,

    // Unlock part
    #[serde(default)]
    pub unlock_kind: UnlockKind,
    pub unlock_prompt: String,
    #[serde(default)]
    pub unlock_options: Vec<String>,
    pub unlock_answer: String,

    // Field hints
    #[serde(default)]
    pub location_hint: String,
    #[serde(default)]
    pub map_image_url: String,
    #[serde(default)]
    pub target_zone: TargetZone,

    pub reward_key_id: String,
}

impl RiddleNode {
    /// Whether the node can currently be played.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self.status, NodeStatus::Available)
    }

    /// Whether the node has already paid out its reward.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.status, NodeStatus::Completed)
    }
}

/// Ordered node sequence for one category (or one period of a category).
///
/// Invariant: at most one node is `Available` at any time, and statuses only
/// move forward. `normalize` establishes the initial shape; the progression
/// engine maintains it from then on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QuestGraph {
    pub nodes: Vec<RiddleNode>,
}

impl QuestGraph {
    /// Create an empty graph (useful for tests).
    #[must_use]
    pub fn empty() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Build a graph from pre-parsed nodes, sorting by `order` and
    /// normalizing statuses for a fresh run.
    #[must_use]
    pub fn from_nodes(mut nodes: Vec<RiddleNode>) -> Self {
        nodes.sort_by_key(|node| node.order);
        let mut graph = Self { nodes };
        graph.normalize();
        graph
    }

    /// Reset statuses so exactly the first node is `Available` and the rest
    /// are `Locked`. Completed nodes are also reset; this is a fresh start.
    pub fn normalize(&mut self) {
        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.status = if index == 0 {
                NodeStatus::Available
            } else {
                NodeStatus::Locked
            };
        }
    }

    /// Sort nodes by `order` and, when the feed ships a fully locked graph,
    /// make the first node playable. Feeds that author their own statuses
    /// are left alone.
    pub fn ensure_playable(&mut self) {
        self.nodes.sort_by_key(|node| node.order);
        if self.nodes.iter().all(|node| node.status == NodeStatus::Locked) {
            if let Some(first) = self.nodes.first_mut() {
                first.status = NodeStatus::Available;
            }
        }
    }

    /// Total number of nodes; duel completion is keyed on this.
    #[must_use]
    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Index of the node with the given id, if any.
    #[must_use]
    pub fn position(&self, node_id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == node_id)
    }

    /// Borrow a node by id.
    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&RiddleNode> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    /// The currently playable node, if any.
    #[must_use]
    pub fn available_node(&self) -> Option<&RiddleNode> {
        self.nodes.iter().find(|node| node.is_available())
    }

    /// Count of completed nodes.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_completed()).count()
    }

    /// Check the single-`Available` invariant. The graph is well formed when
    /// zero or one node is `Available`, and if one, it is the lowest-order
    /// node that is not `Completed`.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let available: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_available())
            .map(|(index, _)| index)
            .collect();
        match available.as_slice() {
            [] => true,
            [index] => self.nodes[..*index].iter().all(RiddleNode::is_completed),
            _ => false,
        }
    }
}

/// A category of riddles: one quest graph plus display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub graph: QuestGraph,
}

/// Optional grouping of categories into a broader unit of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Complete content feed as published by the authoring console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Catalog {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub periods: Vec<Period>,
}

/// Errors raised while consuming a content feed.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("content feed is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("category {category_id} has duplicate node order {order}")]
    DuplicateOrder { category_id: String, order: u32 },
}

impl Catalog {
    /// Create an empty catalog (useful for tests).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a catalog from the JSON content feed, verify node ordering,
    /// and make freshly authored graphs playable.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` when the feed is malformed or a category
    /// carries duplicate node orders.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let mut catalog: Self = serde_json::from_str(json)?;
        for category in catalog.all_categories() {
            let mut seen = std::collections::HashSet::new();
            for node in &category.graph.nodes {
                if !seen.insert(node.order) {
                    return Err(CatalogError::DuplicateOrder {
                        category_id: category.id.clone(),
                        order: node.order,
                    });
                }
            }
        }
        catalog.for_each_graph_mut(QuestGraph::ensure_playable);
        Ok(catalog)
    }

    /// Iterate every category, whether top-level or nested in a period.
    pub fn all_categories(&self) -> impl Iterator<Item = &Category> {
        self.categories
            .iter()
            .chain(self.periods.iter().flat_map(|period| period.categories.iter()))
    }

    /// Find a category by id across the whole hierarchy.
    #[must_use]
    pub fn category(&self, category_id: &str) -> Option<&Category> {
        self.all_categories().find(|category| category.id == category_id)
    }

    /// Visit every quest graph across the hierarchy mutably.
    pub fn for_each_graph_mut(&mut self, mut visit: impl FnMut(&mut QuestGraph)) {
        for category in &mut self.categories {
            visit(&mut category.graph);
        }
        for period in &mut self.periods {
            for category in &mut period.categories {
                visit(&mut category.graph);
            }
        }
    }

    /// Mutable lookup; the progression engine updates node statuses in place.
    pub fn category_mut(&mut self, category_id: &str) -> Option<&mut Category> {
        if let Some(category) = self
            .categories
            .iter_mut()
            .find(|category| category.id == category_id)
        {
            return Some(category);
        }
        self.periods
            .iter_mut()
            .flat_map(|period| period.categories.iter_mut())
            .find(|category| category.id == category_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, order: u32) -> RiddleNode {
        RiddleNode {
            id: id.to_string(),
            title: format!("Node {order}"),
            order,
            status: NodeStatus::Locked,
            question_kind: QuestionKind::Year,
            question: "In which year?".to_string(),
            media_url: None,
            options: Vec::new(),
            answer: "1453".to_string(),
            unlock_kind: UnlockKind::Math,
            unlock_prompt: "(digit_sum * 2)".to_string(),
            unlock_options: Vec::new(),
            unlock_answer: "26".to_string(),
            location_hint: String::new(),
            map_image_url: String::new(),
            target_zone: TargetZone::default(),
            reward_key_id: format!("KEY-{order}"),
        }
    }

    #[test]
    fn from_nodes_sorts_and_normalizes() {
        let graph = QuestGraph::from_nodes(vec![node("b", 2), node("a", 1), node("c", 3)]);
        assert_eq!(graph.nodes[0].id, "a");
        assert_eq!(graph.nodes[0].status, NodeStatus::Available);
        assert_eq!(graph.nodes[1].status, NodeStatus::Locked);
        assert_eq!(graph.nodes[2].status, NodeStatus::Locked);
        assert!(graph.is_well_formed());
    }

    #[test]
    fn well_formed_rejects_double_available() {
        let mut graph = QuestGraph::from_nodes(vec![node("a", 1), node("b", 2)]);
        graph.nodes[1].status = NodeStatus::Available;
        assert!(!graph.is_well_formed());
    }

    #[test]
    fn catalog_feed_roundtrip_and_lookup() {
        let json = r#"{
            "categories": [
                {
                    "id": "cat-conquest",
                    "name": "Age of Conquest",
                    "graph": { "nodes": [
                        {
                            "id": "node-1",
                            "title": "The Fall",
                            "order": 0,
                            "question": "In which year did the city fall?",
                            "answer": "1453",
                            "unlock_prompt": "(digit_sum * 2)",
                            "unlock_answer": "26",
                            "reward_key_id": "KEY-1"
                        }
                    ] }
                }
            ]
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        let category = catalog.category("cat-conquest").unwrap();
        assert_eq!(category.graph.total_nodes(), 1);
        assert_eq!(category.graph.nodes[0].question_kind, QuestionKind::Year);
        // Feeds without authored statuses become playable on ingest.
        assert_eq!(category.graph.nodes[0].status, NodeStatus::Available);
        assert!(catalog.category("missing").is_none());
    }

    #[test]
    fn catalog_feed_rejects_duplicate_orders() {
        let json = r#"{
            "categories": [
                {
                    "id": "cat-dup",
                    "name": "Broken",
                    "graph": { "nodes": [
                        {
                            "id": "n1", "title": "A", "order": 1,
                            "question": "?", "answer": "x",
                            "unlock_prompt": "?", "unlock_answer": "y",
                            "reward_key_id": "K1"
                        },
                        {
                            "id": "n2", "title": "B", "order": 1,
                            "question": "?", "answer": "x",
                            "unlock_prompt": "?", "unlock_answer": "y",
                            "reward_key_id": "K2"
                        }
                    ] }
                }
            ]
        }"#;
        assert!(matches!(
            Catalog::from_json(json),
            Err(CatalogError::DuplicateOrder { .. })
        ));
    }
}
