use serde::{Deserialize, Serialize};

use spacetime_graph::normalize_pair;

// ─────────────────────────────────────────────
// RecommendationType
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecommendationType {
    CreateEdge,
    RemoveEdge,
    StrengthenEdge,
    WeakenEdge,
    /// Reserved: node count is fixed per topology epoch.
    CreateNode,
    /// Reserved: node count is fixed per topology epoch.
    RemoveNode,
    /// Reserved: rewiring is expressed as Remove + Create for now.
    Rewire,
    None,
}

impl RecommendationType {
    /// Types that address an undirected pair and take part in conflict
    /// resolution.
    pub fn touches_edge(self) -> bool {
        matches!(
            self,
            Self::CreateEdge | Self::RemoveEdge | Self::StrengthenEdge | Self::WeakenEdge | Self::Rewire
        )
    }

    /// Types with no apply path in the current topology epoch model.
    pub fn requires_reinitialisation(self) -> bool {
        matches!(self, Self::CreateNode | Self::RemoveNode | Self::Rewire)
    }
}

impl std::fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreateEdge     => "create_edge",
            Self::RemoveEdge     => "remove_edge",
            Self::StrengthenEdge => "strengthen_edge",
            Self::WeakenEdge     => "weaken_edge",
            Self::CreateNode     => "create_node",
            Self::RemoveNode     => "remove_node",
            Self::Rewire         => "rewire",
            Self::None           => "none",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────
// TopologyRecommendation
// ─────────────────────────────────────────────

/// Proposed topology mutation emitted by an analysis module.
///
/// `weight` is the new edge weight for `CreateEdge` and the magnitude of the
/// change for `StrengthenEdge` / `WeakenEdge`. Higher `priority` wins
/// conflicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyRecommendation {
    pub kind:     RecommendationType,
    pub node_a:   u32,
    pub node_b:   u32,
    pub weight:   f64,
    pub priority: f64,
    pub source:   String,
}

impl TopologyRecommendation {
    pub fn new(
        kind: RecommendationType,
        node_a: u32,
        node_b: u32,
        weight: f64,
        priority: f64,
        source: impl Into<String>,
    ) -> Self {
        Self { kind, node_a, node_b, weight, priority, source: source.into() }
    }

    pub fn create_edge(a: u32, b: u32, weight: f64, priority: f64, source: impl Into<String>) -> Self {
        Self::new(RecommendationType::CreateEdge, a, b, weight, priority, source)
    }

    pub fn remove_edge(a: u32, b: u32, priority: f64, source: impl Into<String>) -> Self {
        Self::new(RecommendationType::RemoveEdge, a, b, 0.0, priority, source)
    }

    pub fn strengthen_edge(a: u32, b: u32, delta: f64, priority: f64, source: impl Into<String>) -> Self {
        Self::new(RecommendationType::StrengthenEdge, a, b, delta, priority, source)
    }

    pub fn weaken_edge(a: u32, b: u32, delta: f64, priority: f64, source: impl Into<String>) -> Self {
        Self::new(RecommendationType::WeakenEdge, a, b, delta, priority, source)
    }

    /// Normalised `(min, max)` pair used for conflict resolution.
    pub fn pair(&self) -> (u32, u32) {
        normalize_pair(self.node_a, self.node_b)
    }
}

impl std::fmt::Display for TopologyRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}, {}, w={:.4}, pri={:.3}, src={})",
            self.kind, self.node_a, self.node_b, self.weight, self.priority, self.source
        )
    }
}
