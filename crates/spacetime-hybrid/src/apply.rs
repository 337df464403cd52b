//! Applying single recommendations to the authoritative graph and
//! aggregating the outcomes of a batch.

use serde::{Deserialize, Serialize};

use spacetime_csr::NewEdge;
use spacetime_graph::{GraphError, SpacetimeGraph};

use crate::error::ApplyError;
use crate::recommendation::{RecommendationType, TopologyRecommendation};

// ─────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────

/// Why a recommendation changed nothing. Expected, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoOpReason {
    EdgeExists,
    EdgeAbsent,
    RequiresReinitialisation,
    NoAction,
}

impl std::fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoOpReason::EdgeExists               => write!(f, "edge already exists"),
            NoOpReason::EdgeAbsent               => write!(f, "edge absent"),
            NoOpReason::RequiresReinitialisation => write!(f, "requires reinitialisation"),
            NoOpReason::NoAction                 => write!(f, "no action"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    Created { a: u32, b: u32, weight: f64 },
    Removed { a: u32, b: u32, weight: f64 },
    Reweighted { a: u32, b: u32, from: f64, to: f64 },
    /// Weakened to zero or below and structurally deleted.
    WeakenedAway { a: u32, b: u32, from: f64 },
    NoOp(NoOpReason),
}

impl ApplyOutcome {
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Removed { .. } | Self::WeakenedAway { .. })
    }

    pub fn is_weight_only(&self) -> bool {
        matches!(self, Self::Reweighted { .. })
    }
}

// ─────────────────────────────────────────────
// Single recommendation
// ─────────────────────────────────────────────

/// Apply one recommendation. Out-of-range or self-loop pairs and invalid
/// magnitudes are errors; everything else resolves to an [`ApplyOutcome`].
pub fn apply_recommendation(
    graph: &mut SpacetimeGraph,
    rec: &TopologyRecommendation,
) -> Result<ApplyOutcome, ApplyError> {
    use RecommendationType as T;

    if rec.kind.requires_reinitialisation() {
        return Ok(ApplyOutcome::NoOp(NoOpReason::RequiresReinitialisation));
    }
    if rec.kind == T::None {
        return Ok(ApplyOutcome::NoOp(NoOpReason::NoAction));
    }

    let (a, b) = rec.pair();
    check_pair(graph, a, b)?;

    match rec.kind {
        T::CreateEdge => {
            if graph.add_edge(a, b, rec.weight)? {
                Ok(ApplyOutcome::Created { a, b, weight: rec.weight })
            } else {
                Ok(ApplyOutcome::NoOp(NoOpReason::EdgeExists))
            }
        }
        T::RemoveEdge => Ok(match graph.remove_edge(a, b)? {
            Some(weight) => ApplyOutcome::Removed { a, b, weight },
            None => ApplyOutcome::NoOp(NoOpReason::EdgeAbsent),
        }),
        T::StrengthenEdge => {
            let delta = check_magnitude(rec.weight)?;
            let Some(from) = graph.edge_weight(a, b) else {
                return Ok(ApplyOutcome::NoOp(NoOpReason::EdgeAbsent));
            };
            let to = from + delta;
            graph.set_edge_weight(a, b, to)?;
            Ok(ApplyOutcome::Reweighted { a, b, from, to })
        }
        T::WeakenEdge => {
            let delta = check_magnitude(rec.weight)?;
            let Some(from) = graph.edge_weight(a, b) else {
                return Ok(ApplyOutcome::NoOp(NoOpReason::EdgeAbsent));
            };
            let to = from - delta;
            if to <= 0.0 {
                graph.remove_edge(a, b)?;
                Ok(ApplyOutcome::WeakenedAway { a, b, from })
            } else {
                graph.set_edge_weight(a, b, to)?;
                Ok(ApplyOutcome::Reweighted { a, b, from, to })
            }
        }
        // reserved and `None` handled above
        T::CreateNode | T::RemoveNode | T::Rewire | T::None => {
            Ok(ApplyOutcome::NoOp(NoOpReason::NoAction))
        }
    }
}

fn check_pair(graph: &SpacetimeGraph, a: u32, b: u32) -> Result<(), GraphError> {
    let node_count = graph.node_count();
    for node in [a, b] {
        if node as usize >= node_count {
            return Err(GraphError::NodeOutOfRange { node: node as usize, node_count });
        }
    }
    if a == b {
        return Err(GraphError::SelfLoop(a as usize));
    }
    Ok(())
}

fn check_magnitude(delta: f64) -> Result<f64, ApplyError> {
    if !delta.is_finite() || delta < 0.0 {
        return Err(ApplyError::InvalidMagnitude(delta));
    }
    Ok(delta)
}

// ─────────────────────────────────────────────
// Batch
// ─────────────────────────────────────────────

/// Aggregated result of applying one cycle's recommendations.
#[derive(Debug, Default)]
pub struct ApplyBatchReport {
    pub structural:  usize,
    pub weight_only: usize,
    pub no_ops:      usize,
    pub failed:      usize,
    /// Per-recommendation errors: `(index_in_batch, error)`.
    pub errors:      Vec<(usize, ApplyError)>,
    /// Pairs structurally removed this batch.
    pub removed:     Vec<(u32, u32)>,
    /// Edges structurally created this batch.
    pub created:     Vec<NewEdge>,
}

impl ApplyBatchReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Created { a, b, weight } => {
                self.structural += 1;
                self.created.push(NewEdge::new(a, b, weight));
            }
            ApplyOutcome::Removed { a, b, .. } | ApplyOutcome::WeakenedAway { a, b, .. } => {
                self.structural += 1;
                self.removed.push((a, b));
            }
            ApplyOutcome::Reweighted { .. } => self.weight_only += 1,
            ApplyOutcome::NoOp(_) => self.no_ops += 1,
        }
    }

    pub fn record_failure(&mut self, index: usize, error: ApplyError) {
        self.failed += 1;
        self.errors.push((index, error));
    }

    /// Structural plus weight-only changes.
    pub fn changes(&self) -> usize {
        self.structural + self.weight_only
    }

    pub fn total(&self) -> usize {
        self.changes() + self.no_ops + self.failed
    }

    pub fn is_all_ok(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> SpacetimeGraph {
        SpacetimeGraph::from_edges(4, [(0, 1, 0.3), (1, 2, 0.5)]).unwrap()
    }

    #[test]
    fn create_is_idempotent() {
        let mut g = graph();
        let rec = TopologyRecommendation::create_edge(3, 0, 0.7, 1.0, "t");
        assert_eq!(
            apply_recommendation(&mut g, &rec).unwrap(),
            ApplyOutcome::Created { a: 0, b: 3, weight: 0.7 }
        );
        let v = g.topology_version();
        assert_eq!(
            apply_recommendation(&mut g, &rec).unwrap(),
            ApplyOutcome::NoOp(NoOpReason::EdgeExists)
        );
        assert_eq!(g.topology_version(), v);
    }

    #[test]
    fn weaken_below_zero_removes_edge() {
        let mut g = graph();
        let v = g.topology_version();
        let rec = TopologyRecommendation::weaken_edge(0, 1, 0.5, 1.0, "t");
        let outcome = apply_recommendation(&mut g, &rec).unwrap();
        assert_eq!(outcome, ApplyOutcome::WeakenedAway { a: 0, b: 1, from: 0.3 });
        assert!(!g.has_edge(0, 1));
        assert_eq!(g.topology_version(), v + 1);
    }

    #[test]
    fn strengthen_and_partial_weaken_keep_version() {
        let mut g = graph();
        let v = g.topology_version();
        apply_recommendation(&mut g, &TopologyRecommendation::strengthen_edge(1, 2, 0.25, 1.0, "t")).unwrap();
        assert_eq!(g.edge_weight(1, 2), Some(0.75));
        let out = apply_recommendation(&mut g, &TopologyRecommendation::weaken_edge(2, 1, 0.5, 1.0, "t")).unwrap();
        assert!(out.is_weight_only());
        assert_eq!(g.edge_weight(1, 2), Some(0.25));
        assert_eq!(g.topology_version(), v);
    }

    #[test]
    fn absent_edges_are_no_ops() {
        let mut g = graph();
        for rec in [
            TopologyRecommendation::remove_edge(0, 3, 1.0, "t"),
            TopologyRecommendation::strengthen_edge(0, 3, 0.1, 1.0, "t"),
            TopologyRecommendation::weaken_edge(0, 3, 0.1, 1.0, "t"),
        ] {
            assert_eq!(
                apply_recommendation(&mut g, &rec).unwrap(),
                ApplyOutcome::NoOp(NoOpReason::EdgeAbsent)
            );
        }
    }

    #[test]
    fn bad_indices_and_magnitudes_are_errors() {
        let mut g = graph();
        let out_of_range = TopologyRecommendation::create_edge(0, 42, 0.5, 1.0, "t");
        assert!(matches!(
            apply_recommendation(&mut g, &out_of_range),
            Err(ApplyError::Graph(GraphError::NodeOutOfRange { node: 42, .. }))
        ));
        let self_loop = TopologyRecommendation::remove_edge(2, 2, 1.0, "t");
        assert_eq!(
            apply_recommendation(&mut g, &self_loop),
            Err(ApplyError::Graph(GraphError::SelfLoop(2)))
        );
        let negative = TopologyRecommendation::weaken_edge(0, 1, -0.2, 1.0, "t");
        assert_eq!(apply_recommendation(&mut g, &negative), Err(ApplyError::InvalidMagnitude(-0.2)));
    }

    #[test]
    fn reserved_types_report_reinitialisation() {
        let mut g = graph();
        let rec = TopologyRecommendation::new(RecommendationType::CreateNode, 0, 0, 0.0, 1.0, "t");
        assert_eq!(
            apply_recommendation(&mut g, &rec).unwrap(),
            ApplyOutcome::NoOp(NoOpReason::RequiresReinitialisation)
        );
    }

    #[test]
    fn batch_report_tracks_structural_changes() {
        let mut report = ApplyBatchReport::empty();
        report.record(ApplyOutcome::Created { a: 0, b: 3, weight: 0.7 });
        report.record(ApplyOutcome::WeakenedAway { a: 0, b: 1, from: 0.3 });
        report.record(ApplyOutcome::Reweighted { a: 1, b: 2, from: 0.5, to: 0.6 });
        report.record(ApplyOutcome::NoOp(NoOpReason::EdgeAbsent));
        report.record_failure(4, ApplyError::InvalidMagnitude(f64::INFINITY));

        assert_eq!(report.structural, 2);
        assert_eq!(report.changes(), 3);
        assert_eq!(report.total(), 5);
        assert_eq!(report.removed, vec![(0, 1)]);
        assert_eq!(report.created, vec![NewEdge::new(0, 3, 0.7)]);
        assert!(!report.is_all_ok());
    }
}
