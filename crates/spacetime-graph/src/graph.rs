//! [`SpacetimeGraph`]: the authoritative, mutable graph.
//!
//! Every structural mutation (edge add/remove) bumps `topology_version` by
//! exactly one and folds the pair into the structural hash. Weight-only
//! changes touch neither; they advance `weight_epoch` instead, as does every
//! structural change.

use crate::adjacency::SymmetricAdjacency;
use crate::error::GraphError;
use crate::model::{pair_mix, EdgeRef, NodeState, TopologySignature};

#[derive(Debug, Clone)]
pub struct SpacetimeGraph {
    adjacency:        SymmetricAdjacency,
    states:           Vec<NodeState>,
    scalar_field:     Vec<f64>,
    topology_version: u64,
    structure_hash:   u64,
    weight_epoch:     u64,
}

impl SpacetimeGraph {
    /// Empty graph with `node_count` isolated nodes at rest and zero field.
    pub fn new(node_count: usize) -> Self {
        Self {
            adjacency:        SymmetricAdjacency::new(node_count),
            states:           vec![NodeState::Rest; node_count],
            scalar_field:     vec![0.0; node_count],
            topology_version: 0,
            structure_hash:   0,
            weight_epoch:     0,
        }
    }

    /// Build a graph from an undirected edge list.
    ///
    /// Duplicate pairs keep the first weight. The resulting version equals the
    /// number of distinct edges inserted.
    pub fn from_edges<I>(node_count: usize, edges: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (u32, u32, f64)>,
    {
        let mut graph = Self::new(node_count);
        for (a, b, w) in edges {
            graph.add_edge(a, b, w)?;
        }
        Ok(graph)
    }

    /// Ring lattice `i ↔ (i + 1) mod n` with uniform weight.
    pub fn ring(node_count: usize, weight: f64) -> Result<Self, GraphError> {
        let n = node_count as u32;
        if n < 3 {
            return Ok(Self::new(node_count));
        }
        Self::from_edges(node_count, (0..n).map(|i| (i, (i + 1) % n, weight)))
    }

    // ── Topology mutations ─────────────────────────────

    /// Create edge `(a, b)`. Returns `Ok(false)` if it already exists.
    pub fn add_edge(&mut self, a: u32, b: u32, weight: f64) -> Result<bool, GraphError> {
        self.check_pair(a, b)?;
        check_weight(weight)?;
        if !self.adjacency.insert(a, b, weight) {
            return Ok(false);
        }
        self.structure_hash ^= pair_mix(a, b);
        self.topology_version += 1;
        self.weight_epoch += 1;
        Ok(true)
    }

    /// Remove edge `(a, b)`, returning its weight, or `Ok(None)` if absent.
    pub fn remove_edge(&mut self, a: u32, b: u32) -> Result<Option<f64>, GraphError> {
        self.check_pair(a, b)?;
        let removed = self.adjacency.remove(a, b);
        if removed.is_some() {
            self.structure_hash ^= pair_mix(a, b);
            self.topology_version += 1;
            self.weight_epoch += 1;
        }
        Ok(removed)
    }

    /// Overwrite the weight of an existing edge. Not a structural change.
    ///
    /// Returns `Ok(false)` if the edge does not exist.
    pub fn set_edge_weight(&mut self, a: u32, b: u32, weight: f64) -> Result<bool, GraphError> {
        self.check_pair(a, b)?;
        check_weight(weight)?;
        let updated = self.adjacency.set_weight(a, b, weight);
        if updated {
            self.weight_epoch += 1;
        }
        Ok(updated)
    }

    // ── Topology queries ───────────────────────────────

    pub fn node_count(&self) -> usize {
        self.adjacency.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.edge_count()
    }

    pub fn has_edge(&self, a: u32, b: u32) -> bool {
        self.adjacency.contains(a, b)
    }

    pub fn edge_weight(&self, a: u32, b: u32) -> Option<f64> {
        self.adjacency.weight(a, b)
    }

    /// Sorted `(neighbour, weight)` pairs of `node`.
    pub fn neighbors(&self, node: u32) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.adjacency.row(node).iter().copied()
    }

    pub fn degree(&self, node: u32) -> usize {
        self.adjacency.degree(node)
    }

    pub fn weighted_degree(&self, node: u32) -> f64 {
        self.adjacency.row(node).iter().map(|&(_, w)| w).sum()
    }

    /// Every undirected edge once, normalised `a < b`, in row-major order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        (0..self.node_count() as u32).flat_map(move |a| {
            self.adjacency
                .row(a)
                .iter()
                .filter(move |&&(b, _)| b > a)
                .map(move |&(b, weight)| EdgeRef { a, b, weight })
        })
    }

    /// Sum of undirected edge weights.
    pub fn total_weight(&self) -> f64 {
        self.edges().map(|e| e.weight).sum()
    }

    pub fn adjacency(&self) -> &SymmetricAdjacency {
        &self.adjacency
    }

    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    pub fn topology_signature(&self) -> TopologySignature {
        TopologySignature {
            node_count:     self.node_count() as u32,
            version:        self.topology_version,
            structure_hash: self.structure_hash,
        }
    }

    /// Advances on every change to any edge weight, structural or not.
    pub fn weight_epoch(&self) -> u64 {
        self.weight_epoch
    }

    /// `true` when a consumer holding `cached` must resynchronise.
    pub fn is_stale(&self, cached: &TopologySignature) -> bool {
        *cached != self.topology_signature()
    }

    // ── Node fields ────────────────────────────────────

    pub fn node_state(&self, node: u32) -> Option<NodeState> {
        self.states.get(node as usize).copied()
    }

    pub fn set_node_state(&mut self, node: u32, state: NodeState) -> Result<(), GraphError> {
        let idx = self.check_node(node)?;
        self.states[idx] = state;
        Ok(())
    }

    pub fn node_states(&self) -> &[NodeState] {
        &self.states
    }

    pub fn scalar_field(&self, node: u32) -> Option<f64> {
        self.scalar_field.get(node as usize).copied()
    }

    pub fn set_scalar_field(&mut self, node: u32, value: f64) -> Result<(), GraphError> {
        let idx = self.check_node(node)?;
        self.scalar_field[idx] = value;
        Ok(())
    }

    pub fn scalar_fields(&self) -> &[f64] {
        &self.scalar_field
    }

    /// Replace the whole scalar field (e.g. after a physics kernel readback).
    pub fn replace_scalar_field(&mut self, values: Vec<f64>) -> Result<(), GraphError> {
        if values.len() != self.node_count() {
            return Err(GraphError::LengthMismatch {
                expected: self.node_count(),
                got:      values.len(),
            });
        }
        self.scalar_field = values;
        Ok(())
    }

    // ── Derived quantities ─────────────────────────────

    /// `m_i = Σ_j w_ij + ½ φ_i²`; `0.0` for out-of-range nodes.
    pub fn node_mass(&self, node: u32) -> f64 {
        let phi = self.scalar_field(node).unwrap_or(0.0);
        self.weighted_degree(node) + 0.5 * phi * phi
    }

    pub fn node_masses(&self) -> Vec<f64> {
        (0..self.node_count() as u32).map(|i| self.node_mass(i)).collect()
    }

    /// Combinatorial Forman curvature proxy averaged over incident edges:
    /// `κ_i = mean_j (4 − deg i − deg j)`. Isolated nodes are flat (`0.0`).
    pub fn curvature(&self, node: u32) -> f64 {
        let row = self.adjacency.row(node);
        if row.is_empty() {
            return 0.0;
        }
        let deg_i = row.len() as f64;
        let sum: f64 = row
            .iter()
            .map(|&(j, _)| 4.0 - deg_i - self.adjacency.degree(j) as f64)
            .sum();
        sum / deg_i
    }

    pub fn curvatures(&self) -> Vec<f64> {
        (0..self.node_count() as u32).map(|i| self.curvature(i)).collect()
    }

    // ── Validation helpers ─────────────────────────────

    fn check_node(&self, node: u32) -> Result<usize, GraphError> {
        let idx = node as usize;
        if idx >= self.node_count() {
            return Err(GraphError::NodeOutOfRange {
                node:       idx,
                node_count: self.node_count(),
            });
        }
        Ok(idx)
    }

    fn check_pair(&self, a: u32, b: u32) -> Result<(), GraphError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if a == b {
            return Err(GraphError::SelfLoop(a as usize));
        }
        Ok(())
    }
}

fn check_weight(weight: f64) -> Result<(), GraphError> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(GraphError::InvalidWeight(weight));
    }
    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_has_n_edges_and_degree_two() {
        let g = SpacetimeGraph::ring(10, 0.5).unwrap();
        assert_eq!(g.edge_count(), 10);
        assert!((0..10).all(|i| g.degree(i) == 2));
        assert!(g.has_edge(9, 0));
        assert_eq!(g.topology_version(), 10);
    }

    #[test]
    fn structural_mutations_bump_version_once() {
        let mut g = SpacetimeGraph::new(4);
        assert!(g.add_edge(0, 1, 0.5).unwrap());
        assert_eq!(g.topology_version(), 1);

        // duplicate create is a no-op
        assert!(!g.add_edge(1, 0, 0.9).unwrap());
        assert_eq!(g.topology_version(), 1);

        assert_eq!(g.remove_edge(0, 1).unwrap(), Some(0.5));
        assert_eq!(g.topology_version(), 2);
        assert_eq!(g.remove_edge(0, 1).unwrap(), None);
        assert_eq!(g.topology_version(), 2);
    }

    #[test]
    fn weight_change_is_not_structural() {
        let mut g = SpacetimeGraph::from_edges(3, [(0, 1, 0.5)]).unwrap();
        let before = g.topology_signature();
        assert!(g.set_edge_weight(0, 1, 0.9).unwrap());
        assert_eq!(g.topology_signature(), before);
        assert_eq!(g.edge_weight(1, 0), Some(0.9));
    }

    #[test]
    fn weight_epoch_follows_every_weight_change() {
        let mut g = SpacetimeGraph::new(3);
        g.add_edge(0, 1, 0.5).unwrap();
        let after_add = g.weight_epoch();
        assert_eq!(after_add, 1);

        assert!(g.set_edge_weight(0, 1, 0.9).unwrap());
        assert_eq!(g.weight_epoch(), 2);

        // absent edge: nothing changes
        assert!(!g.set_edge_weight(1, 2, 0.9).unwrap());
        assert_eq!(g.weight_epoch(), 2);

        g.remove_edge(0, 1).unwrap();
        assert_eq!(g.weight_epoch(), 3);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let mut g = SpacetimeGraph::new(3);
        assert_eq!(g.add_edge(1, 1, 0.5), Err(GraphError::SelfLoop(1)));
        assert!(matches!(g.add_edge(0, 5, 0.5), Err(GraphError::NodeOutOfRange { node: 5, .. })));
        assert!(matches!(g.add_edge(0, 1, f64::NAN), Err(GraphError::InvalidWeight(w)) if w.is_nan()));
        assert_eq!(g.add_edge(0, 1, 0.0), Err(GraphError::InvalidWeight(0.0)));
        assert_eq!(g.topology_version(), 0);
    }

    #[test]
    fn signature_tracks_structure_not_history() {
        let mut a = SpacetimeGraph::new(4);
        a.add_edge(0, 1, 0.5).unwrap();
        a.add_edge(2, 3, 0.5).unwrap();

        let mut b = SpacetimeGraph::new(4);
        b.add_edge(3, 2, 0.1).unwrap();
        b.add_edge(1, 0, 0.1).unwrap();

        let (sa, sb) = (a.topology_signature(), b.topology_signature());
        assert!(sa.same_structure(&sb));
        assert_eq!(sa, sb);

        b.remove_edge(0, 1).unwrap();
        b.add_edge(0, 1, 0.1).unwrap();
        let sb2 = b.topology_signature();
        assert!(sa.same_structure(&sb2));
        assert_ne!(sa, sb2);
        assert!(b.is_stale(&sb));

        let rebuilt = TopologySignature::from_pairs(4, sb2.version, b.edges().map(|e| (e.a, e.b)));
        assert_eq!(rebuilt, sb2);
    }

    #[test]
    fn edges_are_normalised_and_unique() {
        let g = SpacetimeGraph::from_edges(4, [(3, 0, 0.2), (1, 2, 0.3)]).unwrap();
        let edges: Vec<_> = g.edges().map(|e| (e.a, e.b)).collect();
        assert_eq!(edges, vec![(0, 3), (1, 2)]);
        assert!((g.total_weight() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mass_and_curvature_follow_definitions() {
        let mut g = SpacetimeGraph::from_edges(3, [(0, 1, 0.5), (1, 2, 0.25)]).unwrap();
        g.set_scalar_field(1, 2.0).unwrap();
        assert!((g.node_mass(1) - (0.75 + 2.0)).abs() < 1e-12);

        // node 1: deg 2, neighbours deg 1 → mean(4-2-1) = 1
        assert!((g.curvature(1) - 1.0).abs() < 1e-12);
        // node 0: deg 1, neighbour deg 2 → 4-1-2 = 1
        assert!((g.curvature(0) - 1.0).abs() < 1e-12);
        assert_eq!(SpacetimeGraph::new(2).curvature(0), 0.0);
    }

    #[test]
    fn replace_scalar_field_checks_length() {
        let mut g = SpacetimeGraph::new(3);
        assert!(g.replace_scalar_field(vec![1.0; 2]).is_err());
        g.replace_scalar_field(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(g.scalar_fields(), &[1.0, 2.0, 3.0]);
    }
}
