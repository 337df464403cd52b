//! [`CsrTopology`]: compressed-sparse-row view of the symmetric graph.
//!
//! Row `i` spans `col_indices[row_offsets[i]..row_offsets[i + 1]]`, columns
//! strictly increasing, weights parallel to columns. Every undirected edge is
//! stored in both rows, so `edge_count == nnz / 2`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use spacetime_compute::{DeviceArena, DeviceBuffer, DeviceId};
use spacetime_graph::{SpacetimeGraph, TopologySignature};

use crate::dense::DenseMatrix;
use crate::error::CsrError;
use crate::scan::exclusive_scan;

/// Host-side copy of the three CSR arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrArrays {
    pub node_count:   usize,
    pub row_offsets:  Vec<u32>,
    pub col_indices:  Vec<u32>,
    pub edge_weights: Vec<f64>,
}

/// Device mirror of the CSR arrays, bound to one arena.
#[derive(Debug)]
struct DeviceMirror {
    arena:        DeviceArena,
    row_offsets:  DeviceBuffer<u32>,
    col_indices:  DeviceBuffer<u32>,
    edge_weights: DeviceBuffer<f64>,
}

#[derive(Debug)]
pub struct CsrTopology {
    node_count:     usize,
    row_offsets:    Vec<u32>,
    col_indices:    Vec<u32>,
    edge_weights:   Vec<f64>,
    node_potential: Vec<f64>,
    signature:      TopologySignature,
    /// Graph weight epoch the stored weights mirror; `0` when the weights
    /// did not come from a graph.
    weight_epoch:   u64,
    mirror:         Option<DeviceMirror>,
}

impl CsrTopology {
    // ── Construction ───────────────────────────────────

    /// Convert a symmetric boolean adjacency plus weight matrix into CSR.
    ///
    /// Diagonal entries are ignored. Every present pair must carry a finite,
    /// positive weight equal in both directions. The signature is stamped with
    /// version 0; callers that track a live graph should re-stamp it.
    pub fn from_dense(
        adjacency: &DenseMatrix<bool>,
        weights: &DenseMatrix<f64>,
        node_potential: &[f64],
    ) -> Result<Self, CsrError> {
        let n = adjacency.size();
        if weights.size() != n {
            return Err(CsrError::DimensionMismatch { expected: n, got: weights.size() });
        }
        if node_potential.len() != n {
            return Err(CsrError::DimensionMismatch { expected: n, got: node_potential.len() });
        }
        if let Some((i, j)) = adjacency.first_asymmetry() {
            return Err(CsrError::Asymmetric { i, j });
        }
        check_dense_weights(adjacency, weights)?;

        let rows: Vec<Vec<(u32, f64)>> = (0..n)
            .into_par_iter()
            .map(|i| {
                adjacency
                    .row(i)
                    .iter()
                    .enumerate()
                    .filter(|&(j, &present)| present && j != i)
                    .map(|(j, _)| (j as u32, weights.get(i, j)))
                    .collect()
            })
            .collect();

        let signature = TopologySignature::from_pairs(
            n as u32,
            0,
            rows.iter().enumerate().flat_map(|(i, row)| {
                row.iter()
                    .filter(move |&&(j, _)| j as usize > i)
                    .map(move |&(j, _)| (i as u32, j))
            }),
        );

        let csr = Self::from_sorted_rows(&rows, node_potential.to_vec(), signature)?;
        debug!(nodes = n, nnz = csr.nnz(), "CSR built from dense matrix");
        Ok(csr)
    }

    /// Build directly from the authoritative graph's sorted adjacency.
    pub fn from_graph(graph: &SpacetimeGraph) -> Result<Self, CsrError> {
        let n = graph.node_count();
        let adjacency = graph.adjacency();
        let rows: Vec<&[(u32, f64)]> = (0..n as u32).map(|i| adjacency.row(i)).collect();
        let mut csr = Self::from_sorted_rows(
            &rows,
            graph.scalar_fields().to_vec(),
            graph.topology_signature(),
        )?;
        csr.weight_epoch = graph.weight_epoch();
        debug_assert!(csr.validate().is_ok());
        Ok(csr)
    }

    fn from_sorted_rows<R: AsRef<[(u32, f64)]>>(
        rows: &[R],
        node_potential: Vec<f64>,
        signature: TopologySignature,
    ) -> Result<Self, CsrError> {
        let total: u64 = rows.iter().map(|r| r.as_ref().len() as u64).sum();
        if total > u32::MAX as u64 {
            return Err(CsrError::TooManyEntries(total));
        }
        let degrees: Vec<u32> = rows.iter().map(|r| r.as_ref().len() as u32).collect();
        let row_offsets = exclusive_scan(&degrees);

        let (col_indices, edge_weights): (Vec<u32>, Vec<f64>) = rows
            .iter()
            .flat_map(|r| r.as_ref().iter().copied())
            .unzip();

        Self::from_parts(rows.len(), row_offsets, col_indices, edge_weights, node_potential, signature)
    }

    /// Assemble a CSR from raw arrays, refusing them if they break the
    /// structural invariants.
    pub fn from_parts(
        node_count: usize,
        row_offsets: Vec<u32>,
        col_indices: Vec<u32>,
        edge_weights: Vec<f64>,
        node_potential: Vec<f64>,
        signature: TopologySignature,
    ) -> Result<Self, CsrError> {
        let csr = Self {
            node_count,
            row_offsets,
            col_indices,
            edge_weights,
            node_potential,
            signature,
            weight_epoch: 0,
            mirror: None,
        };
        csr.validate()?;
        Ok(csr)
    }

    /// Assemble without validation; the rebuild pipeline reports on its own
    /// output and decides whether to hand it out.
    pub(crate) fn from_parts_unchecked(
        node_count: usize,
        row_offsets: Vec<u32>,
        col_indices: Vec<u32>,
        edge_weights: Vec<f64>,
        node_potential: Vec<f64>,
        signature: TopologySignature,
        weight_epoch: u64,
    ) -> Self {
        Self {
            node_count,
            row_offsets,
            col_indices,
            edge_weights,
            node_potential,
            signature,
            weight_epoch,
            mirror: None,
        }
    }

    // ── Weight-only updates ────────────────────────────

    /// Refresh every stored weight from a dense matrix, keeping the structure.
    /// The weights no longer track a graph afterwards.
    pub fn update_weights_from_dense(&mut self, weights: &DenseMatrix<f64>) -> Result<(), CsrError> {
        if weights.size() != self.node_count {
            return Err(CsrError::DimensionMismatch { expected: self.node_count, got: weights.size() });
        }
        for i in 0..self.node_count as u32 {
            for (j, _) in self.neighbors(i).filter(|&(j, _)| j > i) {
                check_pair_weights(weights, i as usize, j as usize)?;
            }
        }
        let offsets = &self.row_offsets;
        let cols = &self.col_indices;
        self.edge_weights
            .par_iter_mut()
            .enumerate()
            .for_each(|(e, w)| {
                let row = row_of(offsets, e);
                *w = weights.get(row, cols[e] as usize);
            });
        self.weight_epoch = 0;
        self.sync_device_weights()
    }

    /// Refresh every stored weight from the graph. The graph must still have
    /// the structure this CSR was built from.
    pub fn update_weights_from_graph(&mut self, graph: &SpacetimeGraph) -> Result<(), CsrError> {
        let current = graph.topology_signature();
        if !self.signature.same_structure(&current) || graph.adjacency().directed_entry_count() != self.nnz() {
            return Err(CsrError::StructureChanged);
        }
        let adjacency = graph.adjacency();
        let offsets = &self.row_offsets;
        let cols = &self.col_indices;
        let mut chunks = split_rows(offsets, &mut self.edge_weights);
        chunks
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(i, weights)| {
                let row = adjacency.row(i as u32);
                let start = offsets[i] as usize;
                if row.len() != weights.len() {
                    return Err(CsrError::StructureChanged);
                }
                for (k, (&(col, w), slot)) in row.iter().zip(weights.iter_mut()).enumerate() {
                    if col != cols[start + k] {
                        return Err(CsrError::StructureChanged);
                    }
                    *slot = w;
                }
                Ok(())
            })?;
        self.signature = current;
        self.weight_epoch = graph.weight_epoch();
        self.sync_device_weights()
    }

    fn sync_device_weights(&mut self) -> Result<(), CsrError> {
        if let Some(mirror) = self.mirror.as_mut() {
            mirror.edge_weights.copy_from_host(&self.edge_weights)?;
        }
        Ok(())
    }

    // ── Device residency ───────────────────────────────

    /// Upload the arrays to `arena`'s device, replacing any previous mirror.
    pub fn upload_to_gpu(&mut self, arena: &DeviceArena) -> Result<(), CsrError> {
        // release first so a re-upload to the same device does not double-count
        self.mirror = None;
        let mirror = DeviceMirror {
            arena:        arena.clone(),
            row_offsets:  arena.upload(&self.row_offsets)?,
            col_indices:  arena.upload(&self.col_indices)?,
            edge_weights: arena.upload(&self.edge_weights)?,
        };
        debug!(device = %arena.device(), nnz = self.nnz(), "CSR uploaded");
        self.mirror = Some(mirror);
        Ok(())
    }

    pub fn is_gpu_ready(&self) -> bool {
        self.mirror.is_some()
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.mirror.as_ref().map(|m| m.arena.device())
    }

    pub fn release_device(&mut self) {
        self.mirror = None;
    }

    /// Device → host round trip of the resident arrays.
    pub fn download_to_host(&self) -> Result<CsrArrays, CsrError> {
        let mirror = self.mirror.as_ref().ok_or(CsrError::NotResident)?;
        Ok(CsrArrays {
            node_count:   self.node_count,
            row_offsets:  mirror.arena.download(&mirror.row_offsets)?,
            col_indices:  mirror.arena.download(&mirror.col_indices)?,
            edge_weights: mirror.arena.download(&mirror.edge_weights)?,
        })
    }

    /// Owned copy of the arrays: downloaded when resident, otherwise cloned.
    pub fn to_host_arrays(&self) -> Result<CsrArrays, CsrError> {
        if self.is_gpu_ready() {
            return self.download_to_host();
        }
        Ok(CsrArrays {
            node_count:   self.node_count,
            row_offsets:  self.row_offsets.clone(),
            col_indices:  self.col_indices.clone(),
            edge_weights: self.edge_weights.clone(),
        })
    }

    // ── Queries ────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Directed entry count.
    pub fn nnz(&self) -> usize {
        self.col_indices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nnz() / 2
    }

    pub fn row_offsets(&self) -> &[u32] {
        &self.row_offsets
    }

    pub fn col_indices(&self) -> &[u32] {
        &self.col_indices
    }

    pub fn edge_weights(&self) -> &[f64] {
        &self.edge_weights
    }

    pub fn node_potential(&self) -> &[f64] {
        &self.node_potential
    }

    /// Half-open entry range of row `i`.
    pub fn row_range(&self, i: u32) -> std::ops::Range<usize> {
        let i = i as usize;
        if i >= self.node_count {
            return 0..0;
        }
        self.row_offsets[i] as usize..self.row_offsets[i + 1] as usize
    }

    pub fn degree(&self, i: u32) -> usize {
        self.row_range(i).len()
    }

    pub fn neighbors(&self, i: u32) -> impl Iterator<Item = (u32, f64)> + '_ {
        let range = self.row_range(i);
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.edge_weights[range].iter().copied())
    }

    /// Entry index of `(i, j)`, by binary search within row `i`.
    pub fn find_entry(&self, i: u32, j: u32) -> Option<usize> {
        let range = self.row_range(i);
        let start = range.start;
        self.col_indices[range].binary_search(&j).ok().map(|k| start + k)
    }

    pub fn edge_weight(&self, i: u32, j: u32) -> Option<f64> {
        self.find_entry(i, j).map(|e| self.edge_weights[e])
    }

    pub fn has_edge(&self, i: u32, j: u32) -> bool {
        self.find_entry(i, j).is_some()
    }

    /// Sum of undirected edge weights.
    pub fn total_weight(&self) -> f64 {
        self.edge_weights.par_iter().sum::<f64>() / 2.0
    }

    /// Every `(i, j, w)` has a matching `(j, i, w)`.
    pub fn is_symmetric(&self) -> bool {
        (0..self.node_count as u32).into_par_iter().all(|i| {
            self.neighbors(i).all(|(j, w)| self.edge_weight(j, i) == Some(w))
        })
    }

    // ── Versioning ─────────────────────────────────────

    pub fn signature(&self) -> TopologySignature {
        self.signature
    }

    /// Record the graph signature this CSR now mirrors.
    pub fn stamp_signature(&mut self, signature: TopologySignature) {
        self.signature = signature;
    }

    pub fn is_stale(&self, current: &TopologySignature) -> bool {
        self.signature != *current
    }

    pub fn weight_epoch(&self) -> u64 {
        self.weight_epoch
    }

    /// Same structure and same weights as `graph`. A structurally current
    /// CSR can still hold old weights after a weight-only graph change.
    pub fn is_current(&self, graph: &SpacetimeGraph) -> bool {
        !self.is_stale(&graph.topology_signature()) && self.weight_epoch == graph.weight_epoch()
    }

    // ── Validation ─────────────────────────────────────

    /// Check the structural invariants: offsets start at zero, are
    /// non-decreasing and end at `nnz`; columns are in range, strictly
    /// increasing per row and never equal the row. Weights are finite,
    /// positive and equal on both directed entries of an edge.
    pub fn validate(&self) -> Result<(), CsrError> {
        validate_arrays(self.node_count, &self.row_offsets, &self.col_indices, &self.edge_weights)
    }
}

impl CsrArrays {
    pub fn validate(&self) -> Result<(), CsrError> {
        validate_arrays(self.node_count, &self.row_offsets, &self.col_indices, &self.edge_weights)
    }
}

pub(crate) fn validate_arrays(
    n: usize,
    offsets: &[u32],
    cols: &[u32],
    weights: &[f64],
) -> Result<(), CsrError> {
    let invalid = |msg: String| Err(CsrError::InvalidStructure(msg));

    if offsets.len() != n + 1 {
        return invalid(format!("row_offsets has {} entries, expected {}", offsets.len(), n + 1));
    }
    if offsets[0] != 0 {
        return invalid(format!("row_offsets[0] = {}", offsets[0]));
    }
    if cols.len() != weights.len() {
        return invalid(format!("{} columns but {} weights", cols.len(), weights.len()));
    }
    if offsets[n] as usize != cols.len() {
        return invalid(format!("row_offsets[N] = {} but nnz = {}", offsets[n], cols.len()));
    }
    if let Some(i) = offsets.windows(2).position(|w| w[0] > w[1]) {
        return invalid(format!("row_offsets decrease at row {i}"));
    }

    let bad_row = (0..n).into_par_iter().find_first(|&i| {
        let row = &cols[offsets[i] as usize..offsets[i + 1] as usize];
        row.iter().any(|&c| c as usize >= n || c as usize == i)
            || row.windows(2).any(|w| w[0] >= w[1])
    });
    if let Some(i) = bad_row {
        return invalid(format!("row {i} has out-of-range, self-loop or unsorted columns"));
    }

    if let Some(e) = weights.par_iter().position_first(|&w| !w.is_finite() || w <= 0.0) {
        let i = row_of(offsets, e);
        return Err(CsrError::InvalidWeight { i, j: cols[e] as usize, weight: weights[e] });
    }
    let unmatched = (0..n).into_par_iter().find_first(|&i| {
        (offsets[i] as usize..offsets[i + 1] as usize).any(|e| {
            let j = cols[e] as usize;
            let mirror = &cols[offsets[j] as usize..offsets[j + 1] as usize];
            match mirror.binary_search(&(i as u32)) {
                Ok(k) => weights[offsets[j] as usize + k] != weights[e],
                Err(_) => true,
            }
        })
    });
    if let Some(i) = unmatched {
        return invalid(format!("row {i} has an entry without an equal-weight mirror"));
    }
    Ok(())
}

/// Present off-diagonal pairs of a dense input must carry valid, symmetric
/// weights.
fn check_dense_weights(adjacency: &DenseMatrix<bool>, weights: &DenseMatrix<f64>) -> Result<(), CsrError> {
    let n = adjacency.size();
    for i in 0..n {
        for j in i + 1..n {
            if adjacency.get(i, j) {
                check_pair_weights(weights, i, j)?;
            }
        }
    }
    Ok(())
}

fn check_pair_weights(weights: &DenseMatrix<f64>, i: usize, j: usize) -> Result<(), CsrError> {
    let (wij, wji) = (weights.get(i, j), weights.get(j, i));
    for (a, b, w) in [(i, j, wij), (j, i, wji)] {
        if !w.is_finite() || w <= 0.0 {
            return Err(CsrError::InvalidWeight { i: a, j: b, weight: w });
        }
    }
    if wij != wji {
        return Err(CsrError::AsymmetricWeight { i, j });
    }
    Ok(())
}

/// Row containing entry `e` (largest `i` with `offsets[i] <= e`).
#[inline]
pub(crate) fn row_of(offsets: &[u32], e: usize) -> usize {
    offsets.partition_point(|&o| o as usize <= e) - 1
}

/// Split a per-entry array into disjoint per-row slices.
pub(crate) fn split_rows<'a, T>(offsets: &[u32], mut data: &'a mut [T]) -> Vec<&'a mut [T]> {
    let mut rows = Vec::with_capacity(offsets.len().saturating_sub(1));
    for w in offsets.windows(2) {
        let (head, tail) = data.split_at_mut((w[1] - w[0]) as usize);
        rows.push(head);
        data = tail;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetime_compute::ComputeError;

    fn triangle_plus_isolated() -> (DenseMatrix<bool>, DenseMatrix<f64>) {
        let mut adj = DenseMatrix::filled(4, false);
        let mut w = DenseMatrix::filled(4, 0.0);
        for (i, j, weight) in [(0, 1, 0.5), (1, 2, 0.25), (0, 2, 0.75)] {
            adj.set_symmetric(i, j, true);
            w.set_symmetric(i, j, weight);
        }
        (adj, w)
    }

    #[test]
    fn dense_build_produces_sorted_symmetric_rows() {
        let (adj, w) = triangle_plus_isolated();
        let csr = CsrTopology::from_dense(&adj, &w, &[0.0; 4]).unwrap();

        assert_eq!(csr.row_offsets(), &[0, 2, 4, 6, 6]);
        assert_eq!(csr.col_indices(), &[1, 2, 0, 2, 0, 1]);
        assert_eq!(csr.edge_count(), 3);
        assert_eq!(csr.edge_weight(2, 0), Some(0.75));
        assert!(csr.is_symmetric());
        assert_eq!(csr.degree(3), 0);
        assert!(csr.validate().is_ok());
    }

    #[test]
    fn dense_build_rejects_bad_inputs() {
        let (mut adj, w) = triangle_plus_isolated();
        assert!(matches!(
            CsrTopology::from_dense(&adj, &w, &[0.0; 3]),
            Err(CsrError::DimensionMismatch { expected: 4, got: 3 })
        ));
        adj.set(3, 1, true);
        assert!(matches!(
            CsrTopology::from_dense(&adj, &w, &[0.0; 4]),
            Err(CsrError::Asymmetric { i: 1, j: 3 })
        ));
    }

    #[test]
    fn dense_build_rejects_bad_weights() {
        let (adj, mut w) = triangle_plus_isolated();
        w.set(1, 0, f64::NAN);
        assert!(matches!(
            CsrTopology::from_dense(&adj, &w, &[0.0; 4]),
            Err(CsrError::InvalidWeight { i: 1, j: 0, .. })
        ));

        let (adj, mut w) = triangle_plus_isolated();
        w.set(2, 1, 0.3);
        assert!(matches!(
            CsrTopology::from_dense(&adj, &w, &[0.0; 4]),
            Err(CsrError::AsymmetricWeight { i: 1, j: 2 })
        ));

        let (adj, mut w) = triangle_plus_isolated();
        w.set_symmetric(0, 2, 0.0);
        assert!(matches!(
            CsrTopology::from_dense(&adj, &w, &[0.0; 4]),
            Err(CsrError::InvalidWeight { i: 0, j: 2, .. })
        ));

        // weights of absent pairs are never read
        let (adj, mut w) = triangle_plus_isolated();
        w.set(3, 0, f64::INFINITY);
        assert!(CsrTopology::from_dense(&adj, &w, &[0.0; 4]).is_ok());
    }

    #[test]
    fn diagonal_is_ignored() {
        let (mut adj, w) = triangle_plus_isolated();
        adj.set(2, 2, true);
        let csr = CsrTopology::from_dense(&adj, &w, &[0.0; 4]).unwrap();
        assert!(!csr.has_edge(2, 2));
        assert_eq!(csr.nnz(), 6);
    }

    #[test]
    fn dense_and_graph_builds_agree() {
        let (adj, w) = triangle_plus_isolated();
        let dense = CsrTopology::from_dense(&adj, &w, &[0.0; 4]).unwrap();
        let graph =
            SpacetimeGraph::from_edges(4, [(0, 1, 0.5), (1, 2, 0.25), (0, 2, 0.75)]).unwrap();
        let from_graph = CsrTopology::from_graph(&graph).unwrap();

        assert_eq!(dense.row_offsets(), from_graph.row_offsets());
        assert_eq!(dense.col_indices(), from_graph.col_indices());
        assert_eq!(dense.edge_weights(), from_graph.edge_weights());
        assert!(dense.signature().same_structure(&from_graph.signature()));
    }

    #[test]
    fn weight_update_keeps_structure() {
        let (adj, mut w) = triangle_plus_isolated();
        let mut csr = CsrTopology::from_dense(&adj, &w, &[0.0; 4]).unwrap();
        let sig = csr.signature();
        let cols = csr.col_indices().to_vec();

        w.set_symmetric(0, 1, 0.9);
        csr.update_weights_from_dense(&w).unwrap();
        assert_eq!(csr.edge_weight(1, 0), Some(0.9));
        assert_eq!(csr.col_indices(), cols.as_slice());
        assert_eq!(csr.signature(), sig);
    }

    #[test]
    fn dense_weight_update_rejects_bad_weights() {
        let (adj, mut w) = triangle_plus_isolated();
        let mut csr = CsrTopology::from_dense(&adj, &w, &[0.0; 4]).unwrap();

        w.set(0, 1, 0.9);
        assert!(matches!(csr.update_weights_from_dense(&w), Err(CsrError::AsymmetricWeight { i: 0, j: 1 })));
        w.set_symmetric(0, 1, -0.1);
        assert!(matches!(csr.update_weights_from_dense(&w), Err(CsrError::InvalidWeight { .. })));
        // rejected updates leave the stored weights alone
        assert_eq!(csr.edge_weight(0, 1), Some(0.5));
        assert_eq!(csr.edge_weight(1, 0), Some(0.5));
    }

    #[test]
    fn graph_weight_update_detects_structure_change() {
        let mut graph = SpacetimeGraph::ring(5, 0.5).unwrap();
        let mut csr = CsrTopology::from_graph(&graph).unwrap();

        graph.set_edge_weight(0, 1, 0.1).unwrap();
        csr.update_weights_from_graph(&graph).unwrap();
        assert_eq!(csr.edge_weight(1, 0), Some(0.1));

        graph.add_edge(0, 2, 0.3).unwrap();
        assert!(matches!(csr.update_weights_from_graph(&graph), Err(CsrError::StructureChanged)));
    }

    #[test]
    fn device_round_trip_and_weight_resync() {
        let arena = DeviceArena::new(DeviceId(0), 1 << 20);
        let mut graph = SpacetimeGraph::ring(6, 0.5).unwrap();
        let mut csr = CsrTopology::from_graph(&graph).unwrap();

        assert!(matches!(csr.download_to_host(), Err(CsrError::NotResident)));
        csr.upload_to_gpu(&arena).unwrap();
        assert!(csr.is_gpu_ready());
        assert_eq!(csr.device(), Some(DeviceId(0)));
        let used = arena.used_bytes();

        // re-upload does not leak arena bytes
        csr.upload_to_gpu(&arena).unwrap();
        assert_eq!(arena.used_bytes(), used);

        graph.set_edge_weight(2, 3, 0.8).unwrap();
        csr.update_weights_from_graph(&graph).unwrap();
        let host = csr.download_to_host().unwrap();
        assert!(host.validate().is_ok());
        assert_eq!(host.edge_weights, csr.edge_weights());

        csr.release_device();
        assert_eq!(arena.used_bytes(), 0);
    }

    #[test]
    fn upload_fails_when_arena_is_too_small() {
        let arena = DeviceArena::new(DeviceId(3), 16);
        let mut csr = CsrTopology::from_graph(&SpacetimeGraph::ring(10, 0.5).unwrap()).unwrap();
        assert!(matches!(
            csr.upload_to_gpu(&arena),
            Err(CsrError::Device(ComputeError::OutOfMemory { .. }))
        ));
        assert!(!csr.is_gpu_ready());
        assert_eq!(arena.used_bytes(), 0);
    }

    #[test]
    fn from_parts_refuses_invalid_arrays() {
        let sig = TopologySignature::default();
        // unsorted row
        let err = CsrTopology::from_parts(2, vec![0, 2, 2], vec![1, 1], vec![0.1, 0.2], vec![0.0; 2], sig);
        assert!(matches!(err, Err(CsrError::InvalidStructure(_))));
        // decreasing offsets
        let err = CsrTopology::from_parts(2, vec![0, 1, 0], vec![1], vec![0.1], vec![0.0; 2], sig);
        assert!(matches!(err, Err(CsrError::InvalidStructure(_))));
        // mirrored entries disagree on weight
        let err = CsrTopology::from_parts(2, vec![0, 1, 2], vec![1, 0], vec![0.1, 0.2], vec![0.0; 2], sig);
        assert!(matches!(err, Err(CsrError::InvalidStructure(_))));
        // entry without a mirror
        let err = CsrTopology::from_parts(3, vec![0, 1, 1, 1], vec![1], vec![0.1], vec![0.0; 3], sig);
        assert!(matches!(err, Err(CsrError::InvalidStructure(_))));
        // non-positive and non-finite weights
        let err = CsrTopology::from_parts(2, vec![0, 1, 2], vec![1, 0], vec![0.0, 0.0], vec![0.0; 2], sig);
        assert!(matches!(err, Err(CsrError::InvalidWeight { i: 0, j: 1, .. })));
        let err = CsrTopology::from_parts(2, vec![0, 1, 2], vec![1, 0], vec![0.4, f64::NAN], vec![0.0; 2], sig);
        assert!(matches!(err, Err(CsrError::InvalidWeight { i: 1, j: 0, .. })));

        let ok = CsrTopology::from_parts(2, vec![0, 1, 2], vec![1, 0], vec![0.4, 0.4], vec![0.0; 2], sig);
        assert!(ok.is_ok());
    }

    #[test]
    fn staleness_follows_signature() {
        let mut graph = SpacetimeGraph::ring(4, 0.5).unwrap();
        let csr = CsrTopology::from_graph(&graph).unwrap();
        assert!(!csr.is_stale(&graph.topology_signature()));
        graph.remove_edge(0, 1).unwrap();
        assert!(csr.is_stale(&graph.topology_signature()));
    }

    #[test]
    fn row_of_maps_entries_to_rows() {
        let offsets = [0, 2, 2, 5];
        assert_eq!(row_of(&offsets, 0), 0);
        assert_eq!(row_of(&offsets, 1), 0);
        assert_eq!(row_of(&offsets, 2), 2);
        assert_eq!(row_of(&offsets, 4), 2);
    }
}
