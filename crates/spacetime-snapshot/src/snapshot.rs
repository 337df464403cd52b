//! Graph snapshot handed to analysis workers.
//!
//! ## Lifecycle
//!
//! ```text
//! physics step N ──► GraphSnapshot::from_graph(graph, csr, N)
//!                          │ (owned deep copy, no aliasing)
//!                          ▼
//!              worker device arena ──► analysis ──► result{tick: N}
//! ```
//!
//! A snapshot is immutable after construction. It travels to exactly one
//! worker; callers that need it twice clone it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use spacetime_csr::{CsrArrays, CsrTopology};
use spacetime_graph::{SpacetimeGraph, TopologySignature};

use crate::error::SnapshotError;

/// Ticks between dispatches when no interval is configured.
pub const DEFAULT_DISPATCH_INTERVAL: u64 = 100;

/// Per-node `f64` scratch vectors an analysis kernel may allocate on a worker.
pub const WORKSPACE_VECTORS: u64 = 3;

// ─────────────────────────────────────────────
// GraphSnapshot
// ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    tick:         u64,
    signature:    TopologySignature,
    topology:     CsrArrays,
    node_mass:    Vec<f64>,
    scalar_field: Vec<f64>,
    curvature:    Vec<f64>,
    total_weight: f64,
}

impl GraphSnapshot {
    // ── Construction ───────────────────────────────────

    /// Capture `graph` at `tick`.
    ///
    /// `csr` is reused when it mirrors the graph's current structure and
    /// weights (a device-resident CSR is downloaded through the host);
    /// otherwise the topology is built directly from the graph.
    pub fn from_graph(
        graph: &SpacetimeGraph,
        csr: Option<&CsrTopology>,
        tick: u64,
    ) -> Result<Self, SnapshotError> {
        let signature = graph.topology_signature();
        let topology = match csr {
            Some(csr) if csr.is_current(graph) => csr.to_host_arrays()?,
            stale => {
                if stale.is_some() {
                    debug!(tick, "CSR stale, snapshot built from graph");
                }
                CsrTopology::from_graph(graph)?.to_host_arrays()?
            }
        };

        let snapshot = Self {
            tick,
            signature,
            total_weight: topology.edge_weights.iter().sum::<f64>() / 2.0,
            topology,
            node_mass: graph.node_masses(),
            scalar_field: graph.scalar_fields().to_vec(),
            curvature: graph.curvatures(),
        };
        debug_assert!(snapshot.validate().is_ok());
        Ok(snapshot)
    }

    /// Topology arrays only; physics fields are left empty.
    pub fn clone_topology_only(&self) -> Self {
        Self {
            tick:         self.tick,
            signature:    self.signature,
            topology:     self.topology.clone(),
            node_mass:    Vec::new(),
            scalar_field: Vec::new(),
            curvature:    Vec::new(),
            total_weight: self.total_weight,
        }
    }

    // ── Validation ─────────────────────────────────────

    /// CSR invariants plus field lengths. Physics fields may be empty
    /// (topology-only snapshot) but never partially filled.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        self.topology.validate()?;

        let n = self.node_count();
        if self.signature.node_count as usize != n {
            return Err(SnapshotError::SignatureMismatch {
                snapshot:  n,
                signature: self.signature.node_count,
            });
        }
        for (field, values) in [
            ("node_mass", &self.node_mass),
            ("scalar_field", &self.scalar_field),
            ("curvature", &self.curvature),
        ] {
            if !values.is_empty() && values.len() != n {
                return Err(SnapshotError::FieldLength { field, expected: n, got: values.len() });
            }
        }
        if !self.total_weight.is_finite() {
            return Err(SnapshotError::NonFiniteWeight(self.total_weight));
        }
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn topology_version(&self) -> u64 {
        self.signature.version
    }

    pub fn signature(&self) -> TopologySignature {
        self.signature
    }

    pub fn node_count(&self) -> usize {
        self.topology.node_count
    }

    pub fn nnz(&self) -> usize {
        self.topology.col_indices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nnz() / 2
    }

    pub fn topology(&self) -> &CsrArrays {
        &self.topology
    }

    pub fn row_offsets(&self) -> &[u32] {
        &self.topology.row_offsets
    }

    pub fn col_indices(&self) -> &[u32] {
        &self.topology.col_indices
    }

    pub fn edge_weights(&self) -> &[f64] {
        &self.topology.edge_weights
    }

    pub fn node_mass(&self) -> &[f64] {
        &self.node_mass
    }

    pub fn scalar_field(&self) -> &[f64] {
        &self.scalar_field
    }

    pub fn curvature(&self) -> &[f64] {
        &self.curvature
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn has_physics_fields(&self) -> bool {
        !self.node_mass.is_empty()
    }

    /// Bytes a worker needs to hold this snapshot's topology on device.
    pub fn device_footprint_bytes(&self) -> u64 {
        Self::footprint_for(self.node_count(), self.nnz())
    }

    /// Device bytes for a topology of `node_count` nodes and `nnz` entries:
    /// offsets and columns as `u32`, weights as `f64`, plus
    /// [`WORKSPACE_VECTORS`] per-node `f64` scratch vectors.
    pub fn footprint_for(node_count: usize, nnz: usize) -> u64 {
        let n = node_count as u64;
        let nnz = nnz as u64;
        (n + 1) * 4 + nnz * (4 + 8) + n * 8 * WORKSPACE_VECTORS
    }
}

/// `true` on ticks where a snapshot should be dispatched. Interval 0
/// disables dispatch.
pub fn should_dispatch(tick: u64, interval: u64) -> bool {
    interval != 0 && tick % interval == 0
}
