//! Analysis kernels run on a worker device.
//!
//! A job first uploads the snapshot's CSR arrays into the worker's arena as a
//! [`DeviceTopology`]; kernels read them only through device-checked views
//! and allocate their scratch vectors from the same arena.

pub mod mcmc;
pub mod spectral;

use spacetime_compute::{ComputeError, DeviceArena, DeviceBuffer, DeviceId};
use spacetime_snapshot::GraphSnapshot;

use crate::error::OrchestratorError;

pub use mcmc::{ising_metropolis, McmcEstimate};
pub use spectral::{spectral_dimension, SpectralEstimate};

/// Snapshot topology resident on one worker device.
#[derive(Debug)]
pub struct DeviceTopology {
    device:       DeviceId,
    node_count:   usize,
    row_offsets:  DeviceBuffer<u32>,
    col_indices:  DeviceBuffer<u32>,
    edge_weights: DeviceBuffer<f64>,
}

impl DeviceTopology {
    /// Host → device copy of the snapshot's CSR arrays.
    pub fn upload(arena: &DeviceArena, snapshot: &GraphSnapshot) -> Result<Self, OrchestratorError> {
        if snapshot.node_count() == 0 {
            return Err(OrchestratorError::EmptySnapshot);
        }
        Ok(Self {
            device:       arena.device(),
            node_count:   snapshot.node_count(),
            row_offsets:  arena.upload(snapshot.row_offsets())?,
            col_indices:  arena.upload(snapshot.col_indices())?,
            edge_weights: arena.upload(snapshot.edge_weights())?,
        })
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Kernel-side view from the owning device.
    pub fn view(&self) -> Result<CsrView<'_>, ComputeError> {
        Ok(CsrView {
            offsets: self.row_offsets.view(self.device)?,
            cols:    self.col_indices.view(self.device)?,
            weights: self.edge_weights.view(self.device)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CsrView<'a> {
    offsets: &'a [u32],
    cols:    &'a [u32],
    weights: &'a [f64],
}

impl<'a> CsrView<'a> {
    #[inline]
    pub fn row(&self, i: usize) -> (&'a [u32], &'a [f64]) {
        let range = self.offsets[i] as usize..self.offsets[i + 1] as usize;
        (&self.cols[range.clone()], &self.weights[range])
    }

    #[inline]
    pub fn weighted_degree(&self, i: usize) -> f64 {
        self.row(i).1.iter().sum()
    }
}
