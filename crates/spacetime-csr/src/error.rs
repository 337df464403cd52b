use thiserror::Error;

use spacetime_compute::ComputeError;

use crate::rebuild::RebuildReport;

#[derive(Debug, Error)]
pub enum CsrError {
    #[error("dense matrix is not square: row {row} has {got} columns, expected {expected}")]
    NotSquare { row: usize, expected: usize, got: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("adjacency is not symmetric at ({i}, {j})")]
    Asymmetric { i: usize, j: usize },

    #[error("weights differ between ({i}, {j}) and ({j}, {i})")]
    AsymmetricWeight { i: usize, j: usize },

    #[error("invalid weight {weight} at ({i}, {j}) (must be finite and positive)")]
    InvalidWeight { i: usize, j: usize, weight: f64 },

    #[error("node {node} out of range (node count {node_count})")]
    NodeOutOfRange { node: u32, node_count: usize },

    #[error("deletion mask covers {got} entries, CSR has {expected}")]
    MaskLength { expected: usize, got: usize },

    #[error("{0} directed entries exceed the u32 offset range")]
    TooManyEntries(u64),

    #[error("invalid CSR structure: {0}")]
    InvalidStructure(String),

    #[error("graph structure changed since the CSR was built; full rebuild required")]
    StructureChanged,

    #[error("CSR is not resident on a device")]
    NotResident,

    #[error("rebuild verification failed: {0}")]
    VerificationFailed(Box<RebuildReport>),

    #[error(transparent)]
    Device(#[from] ComputeError),
}
