use thiserror::Error;

use spacetime_csr::CsrError;
use spacetime_graph::GraphError;

/// Fatal coordinator errors. A cycle that returns one of these leaves the
/// previous CSR in place.
#[derive(Debug, Error)]
pub enum HybridError {
    #[error("CSR error: {0}")]
    Csr(#[from] CsrError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("module '{module}' failed: {reason}")]
    Module { module: String, reason: String },
}

/// Per-recommendation failure. The recommendation is dropped and the batch
/// continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplyError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("invalid magnitude {0} (must be finite and non-negative)")]
    InvalidMagnitude(f64),
}
