use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("node {node} out of range (node count {node_count})")]
    NodeOutOfRange { node: usize, node_count: usize },

    #[error("self-loop on node {0} is not a valid edge")]
    SelfLoop(usize),

    #[error("invalid edge weight {0}: must be finite and > 0")]
    InvalidWeight(f64),

    #[error("field length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}
