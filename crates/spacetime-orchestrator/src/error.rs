use thiserror::Error;

use spacetime_compute::ComputeError;
use spacetime_snapshot::SnapshotError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("orchestrator not initialised")]
    NotInitialized,

    #[error("no tokio runtime available for worker dispatch")]
    NoRuntime,

    #[error("snapshot has no nodes")]
    EmptySnapshot,

    #[error("job cancelled")]
    Cancelled,

    #[error("snapshot rejected: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("device error: {0}")]
    Device(#[from] ComputeError),
}
