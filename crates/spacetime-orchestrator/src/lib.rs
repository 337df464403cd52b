//! # spacetime-orchestrator
//!
//! Asynchronous analysis of graph snapshots on worker devices.
//!
//! The physics loop hands a [`GraphSnapshot`](spacetime_snapshot::GraphSnapshot)
//! to [`MultiGpuOrchestrator::on_physics_step_completed`] every dispatch
//! tick. Idle spectral and MCMC workers each take a copy, upload it to their
//! own device arena and run on the blocking pool:
//!
//! - **spectral**: return probability of a lazy random walk and the spectral
//!   dimension `d_s = −2 dln p / dln t` over a window of steps;
//! - **mcmc**: Metropolis sampling of an Ising spin field with edge-weight
//!   couplings at inverse temperature β.
//!
//! Results land in a latest-result cache that never goes back in tick, and
//! are announced on a broadcast channel. Cancellation is cooperative.

pub mod cancel;
pub mod config;
pub mod error;
pub mod kernels;
pub mod orchestrator;
pub mod results;
pub mod worker;

pub use cancel::{CancelSource, CancelToken};
pub use config::{McmcConfig, OrchestratorConfig, SpectralConfig};
pub use error::OrchestratorError;
pub use kernels::{ising_metropolis, spectral_dimension, DeviceTopology, McmcEstimate, SpectralEstimate};
pub use orchestrator::{AsyncOrchestrator, MultiGpuOrchestrator};
pub use results::{
    DispatchReport, McmcResult, OrchestratorEvent, OrchestratorStatus, SpectralResult, WorkerRole,
};
pub use worker::WorkerSlot;
