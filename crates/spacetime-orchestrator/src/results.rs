//! Worker results, status, events and the latest-result cache.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use spacetime_compute::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerRole {
    Spectral,
    Mcmc,
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRole::Spectral => write!(f, "spectral"),
            WorkerRole::Mcmc     => write!(f, "mcmc"),
        }
    }
}

// ─────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralResult {
    pub job_id:           Uuid,
    pub device:           DeviceId,
    pub tick:             u64,
    pub topology_version: u64,
    pub spectral_dimension: f64,
    /// Mean return probability `p(t)` for `t = 0..=walk_steps`.
    pub return_probability: Vec<f64>,
    /// Window points that contributed to the estimate.
    pub points_used:      usize,
    pub duration_ms:      u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McmcResult {
    pub job_id:           Uuid,
    pub device:           DeviceId,
    pub tick:             u64,
    pub topology_version: u64,
    pub beta:             f64,
    /// Mean of `E = −Σ w_ij s_i s_j` over measured sweeps.
    pub mean_energy:      f64,
    /// Mean of `|Σ s_i| / N` over measured sweeps.
    pub magnetisation:    f64,
    pub acceptance_rate:  f64,
    pub sweeps:           usize,
    pub duration_ms:      u64,
}

/// Result of one `on_physics_step_completed` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub tick:         u64,
    pub jobs:         Vec<Uuid>,
    /// Roles with workers but none idle.
    pub skipped_busy: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub initialized:           bool,
    pub spectral_workers:      usize,
    pub mcmc_workers:          usize,
    pub busy_workers:          usize,
    pub jobs_in_flight:        usize,
    pub jobs_dispatched:       u64,
    pub jobs_completed:        u64,
    pub jobs_cancelled:        u64,
    pub jobs_failed:           u64,
    pub stale_results_dropped: u64,
    pub latest_spectral_tick:  Option<u64>,
    pub latest_mcmc_tick:      Option<u64>,
}

#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    SpectralCompleted(SpectralResult),
    McmcCompleted(McmcResult),
    JobCancelled { job_id: Uuid, role: WorkerRole, tick: u64 },
    JobFailed { job_id: Uuid, role: WorkerRole, tick: u64, error: String },
}

// ─────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────

/// Latest result per analysis, monotonic in tick.
#[derive(Debug, Default)]
pub(crate) struct ResultCache {
    spectral: Option<SpectralResult>,
    mcmc:     Option<McmcResult>,
}

impl ResultCache {
    /// Store `result` unless a newer tick is already cached. Equal ticks
    /// overwrite (latest write wins).
    pub(crate) fn offer_spectral(&mut self, result: SpectralResult) -> bool {
        if self.spectral.as_ref().is_some_and(|r| r.tick > result.tick) {
            return false;
        }
        self.spectral = Some(result);
        true
    }

    pub(crate) fn offer_mcmc(&mut self, result: McmcResult) -> bool {
        if self.mcmc.as_ref().is_some_and(|r| r.tick > result.tick) {
            return false;
        }
        self.mcmc = Some(result);
        true
    }

    pub(crate) fn spectral(&self) -> Option<&SpectralResult> {
        self.spectral.as_ref()
    }

    pub(crate) fn mcmc(&self) -> Option<&McmcResult> {
        self.mcmc.as_ref()
    }

    pub(crate) fn clear(&mut self) {
        self.spectral = None;
        self.mcmc = None;
    }
}
