//! Worker slots and the job body executed on the blocking pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use uuid::Uuid;

use spacetime_compute::{DeviceArena, DeviceId};
use spacetime_snapshot::GraphSnapshot;

use crate::cancel::CancelToken;
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::kernels::{ising_metropolis, spectral_dimension, DeviceTopology};
use crate::results::{McmcResult, SpectralResult, WorkerRole};

/// One worker device with its arena and busy flag.
#[derive(Debug)]
pub struct WorkerSlot {
    role:  WorkerRole,
    arena: DeviceArena,
    busy:  AtomicBool,
}

impl WorkerSlot {
    pub fn new(role: WorkerRole, arena: DeviceArena) -> Self {
        Self { role, arena, busy: AtomicBool::new(false) }
    }

    pub fn role(&self) -> WorkerRole {
        self.role
    }

    pub fn device(&self) -> DeviceId {
        self.arena.device()
    }

    pub fn arena(&self) -> &DeviceArena {
        &self.arena
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the worker if idle.
    pub(crate) fn try_claim(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

pub(crate) enum JobOutput {
    Spectral(SpectralResult),
    Mcmc(McmcResult),
}

/// Upload `snapshot` to the worker's device and run its analysis. Device
/// buffers are released when this returns.
pub(crate) fn run_job(
    slot: &WorkerSlot,
    job_id: Uuid,
    snapshot: GraphSnapshot,
    config: &OrchestratorConfig,
    cancel: &CancelToken,
) -> Result<JobOutput, OrchestratorError> {
    let started = Instant::now();
    cancel.check()?;

    let topology = DeviceTopology::upload(&slot.arena, &snapshot)?;
    let seed = config.seed ^ snapshot.tick().wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let tick = snapshot.tick();
    let topology_version = snapshot.topology_version();
    drop(snapshot);

    let output = match slot.role {
        WorkerRole::Spectral => {
            let est = spectral_dimension(&slot.arena, &topology, &config.spectral, seed, cancel)?;
            JobOutput::Spectral(SpectralResult {
                job_id,
                device: slot.device(),
                tick,
                topology_version,
                spectral_dimension: est.spectral_dimension,
                return_probability: est.return_probability,
                points_used: est.points_used,
                duration_ms: started.elapsed().as_millis() as u64,
            })
        }
        WorkerRole::Mcmc => {
            let est = ising_metropolis(&slot.arena, &topology, &config.mcmc, seed, cancel)?;
            JobOutput::Mcmc(McmcResult {
                job_id,
                device: slot.device(),
                tick,
                topology_version,
                beta: config.mcmc.beta,
                mean_energy: est.mean_energy,
                magnetisation: est.magnetisation,
                acceptance_rate: est.acceptance_rate,
                sweeps: est.sweeps,
                duration_ms: started.elapsed().as_millis() as u64,
            })
        }
    };
    Ok(output)
}
