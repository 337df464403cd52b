//! [`MultiGpuOrchestrator`] and its tokio implementation.
//!
//! ```text
//! on_physics_step_completed(snapshot)
//!   ├─ claim first idle spectral worker ─► spawn_blocking(job) ─┐
//!   └─ claim first idle MCMC worker     ─► spawn_blocking(job) ─┤
//!                                                               ▼
//!                      result cache (monotonic in tick) + broadcast event
//! ```
//!
//! Dispatch never blocks the caller. A role whose workers are all busy skips
//! the snapshot; the next dispatch tick brings a newer one.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use spacetime_compute::ComputeCluster;
use spacetime_snapshot::{should_dispatch, GraphSnapshot};

use crate::cancel::CancelSource;
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::results::{
    DispatchReport, McmcResult, OrchestratorEvent, OrchestratorStatus, ResultCache, SpectralResult,
    WorkerRole,
};
use crate::worker::{run_job, JobOutput, WorkerSlot};

// ─────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────

/// Distribution of snapshots to worker devices for out-of-band analysis.
pub trait MultiGpuOrchestrator: Send + Sync {
    /// Size workers for snapshots of up to `max_node_count` nodes. Workers
    /// whose memory cannot hold the worst case are dropped.
    fn initialize(&self, max_node_count: usize) -> Result<(), OrchestratorError>;

    /// Hand `snapshot` to idle workers without blocking.
    fn on_physics_step_completed(&self, snapshot: GraphSnapshot) -> Result<DispatchReport, OrchestratorError>;

    fn latest_spectral_result(&self) -> Option<SpectralResult>;

    fn latest_mcmc_result(&self) -> Option<McmcResult>;

    fn status(&self) -> OrchestratorStatus;

    /// Resolves to `true` once no job is in flight, `false` on timeout.
    fn wait_for_completion(&self, timeout: Duration) -> impl Future<Output = bool> + Send;

    /// Cooperatively cancel every job dispatched so far.
    fn cancel_all(&self);

    fn clear_results(&self);

    fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent>;
}

// ─────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    completed:  AtomicU64,
    cancelled:  AtomicU64,
    failed:     AtomicU64,
    stale:      AtomicU64,
}

#[derive(Debug)]
struct Shared {
    config:      OrchestratorConfig,
    all_workers: Vec<Arc<WorkerSlot>>,
    active:      RwLock<Vec<Arc<WorkerSlot>>>,
    initialized: AtomicBool,
    results:     Mutex<ResultCache>,
    events:      broadcast::Sender<OrchestratorEvent>,
    cancel:      CancelSource,
    in_flight:   AtomicUsize,
    idle:        Notify,
    counters:    Counters,
}

impl Shared {
    fn publish(&self, event: OrchestratorEvent) {
        let _ = self.events.send(event);
    }

    fn finish(
        &self,
        job_id: Uuid,
        role: WorkerRole,
        tick: u64,
        outcome: Result<JobOutput, OrchestratorError>,
    ) {
        match outcome {
            Ok(JobOutput::Spectral(result)) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                if self.results.lock().offer_spectral(result.clone()) {
                    debug!(%job_id, tick, d_s = result.spectral_dimension, "spectral result stored");
                    self.publish(OrchestratorEvent::SpectralCompleted(result));
                } else {
                    self.counters.stale.fetch_add(1, Ordering::Relaxed);
                    debug!(%job_id, tick, "stale spectral result dropped");
                }
            }
            Ok(JobOutput::Mcmc(result)) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                if self.results.lock().offer_mcmc(result.clone()) {
                    debug!(%job_id, tick, energy = result.mean_energy, "mcmc result stored");
                    self.publish(OrchestratorEvent::McmcCompleted(result));
                } else {
                    self.counters.stale.fetch_add(1, Ordering::Relaxed);
                    debug!(%job_id, tick, "stale mcmc result dropped");
                }
            }
            Err(OrchestratorError::Cancelled) => {
                self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(%job_id, %role, tick, "job cancelled");
                self.publish(OrchestratorEvent::JobCancelled { job_id, role, tick });
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(%job_id, %role, tick, error = %e, "job failed");
                self.publish(OrchestratorEvent::JobFailed { job_id, role, tick, error: e.to_string() });
            }
        }
    }
}

/// Holds one in-flight count and a claimed worker. Dropping it frees both,
/// whether the job ran, panicked or was discarded by the runtime before it
/// started.
struct JobGuard {
    shared: Arc<Shared>,
    slot:   Arc<WorkerSlot>,
}

impl JobGuard {
    fn enter(shared: Arc<Shared>, slot: Arc<WorkerSlot>) -> Self {
        shared.in_flight.fetch_add(1, Ordering::AcqRel);
        Self { shared, slot }
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.slot.release();
        if self.shared.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.idle.notify_waiters();
        }
    }
}

// ─────────────────────────────────────────────
// AsyncOrchestrator
// ─────────────────────────────────────────────

/// Runs worker jobs on the tokio blocking pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AsyncOrchestrator {
    shared: Arc<Shared>,
}

impl AsyncOrchestrator {
    /// One slot per spectral and MCMC device of `cluster`, bound to that
    /// device's arena.
    pub fn new(cluster: &ComputeCluster, config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        let mut all_workers = Vec::new();
        for (role, ids) in [
            (WorkerRole::Spectral, cluster.spectral_workers()),
            (WorkerRole::Mcmc, cluster.mcmc_workers()),
        ] {
            for id in ids {
                let arena = cluster.arena(*id)?.clone();
                all_workers.push(Arc::new(WorkerSlot::new(role, arena)));
            }
        }

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                all_workers,
                active: RwLock::new(Vec::new()),
                initialized: AtomicBool::new(false),
                results: Mutex::new(ResultCache::default()),
                events,
                cancel: CancelSource::new(),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                counters: Counters::default(),
            }),
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }

    /// Whether `tick` is a dispatch tick under the configured interval.
    pub fn should_dispatch(&self, tick: u64) -> bool {
        should_dispatch(tick, self.shared.config.dispatch_interval)
    }

    fn spawn_job(&self, handle: &Handle, slot: Arc<WorkerSlot>, job_id: Uuid, snapshot: GraphSnapshot) {
        let token = self.shared.cancel.token();
        let tick = snapshot.tick();
        debug!(%job_id, role = %slot.role(), device = %slot.device(), tick, "job dispatched");

        let guard = JobGuard::enter(Arc::clone(&self.shared), slot);
        self.shared.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        handle.spawn_blocking(move || {
            let JobGuard { shared, slot } = &guard;
            let outcome = run_job(slot, job_id, snapshot, &shared.config, &token);
            shared.finish(job_id, slot.role(), tick, outcome);
        });
    }
}

impl MultiGpuOrchestrator for AsyncOrchestrator {
    fn initialize(&self, max_node_count: usize) -> Result<(), OrchestratorError> {
        let nnz = max_node_count.saturating_mul(self.shared.config.max_average_degree);
        let needed = GraphSnapshot::footprint_for(max_node_count, nnz);

        let (keep, dropped): (Vec<_>, Vec<_>) = self
            .shared
            .all_workers
            .iter()
            .cloned()
            .partition(|w| w.arena().capacity_bytes() >= needed);
        for w in &dropped {
            warn!(
                device = %w.device(),
                role = %w.role(),
                capacity = w.arena().capacity_bytes(),
                needed,
                "worker too small for worst-case snapshot, disabled"
            );
        }

        let spectral = keep.iter().filter(|w| w.role() == WorkerRole::Spectral).count();
        let mcmc = keep.len() - spectral;
        *self.shared.active.write() = keep;
        self.shared.initialized.store(true, Ordering::Release);

        info!(max_node_count, needed, spectral, mcmc, "orchestrator ready");
        Ok(())
    }

    fn on_physics_step_completed(&self, snapshot: GraphSnapshot) -> Result<DispatchReport, OrchestratorError> {
        if !self.shared.initialized.load(Ordering::Acquire) {
            return Err(OrchestratorError::NotInitialized);
        }
        let handle = Handle::try_current().map_err(|_| OrchestratorError::NoRuntime)?;
        snapshot.validate()?;

        let mut report = DispatchReport { tick: snapshot.tick(), ..Default::default() };
        let workers = self.shared.active.read().clone();

        let mut claimed = Vec::with_capacity(2);
        for role in [WorkerRole::Spectral, WorkerRole::Mcmc] {
            let mut candidates = workers.iter().filter(|w| w.role() == role).peekable();
            if candidates.peek().is_none() {
                continue;
            }
            match candidates.find(|w| w.try_claim()) {
                Some(slot) => claimed.push(Arc::clone(slot)),
                None => {
                    debug!(%role, tick = report.tick, "all workers busy, snapshot skipped");
                    report.skipped_busy += 1;
                }
            }
        }

        // each worker gets its own copy; the last one takes ownership
        let mut snapshot = Some(snapshot);
        let count = claimed.len();
        for (k, slot) in claimed.into_iter().enumerate() {
            let copy = if k + 1 == count { snapshot.take() } else { snapshot.clone() };
            let Some(copy) = copy else { break };
            let job_id = Uuid::new_v4();
            self.spawn_job(&handle, slot, job_id, copy);
            report.jobs.push(job_id);
        }
        Ok(report)
    }

    fn latest_spectral_result(&self) -> Option<SpectralResult> {
        self.shared.results.lock().spectral().cloned()
    }

    fn latest_mcmc_result(&self) -> Option<McmcResult> {
        self.shared.results.lock().mcmc().cloned()
    }

    fn status(&self) -> OrchestratorStatus {
        let active = self.shared.active.read();
        let spectral = active.iter().filter(|w| w.role() == WorkerRole::Spectral).count();
        let results = self.shared.results.lock();
        let c = &self.shared.counters;
        OrchestratorStatus {
            initialized:           self.shared.initialized.load(Ordering::Acquire),
            spectral_workers:      spectral,
            mcmc_workers:          active.len() - spectral,
            busy_workers:          active.iter().filter(|w| w.is_busy()).count(),
            jobs_in_flight:        self.shared.in_flight.load(Ordering::Acquire),
            jobs_dispatched:       c.dispatched.load(Ordering::Relaxed),
            jobs_completed:        c.completed.load(Ordering::Relaxed),
            jobs_cancelled:        c.cancelled.load(Ordering::Relaxed),
            jobs_failed:           c.failed.load(Ordering::Relaxed),
            stale_results_dropped: c.stale.load(Ordering::Relaxed),
            latest_spectral_tick:  results.spectral().map(|r| r.tick),
            latest_mcmc_tick:      results.mcmc().map(|r| r.tick),
        }
    }

    fn wait_for_completion(&self, timeout: Duration) -> impl Future<Output = bool> + Send {
        let shared = Arc::clone(&self.shared);
        async move {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let notified = shared.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if shared.in_flight.load(Ordering::Acquire) == 0 {
                    return true;
                }
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return shared.in_flight.load(Ordering::Acquire) == 0;
                }
            }
        }
    }

    fn cancel_all(&self) {
        let in_flight = self.shared.in_flight.load(Ordering::Acquire);
        self.shared.cancel.cancel_all();
        info!(in_flight, "cancellation requested for all jobs");
    }

    fn clear_results(&self) {
        self.shared.results.lock().clear();
    }

    fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.shared.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetime_compute::{ClusterConfig, StaticDeviceEnumerator};

    fn orchestrator() -> AsyncOrchestrator {
        let enumerator = StaticDeviceEnumerator::uniform(3, 64, true);
        let cluster = ComputeCluster::initialize(&enumerator, &ClusterConfig::default()).unwrap();
        AsyncOrchestrator::new(&cluster, OrchestratorConfig::default()).unwrap()
    }

    #[test]
    fn job_discarded_before_running_frees_worker() {
        let orch = orchestrator();
        let slot = Arc::clone(&orch.shared.all_workers[0]);
        assert!(slot.try_claim());

        let guard = JobGuard::enter(Arc::clone(&orch.shared), Arc::clone(&slot));
        assert_eq!(orch.shared.in_flight.load(Ordering::Acquire), 1);

        // a blocking task the runtime drops without calling
        let job = move || {
            let _held = &guard;
        };
        drop(job);

        assert!(!slot.is_busy());
        assert_eq!(orch.shared.in_flight.load(Ordering::Acquire), 0);
        assert!(slot.try_claim(), "worker can be claimed again");
    }

    #[tokio::test]
    async fn discarded_job_wakes_waiters() {
        let orch = orchestrator();
        let slot = Arc::clone(&orch.shared.all_workers[0]);
        assert!(slot.try_claim());
        let guard = JobGuard::enter(Arc::clone(&orch.shared), slot);

        let waiter = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.wait_for_completion(Duration::from_secs(30)).await })
        };
        tokio::task::yield_now().await;
        drop(guard);
        assert!(waiter.await.unwrap());
    }
}
