//! [`HybridCoordinator`]: one collect / filter / resolve / apply / rebuild
//! cycle per simulation step.
//!
//! The coordinator owns the CSR and is its only writer. Cycles take
//! `&mut self`, so two cycles can never overlap.

use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use spacetime_compute::DeviceArena;
use spacetime_csr::{rebuild, CsrError, CsrTopology, DeletionMask, RebuildOptions, RebuildReport, RebuildRequest};
use spacetime_graph::SpacetimeGraph;

use crate::apply::{apply_recommendation, ApplyBatchReport};
use crate::buffer::RecommendationBuffer;
use crate::config::CoordinatorConfig;
use crate::error::HybridError;
use crate::module::HybridPhysicsModule;
use crate::recommendation::TopologyRecommendation;

// ─────────────────────────────────────────────
// State & reports
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorState {
    Idle,
    Collecting,
    Filtering,
    Applying,
    Rebuilding,
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Idle       => write!(f, "idle"),
            CoordinatorState::Collecting => write!(f, "collecting"),
            CoordinatorState::Filtering  => write!(f, "filtering"),
            CoordinatorState::Applying   => write!(f, "applying"),
            CoordinatorState::Rebuilding => write!(f, "rebuilding"),
        }
    }
}

/// How the CSR was brought in line with the graph at the end of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebuildKind {
    /// Nothing changed, or auto-rebuild is off.
    Skipped,
    /// Only weights changed; updated in place.
    WeightsOnly,
    /// Scan/scatter/sort pipeline over the previous CSR.
    Incremental,
    /// Built from the graph after the incremental path was rejected.
    Full,
    /// Built from the graph because the CSR was already stale at cycle start.
    Resync,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle:             u64,
    pub collected:         usize,
    /// Dropped by the buffer's top-K bound.
    pub buffer_evicted:    usize,
    pub filtered_out:      usize,
    pub conflicts_dropped: usize,
    pub structural:        usize,
    pub weight_only:       usize,
    pub no_ops:            usize,
    pub skipped_errors:    usize,
    pub rebuild:           RebuildKind,
    pub rebuild_report:    Option<RebuildReport>,
    pub topology_version:  u64,
    pub nnz:               usize,
    pub duration_us:       u64,
}

/// Running totals across cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub cycles:                    u64,
    pub recommendations_processed: u64,
    pub changes_applied:           u64,
    pub rebuilds:                  u64,
    pub resyncs:                   u64,
}

// ─────────────────────────────────────────────
// HybridCoordinator
// ─────────────────────────────────────────────

pub struct HybridCoordinator {
    config:  CoordinatorConfig,
    modules: Vec<Box<dyn HybridPhysicsModule>>,
    buffer:  RecommendationBuffer,
    csr:     CsrTopology,
    arena:   Option<DeviceArena>,
    state:   CoordinatorState,
    stats:   CoordinatorStats,
}

impl HybridCoordinator {
    /// Build the initial CSR from `graph` and, when a physics arena is given,
    /// upload it.
    pub fn new(
        config: CoordinatorConfig,
        graph: &SpacetimeGraph,
        arena: Option<DeviceArena>,
    ) -> Result<Self, HybridError> {
        let mut csr = CsrTopology::from_graph(graph)?;
        if let Some(arena) = &arena {
            csr.upload_to_gpu(arena)?;
        }
        Ok(Self {
            buffer: RecommendationBuffer::new(config.buffer_capacity),
            config,
            modules: Vec::new(),
            csr,
            arena,
            state: CoordinatorState::Idle,
            stats: CoordinatorStats::default(),
        })
    }

    pub fn register_module(&mut self, module: Box<dyn HybridPhysicsModule>) {
        debug!(module = module.name(), "hybrid module registered");
        self.modules.push(module);
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Initialise every registered module against `graph`.
    pub fn initialize_modules(&mut self, graph: &SpacetimeGraph) -> Result<(), HybridError> {
        for m in &mut self.modules {
            m.initialize(graph)?;
        }
        Ok(())
    }

    /// Run `execute_step` on every enabled module. A failing module is
    /// logged and skipped; returns the number of failures.
    pub fn execute_modules(&mut self, graph: &SpacetimeGraph, dt: f64) -> usize {
        let mut failures = 0;
        for m in self.modules.iter_mut().filter(|m| m.is_enabled()) {
            if let Err(e) = m.execute_step(graph, dt) {
                warn!(module = m.name(), error = %e, "module step failed");
                failures += 1;
            }
        }
        failures
    }

    // ── Accessors ──────────────────────────────────────

    pub fn csr(&self) -> &CsrTopology {
        &self.csr
    }

    /// Buffer contents of the last cycle, for diagnostics.
    pub fn buffer(&self) -> &RecommendationBuffer {
        &self.buffer
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ── Cycle ──────────────────────────────────────────

    /// Run one full coordination cycle against `graph`.
    pub fn run_cycle(&mut self, graph: &mut SpacetimeGraph) -> Result<CycleReport, HybridError> {
        let started = Instant::now();
        let stale_at_start = self.csr.is_stale(&graph.topology_signature());

        // 1. collect
        self.state = CoordinatorState::Collecting;
        self.buffer.clear();
        let mut collected = 0;
        for m in self.modules.iter_mut() {
            if !m.is_enabled() || !m.has_recommendations() {
                continue;
            }
            let recs = m.recommendations(graph);
            collected += recs.len();
            self.buffer.add_range(recs);
            m.clear_recommendations();
        }

        // 2. filter
        self.state = CoordinatorState::Filtering;
        let buffered = self.buffer.sorted();
        let buffered_len = buffered.len();
        let candidates: Vec<TopologyRecommendation> = buffered
            .into_iter()
            .filter(|r| r.priority >= self.config.min_priority)
            .take(self.config.max_recommendations_per_step)
            .collect();
        let filtered_out = buffered_len - candidates.len();

        // 3. resolve conflicts: first (highest priority) per pair wins
        let mut seen = HashSet::with_capacity(candidates.len());
        let survivors: Vec<&TopologyRecommendation> = candidates
            .iter()
            .filter(|r| !r.kind.touches_edge() || seen.insert(r.pair()))
            .collect();
        let conflicts_dropped = candidates.len() - survivors.len();

        // 4. apply
        self.state = CoordinatorState::Applying;
        let mut batch = ApplyBatchReport::empty();
        for (i, rec) in survivors.iter().enumerate() {
            match apply_recommendation(graph, rec) {
                Ok(outcome) => batch.record(outcome),
                Err(e) => {
                    warn!(rec = %rec, error = %e, "recommendation skipped");
                    batch.record_failure(i, e);
                }
            }
        }

        // 5. rebuild
        let synced = self.sync_csr(graph, &batch, stale_at_start);
        self.state = CoordinatorState::Idle;
        let (rebuild_kind, rebuild_report) = synced?;

        self.stats.cycles += 1;
        self.stats.recommendations_processed += survivors.len() as u64;
        self.stats.changes_applied += batch.changes() as u64;
        match rebuild_kind {
            RebuildKind::Incremental | RebuildKind::Full => self.stats.rebuilds += 1,
            RebuildKind::Resync => self.stats.resyncs += 1,
            RebuildKind::Skipped | RebuildKind::WeightsOnly => {}
        }

        let report = CycleReport {
            cycle:             self.stats.cycles,
            collected,
            buffer_evicted:    collected.saturating_sub(buffered_len),
            filtered_out,
            conflicts_dropped,
            structural:        batch.structural,
            weight_only:       batch.weight_only,
            no_ops:            batch.no_ops,
            skipped_errors:    batch.failed,
            rebuild:           rebuild_kind,
            rebuild_report,
            topology_version:  graph.topology_version(),
            nnz:               self.csr.nnz(),
            duration_us:       started.elapsed().as_micros() as u64,
        };
        debug!(
            cycle = report.cycle,
            collected,
            buffered = buffered_len,
            structural = report.structural,
            weight_only = report.weight_only,
            rebuild = ?report.rebuild,
            "coordinator cycle complete"
        );
        Ok(report)
    }

    /// Bring the CSR in line with `graph` after a batch.
    fn sync_csr(
        &mut self,
        graph: &SpacetimeGraph,
        batch: &ApplyBatchReport,
        stale_at_start: bool,
    ) -> Result<(RebuildKind, Option<RebuildReport>), HybridError> {
        if !self.config.auto_rebuild {
            if batch.changes() > 0 {
                debug!(changes = batch.changes(), "auto-rebuild disabled, CSR left stale");
            }
            return Ok((RebuildKind::Skipped, None));
        }

        if stale_at_start {
            self.state = CoordinatorState::Rebuilding;
            debug!("CSR stale at cycle start, resynchronising from graph");
            self.replace_csr(CsrTopology::from_graph(graph)?)?;
            return Ok((RebuildKind::Resync, None));
        }

        if batch.structural > 0 {
            self.state = CoordinatorState::Rebuilding;
            return self.rebuild_incremental(graph, batch);
        }

        if batch.weight_only > 0 || self.csr.weight_epoch() != graph.weight_epoch() {
            match self.csr.update_weights_from_graph(graph) {
                Ok(()) => return Ok((RebuildKind::WeightsOnly, None)),
                Err(e) => {
                    warn!(error = %e, "in-place weight update rejected, rebuilding from graph");
                    self.state = CoordinatorState::Rebuilding;
                    self.replace_csr(CsrTopology::from_graph(graph)?)?;
                    return Ok((RebuildKind::Full, None));
                }
            }
        }

        Ok((RebuildKind::Skipped, None))
    }

    fn rebuild_incremental(
        &mut self,
        graph: &SpacetimeGraph,
        batch: &ApplyBatchReport,
    ) -> Result<(RebuildKind, Option<RebuildReport>), HybridError> {
        let mut mask = DeletionMask::for_csr(&self.csr);
        for &(a, b) in &batch.removed {
            if !mask.mark_pair(&self.csr, a, b) {
                warn!(a, b, "removed edge missing from CSR");
            }
        }
        let request = RebuildRequest {
            deletions: Some(&mask),
            additions: &batch.created,
            ..Default::default()
        };
        let options = RebuildOptions { verify: self.config.verify_rebuild, enforce: true };

        let (mut next, report) = match rebuild(&self.csr, &request, &options) {
            Ok(out) => out,
            Err(e @ CsrError::VerificationFailed(_)) | Err(e @ CsrError::InvalidStructure(_)) => {
                warn!(error = %e, "incremental rebuild rejected, rebuilding from graph");
                self.replace_csr(CsrTopology::from_graph(graph)?)?;
                return Ok((RebuildKind::Full, None));
            }
            Err(e) => return Err(e.into()),
        };

        if next.edge_count() != graph.edge_count() {
            warn!(
                csr_edges = next.edge_count(),
                graph_edges = graph.edge_count(),
                "rebuilt CSR disagrees with graph, rebuilding from graph"
            );
            self.replace_csr(CsrTopology::from_graph(graph)?)?;
            return Ok((RebuildKind::Full, Some(report)));
        }

        next.stamp_signature(graph.topology_signature());
        if let Err(e) = next.update_weights_from_graph(graph) {
            warn!(error = %e, "rebuilt CSR rows disagree with graph, rebuilding from graph");
            self.replace_csr(CsrTopology::from_graph(graph)?)?;
            return Ok((RebuildKind::Full, Some(report)));
        }
        self.replace_csr(next)?;
        Ok((RebuildKind::Incremental, Some(report)))
    }

    /// Upload `next` to the physics device and swap it in. If the upload
    /// fails the previous CSR stays in place and resident; it no longer
    /// matches the graph, so the next cycle resynchronises.
    fn replace_csr(&mut self, mut next: CsrTopology) -> Result<(), HybridError> {
        let Some(arena) = &self.arena else {
            self.csr = next;
            return Ok(());
        };
        // the device holds one copy at a time
        self.csr.release_device();
        if let Err(e) = next.upload_to_gpu(arena) {
            warn!(error = %e, nnz = next.nnz(), "rebuilt CSR does not fit the physics device, keeping previous");
            if let Err(restore) = self.csr.upload_to_gpu(arena) {
                error!(error = %restore, "previous CSR could not be restored on the physics device");
            }
            return Err(e.into());
        }
        self.csr = next;
        Ok(())
    }
}

impl std::fmt::Debug for HybridCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridCoordinator")
            .field("state", &self.state)
            .field("modules", &self.module_names())
            .field("nnz", &self.csr.nnz())
            .field("stats", &self.stats)
            .finish()
    }
}
