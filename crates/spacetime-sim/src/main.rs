//! Headless simulation driver.
//!
//! Runs the physics stub, the hybrid topology coordinator and the
//! asynchronous snapshot analysis side by side on emulated devices, then
//! prints a JSON summary to stdout.
//!
//! All configuration comes from environment variables; see [`config`].

mod config;
mod physics;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use spacetime_compute::{
    ClusterCapabilities, ClusterConfig, ClusterMode, ComputeCluster, EmulatedDeviceEnumerator,
};
use spacetime_graph::{NodeState, SpacetimeGraph};
use spacetime_hybrid::{
    CoordinatorConfig, CoordinatorStats, EdgeDecayModule, HybridCoordinator,
    TriadicClosureModule,
};
use spacetime_orchestrator::{
    AsyncOrchestrator, McmcResult, MultiGpuOrchestrator, OrchestratorConfig, OrchestratorStatus,
    SpectralResult,
};
use spacetime_snapshot::GraphSnapshot;

use config::Config;
use physics::PhysicsStub;

#[derive(Debug, Serialize)]
struct RunSummary {
    capabilities:     ClusterCapabilities,
    steps:            u64,
    node_count:       usize,
    edge_count:       usize,
    topology_version: u64,
    coordinator:      CoordinatorStats,
    dispatches:       u64,
    dispatch_errors:  u64,
    drained:          bool,
    orchestrator:     OrchestratorStatus,
    spectral:         Option<SpectralResult>,
    mcmc:             Option<McmcResult>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .compact()
        .init();

    info!(
        nodes   = config.node_count,
        chords  = config.chords,
        steps   = config.steps,
        devices = config.devices,
        "spacetime-sim starting"
    );

    // ── Devices ────────────────────────────────────────
    let enumerator = EmulatedDeviceEnumerator {
        device_count: config.devices,
        memory_mb:    config.device_memory_mb,
        supports_f64: true,
    };
    let cluster = ComputeCluster::initialize(&enumerator, &ClusterConfig::from_env())?;
    let capabilities = cluster.capabilities();
    info!(
        mode     = %capabilities.mode,
        physics  = %capabilities.physics_device_name,
        spectral = capabilities.spectral_worker_count,
        mcmc     = capabilities.mcmc_worker_count,
        vram_mb  = capabilities.total_vram_mb,
        "compute cluster ready"
    );

    // ── Graph ──────────────────────────────────────────
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut graph = build_graph(&config, &mut rng)?;
    info!(nodes = graph.node_count(), edges = graph.edge_count(), "initial graph built");

    // ── Coordinator ────────────────────────────────────
    let mut coordinator = HybridCoordinator::new(
        CoordinatorConfig::from_env(),
        &graph,
        Some(cluster.physics_arena().clone()),
    )?;
    coordinator.register_module(Box::new(EdgeDecayModule::new(Default::default())));
    coordinator.register_module(Box::new(TriadicClosureModule::new(Default::default())));
    coordinator.initialize_modules(&graph)?;

    // ── Orchestrator ───────────────────────────────────
    let orchestrator = AsyncOrchestrator::new(&cluster, OrchestratorConfig::from_env())?;
    orchestrator.initialize(graph.node_count())?;
    let dispatching = cluster.mode() == ClusterMode::MultiDevice;

    // ── Step loop ──────────────────────────────────────
    let mut physics = PhysicsStub::new(config.excitation_rate, config.seed.wrapping_add(1));
    let mut dispatches = 0u64;
    let mut dispatch_errors = 0u64;

    for tick in 0..config.steps {
        let fired = physics.step(&mut graph, config.dt)?;
        coordinator.execute_modules(&graph, config.dt);
        let report = coordinator.run_cycle(&mut graph)?;
        debug!(
            tick,
            fired,
            structural = report.structural,
            weight_only = report.weight_only,
            rebuild = ?report.rebuild,
            "step"
        );

        if dispatching && orchestrator.should_dispatch(tick) {
            let snapshot = GraphSnapshot::from_graph(&graph, Some(coordinator.csr()), tick)?;
            match orchestrator.on_physics_step_completed(snapshot) {
                Ok(dispatch) => {
                    dispatches += dispatch.jobs.len() as u64;
                    if dispatch.skipped_busy > 0 {
                        debug!(tick, skipped = dispatch.skipped_busy, "workers busy; snapshot partially skipped");
                    }
                }
                Err(e) => {
                    dispatch_errors += 1;
                    warn!(tick, error = %e, "snapshot dispatch failed");
                }
            }
            info!(
                tick,
                edges   = graph.edge_count(),
                version = graph.topology_version(),
                nnz     = report.nnz,
                "checkpoint"
            );
        }
        // Lets completion events and the blocking pool make progress on
        // small runtimes.
        tokio::task::yield_now().await;
    }

    // ── Shutdown ───────────────────────────────────────
    let timeout = Duration::from_millis(config.shutdown_timeout_ms);
    let drained = orchestrator.wait_for_completion(timeout).await;
    if !drained {
        warn!(timeout_ms = config.shutdown_timeout_ms, "analysis jobs still running; cancelling");
    }
    orchestrator.cancel_all();
    orchestrator.wait_for_completion(timeout).await;

    let summary = RunSummary {
        capabilities,
        steps: config.steps,
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        topology_version: graph.topology_version(),
        coordinator: coordinator.stats(),
        dispatches,
        dispatch_errors,
        drained,
        orchestrator: orchestrator.status(),
        spectral: orchestrator.latest_spectral_result(),
        mcmc: orchestrator.latest_mcmc_result(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("spacetime-sim finished");
    Ok(())
}

/// Ring lattice plus `config.chords` random chords, with a few nodes
/// pre-excited so triadic closure has something to do on the first step.
fn build_graph(config: &Config, rng: &mut StdRng) -> anyhow::Result<SpacetimeGraph> {
    let n = config.node_count;
    let mut graph = SpacetimeGraph::ring(n, config.initial_weight)?;

    let mut added = 0;
    let mut attempts = 0;
    while added < config.chords && attempts < config.chords * 10 {
        attempts += 1;
        let a = rng.gen_range(0..n) as u32;
        let b = rng.gen_range(0..n) as u32;
        if a == b {
            continue;
        }
        if graph.add_edge(a, b, rng.gen_range(0.1..1.0))? {
            added += 1;
        }
    }
    if added < config.chords {
        warn!(requested = config.chords, added, "fewer chords than requested");
    }

    for node in 0..n as u32 {
        if rng.gen_bool(config.excitation_rate.clamp(0.0, 1.0)) {
            graph.set_node_state(node, NodeState::Excited)?;
        }
    }
    Ok(graph)
}
