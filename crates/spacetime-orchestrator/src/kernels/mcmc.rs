//! Metropolis sampling of an Ising-like spin field on the snapshot topology.
//!
//! `E = −Σ_{(i,j)} w_ij s_i s_j`, `s_i ∈ {−1, +1}`. A single-spin flip at `i`
//! changes the energy by `ΔE = 2 s_i Σ_j w_ij s_j` and is accepted with
//! probability `min(1, e^{−βΔE})`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use spacetime_compute::DeviceArena;

use crate::cancel::CancelToken;
use crate::config::McmcConfig;
use crate::error::OrchestratorError;
use crate::kernels::DeviceTopology;

#[derive(Debug, Clone, PartialEq)]
pub struct McmcEstimate {
    pub mean_energy:     f64,
    pub magnetisation:   f64,
    pub acceptance_rate: f64,
    pub sweeps:          usize,
}

pub fn ising_metropolis(
    arena: &DeviceArena,
    topology: &DeviceTopology,
    config: &McmcConfig,
    seed: u64,
    cancel: &CancelToken,
) -> Result<McmcEstimate, OrchestratorError> {
    let n = topology.node_count();
    let dev = topology.device();
    let csr = topology.view()?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut spins = arena.alloc::<f64>(n)?;
    let s = spins.view_mut(dev)?;
    s.iter_mut().for_each(|v| *v = if rng.gen::<bool>() { 1.0 } else { -1.0 });

    let local_field = |s: &[f64], i: usize| -> f64 {
        let (cols, weights) = csr.row(i);
        cols.iter().zip(weights).map(|(&j, &w)| w * s[j as usize]).sum()
    };

    // each undirected edge appears in two rows
    let mut energy = -0.5 * (0..n).map(|i| s[i] * local_field(s, i)).sum::<f64>();

    let total_sweeps = config.burn_in_sweeps + config.sweeps;
    let mut proposals = 0u64;
    let mut accepted = 0u64;
    let mut energy_sum = 0.0;
    let mut magnetisation_sum = 0.0;

    for sweep in 0..total_sweeps {
        cancel.check()?;
        for _ in 0..n {
            let i = rng.gen_range(0..n);
            let delta = 2.0 * s[i] * local_field(s, i);
            proposals += 1;
            if delta <= 0.0 || rng.gen::<f64>() < (-config.beta * delta).exp() {
                s[i] = -s[i];
                energy += delta;
                accepted += 1;
            }
        }
        if sweep >= config.burn_in_sweeps {
            energy_sum += energy;
            magnetisation_sum += s.iter().sum::<f64>().abs() / n as f64;
        }
    }

    let (mean_energy, magnetisation) = if config.sweeps == 0 {
        (energy, s.iter().sum::<f64>().abs() / n as f64)
    } else {
        let k = config.sweeps as f64;
        (energy_sum / k, magnetisation_sum / k)
    };
    let acceptance_rate = if proposals == 0 { 0.0 } else { accepted as f64 / proposals as f64 };

    Ok(McmcEstimate { mean_energy, magnetisation, acceptance_rate, sweeps: config.sweeps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetime_compute::DeviceId;
    use spacetime_graph::SpacetimeGraph;
    use spacetime_snapshot::GraphSnapshot;

    fn run(graph: &SpacetimeGraph, config: &McmcConfig, seed: u64) -> McmcEstimate {
        let arena = DeviceArena::new(DeviceId(2), 1 << 20);
        let snap = GraphSnapshot::from_graph(graph, None, 0).unwrap();
        let topo = DeviceTopology::upload(&arena, &snap).unwrap();
        ising_metropolis(&arena, &topo, config, seed, &CancelToken::never()).unwrap()
    }

    #[test]
    fn infinite_temperature_accepts_everything() {
        let config = McmcConfig { beta: 0.0, burn_in_sweeps: 5, sweeps: 200 };
        let est = run(&SpacetimeGraph::ring(64, 1.0).unwrap(), &config, 3);
        assert_eq!(est.acceptance_rate, 1.0);
        assert!(est.mean_energy.abs() < 16.0, "E = {}", est.mean_energy);
    }

    #[test]
    fn cold_ferromagnet_orders() {
        let config = McmcConfig { beta: 5.0, burn_in_sweeps: 50, sweeps: 200 };
        let est = run(&SpacetimeGraph::ring(64, 1.0).unwrap(), &config, 11);
        assert!(est.mean_energy < -32.0, "E = {}", est.mean_energy);
        assert!(est.acceptance_rate < 0.5);
    }

    #[test]
    fn same_seed_same_chain() {
        let g = SpacetimeGraph::ring(32, 0.7).unwrap();
        let config = McmcConfig { sweeps: 20, burn_in_sweeps: 0, ..Default::default() };
        assert_eq!(run(&g, &config, 99), run(&g, &config, 99));
    }

    #[test]
    fn spins_are_released_after_the_job() {
        let arena = DeviceArena::new(DeviceId(2), 1 << 20);
        let snap = GraphSnapshot::from_graph(&SpacetimeGraph::ring(16, 1.0).unwrap(), None, 0).unwrap();
        let topo = DeviceTopology::upload(&arena, &snap).unwrap();
        let resident = arena.used_bytes();
        ising_metropolis(&arena, &topo, &McmcConfig::default(), 1, &CancelToken::never()).unwrap();
        assert_eq!(arena.used_bytes(), resident);
        assert!(arena.peak_bytes() >= resident + 16 * 8);
    }
}
