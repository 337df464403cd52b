//! Spectral dimension from lazy random-walk return probabilities.
//!
//! `P = ½(I + D⁻¹W)`. For each sampled source the walk distribution is
//! propagated exactly for `walk_steps` steps and `p(t)` is the mass back at
//! the source, averaged over sources. The local estimate
//! `d_s(t) = −2 Δln p / Δln t` is averaged over the configured window.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use spacetime_compute::DeviceArena;

use crate::cancel::CancelToken;
use crate::config::SpectralConfig;
use crate::error::OrchestratorError;
use crate::kernels::{CsrView, DeviceTopology};

#[derive(Debug, Clone, PartialEq)]
pub struct SpectralEstimate {
    pub spectral_dimension: f64,
    pub return_probability: Vec<f64>,
    pub points_used:        usize,
}

pub fn spectral_dimension(
    arena: &DeviceArena,
    topology: &DeviceTopology,
    config: &SpectralConfig,
    seed: u64,
    cancel: &CancelToken,
) -> Result<SpectralEstimate, OrchestratorError> {
    let n = topology.node_count();
    let dev = topology.device();
    let csr = topology.view()?;

    // inverse weighted degree; 0 marks an isolated node
    let mut inv_degree = arena.alloc::<f64>(n)?;
    inv_degree
        .view_mut(dev)?
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, d)| {
            let w = csr.weighted_degree(i);
            *d = if w > 0.0 { 1.0 / w } else { 0.0 };
        });
    let inv_degree = inv_degree.view(dev)?;

    let mut current = arena.alloc::<f64>(n)?;
    let mut next = arena.alloc::<f64>(n)?;

    let sources = sample_sources(n, config.sample_nodes, seed);
    let steps = config.walk_steps;
    let mut p = vec![0.0; steps + 1];

    for &s in &sources {
        let dist = current.view_mut(dev)?;
        dist.fill(0.0);
        dist[s] = 1.0;
        p[0] += 1.0;

        for t in 1..=steps {
            cancel.check()?;
            lazy_step(csr, inv_degree, current.view(dev)?, next.view_mut(dev)?);
            std::mem::swap(&mut current, &mut next);
            p[t] += current.view(dev)?[s];
        }
    }

    let k = sources.len() as f64;
    p.iter_mut().for_each(|v| *v /= k);

    let (spectral_dimension, points_used) = window_estimate(&p, config.window_start, config.window_end);
    Ok(SpectralEstimate { spectral_dimension, return_probability: p, points_used })
}

/// One application of `P` in pull form: `next_j = ½ cur_j + ½ Σ_i w_ij cur_i / d_i`.
/// Isolated nodes keep their mass.
fn lazy_step(csr: CsrView<'_>, inv_degree: &[f64], current: &[f64], next: &mut [f64]) {
    next.par_iter_mut().enumerate().for_each(|(j, out)| {
        let keep = if inv_degree[j] > 0.0 { 0.5 } else { 1.0 };
        let (cols, weights) = csr.row(j);
        let inflow: f64 = cols
            .iter()
            .zip(weights)
            .map(|(&i, &w)| w * inv_degree[i as usize] * current[i as usize])
            .sum();
        *out = keep * current[j] + 0.5 * inflow;
    });
}

fn sample_sources(n: usize, wanted: usize, seed: u64) -> Vec<usize> {
    if wanted == 0 || wanted >= n {
        return (0..n).collect();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, n, wanted).into_vec();
    picked.sort_unstable();
    picked
}

/// Mean of `−2 Δln p / Δln t` over consecutive steps in `[start, end]`.
/// Points where `p` vanishes are skipped; no usable point yields `0.0`.
fn window_estimate(p: &[f64], start: usize, end: usize) -> (f64, usize) {
    let last = p.len().saturating_sub(1);
    let start = start.max(1);
    let end = end.min(last);

    let mut sum = 0.0;
    let mut used = 0;
    for t in start..end {
        let (p0, p1) = (p[t], p[t + 1]);
        if p0 <= 0.0 || p1 <= 0.0 {
            continue;
        }
        let d = -2.0 * (p1.ln() - p0.ln()) / (((t + 1) as f64).ln() - (t as f64).ln());
        if d.is_finite() {
            sum += d;
            used += 1;
        }
    }
    if used == 0 {
        (0.0, 0)
    } else {
        (sum / used as f64, used)
    }
}
