use spacetime_snapshot::DEFAULT_DISPATCH_INTERVAL;

/// Spectral-dimension worker tuning.
#[derive(Debug, Clone)]
pub struct SpectralConfig {
    /// Source nodes sampled per snapshot (capped at the node count).
    pub sample_nodes: usize,
    /// Lazy random-walk steps propagated from each source.
    pub walk_steps: usize,
    /// First step of the averaging window (inclusive).
    pub window_start: usize,
    /// Last step of the averaging window (inclusive).
    pub window_end: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            sample_nodes: 16,
            walk_steps:   100,
            window_start: 20,
            window_end:   80,
        }
    }
}

/// Ising Metropolis worker tuning.
#[derive(Debug, Clone)]
pub struct McmcConfig {
    /// Inverse temperature β.
    pub beta: f64,
    /// Sweeps discarded before measuring.
    pub burn_in_sweeps: usize,
    /// Measured sweeps; one sweep is `N` single-spin proposals.
    pub sweeps: usize,
}

impl Default for McmcConfig {
    fn default() -> Self {
        Self {
            beta:           1.0,
            burn_in_sweeps: 50,
            sweeps:         200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Ticks between snapshot dispatches (0 = disabled).
    pub dispatch_interval: u64,
    /// Average degree assumed when sizing the worst-case snapshot.
    pub max_average_degree: usize,
    /// Broadcast channel capacity for orchestrator events.
    pub event_capacity: usize,
    /// Base seed; each job mixes in its tick.
    pub seed: u64,
    pub spectral: SpectralConfig,
    pub mcmc: McmcConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dispatch_interval:  DEFAULT_DISPATCH_INTERVAL,
            max_average_degree: 16,
            event_capacity:     64,
            seed:               0x5EED_CAFE,
            spectral:           SpectralConfig::default(),
            mcmc:               McmcConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        fn env_u64(key: &str, default: u64) -> u64 {
            std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }
        fn env_usize(key: &str, default: usize) -> usize {
            std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }
        fn env_f64(key: &str, default: f64) -> f64 {
            std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }

        let d = Self::default();
        Self {
            dispatch_interval:  env_u64("SPACETIME_ORCH_INTERVAL", d.dispatch_interval),
            max_average_degree: env_usize("SPACETIME_ORCH_MAX_AVG_DEGREE", d.max_average_degree),
            event_capacity:     env_usize("SPACETIME_ORCH_EVENT_CAPACITY", d.event_capacity),
            seed:               env_u64("SPACETIME_ORCH_SEED", d.seed),
            spectral: SpectralConfig {
                sample_nodes: env_usize("SPACETIME_ORCH_SPECTRAL_SAMPLES", d.spectral.sample_nodes),
                walk_steps:   env_usize("SPACETIME_ORCH_SPECTRAL_STEPS", d.spectral.walk_steps),
                window_start: env_usize("SPACETIME_ORCH_SPECTRAL_WINDOW_START", d.spectral.window_start),
                window_end:   env_usize("SPACETIME_ORCH_SPECTRAL_WINDOW_END", d.spectral.window_end),
            },
            mcmc: McmcConfig {
                beta:           env_f64("SPACETIME_ORCH_MCMC_BETA", d.mcmc.beta),
                burn_in_sweeps: env_usize("SPACETIME_ORCH_MCMC_BURN_IN", d.mcmc.burn_in_sweeps),
                sweeps:         env_usize("SPACETIME_ORCH_MCMC_SWEEPS", d.mcmc.sweeps),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.dispatch_interval, 100);
        assert!(cfg.spectral.window_start < cfg.spectral.window_end);
        assert!(cfg.spectral.window_end <= cfg.spectral.walk_steps);
    }

    #[test]
    fn env_override_applied() {
        std::env::set_var("SPACETIME_ORCH_MCMC_BETA", "0.25");
        std::env::set_var("SPACETIME_ORCH_INTERVAL", "0");
        let cfg = OrchestratorConfig::from_env();
        assert_eq!(cfg.mcmc.beta, 0.25);
        assert_eq!(cfg.dispatch_interval, 0);
        std::env::remove_var("SPACETIME_ORCH_MCMC_BETA");
        std::env::remove_var("SPACETIME_ORCH_INTERVAL");
    }
}
