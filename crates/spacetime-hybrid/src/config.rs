use crate::buffer::DEFAULT_CAPACITY;

/// Coordinator tuning.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Recommendation buffer capacity (top-K kept per cycle).
    pub buffer_capacity: usize,
    /// Recommendations below this priority are dropped before conflict resolution.
    pub min_priority: f64,
    /// Upper bound on recommendations attempted per cycle.
    pub max_recommendations_per_step: usize,
    /// Rebuild (or reweight) the CSR after every cycle that changed the graph.
    pub auto_rebuild: bool,
    /// Run the verification pass on incremental rebuilds.
    pub verify_rebuild: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            buffer_capacity:              DEFAULT_CAPACITY,
            min_priority:                 0.0,
            max_recommendations_per_step: 256,
            auto_rebuild:                 true,
            verify_rebuild:               true,
        }
    }
}

impl CoordinatorConfig {
    pub fn from_env() -> Self {
        fn env_usize(key: &str, default: usize) -> usize {
            std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }
        fn env_f64(key: &str, default: f64) -> f64 {
            std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }
        fn env_bool(key: &str, default: bool) -> bool {
            std::env::var(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        }

        let d = Self::default();
        Self {
            buffer_capacity:              env_usize("SPACETIME_COORD_BUFFER_CAPACITY", d.buffer_capacity),
            min_priority:                 env_f64("SPACETIME_COORD_MIN_PRIORITY", d.min_priority),
            max_recommendations_per_step: env_usize("SPACETIME_COORD_MAX_PER_STEP", d.max_recommendations_per_step),
            auto_rebuild:                 env_bool("SPACETIME_COORD_AUTO_REBUILD", d.auto_rebuild),
            verify_rebuild:               env_bool("SPACETIME_COORD_VERIFY_REBUILD", d.verify_rebuild),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.buffer_capacity, 1000);
        assert!(cfg.auto_rebuild);
    }

    #[test]
    fn env_override_applied() {
        std::env::set_var("SPACETIME_COORD_MAX_PER_STEP", "12");
        std::env::set_var("SPACETIME_COORD_AUTO_REBUILD", "false");
        let cfg = CoordinatorConfig::from_env();
        assert_eq!(cfg.max_recommendations_per_step, 12);
        assert!(!cfg.auto_rebuild);
        std::env::remove_var("SPACETIME_COORD_MAX_PER_STEP");
        std::env::remove_var("SPACETIME_COORD_AUTO_REBUILD");
    }
}
