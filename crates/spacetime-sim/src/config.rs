//! Driver configuration loaded from environment variables.
//!
//! Library components read their own prefixes (`SPACETIME_COORD_*`,
//! `SPACETIME_CLUSTER_*`, `SPACETIME_ORCH_*`); this struct covers the driver.
//!
//! | Variable                        | Default | Description                               |
//! |---------------------------------|---------|-------------------------------------------|
//! | `SPACETIME_LOG_LEVEL`           | `info`  | tracing filter                            |
//! | `SPACETIME_NODES`               | `1024`  | ring-lattice node count                   |
//! | `SPACETIME_CHORDS`              | `256`   | random chords added to the ring           |
//! | `SPACETIME_INITIAL_WEIGHT`      | `0.5`   | ring edge weight                          |
//! | `SPACETIME_STEPS`               | `1000`  | simulation steps                          |
//! | `SPACETIME_DT`                  | `1.0`   | step size handed to modules               |
//! | `SPACETIME_EXCITATION_RATE`     | `0.02`  | per-step chance a resting node fires      |
//! | `SPACETIME_DEVICES`             | `3`     | emulated devices (physics + workers)      |
//! | `SPACETIME_DEVICE_MEMORY_MB`    | `1024`  | memory per emulated device                |
//! | `SPACETIME_SHUTDOWN_TIMEOUT_MS` | `5000`  | bounded wait for in-flight analysis jobs  |
//! | `SPACETIME_SEED`                | `42`    | seed for graph construction and physics   |

#[derive(Debug, Clone)]
pub struct Config {
    /// Tracing filter string, e.g. `"spacetime_hybrid=debug,info"`.
    pub log_level: String,
    pub node_count: usize,
    pub chords: usize,
    pub initial_weight: f64,
    pub steps: u64,
    pub dt: f64,
    pub excitation_rate: f64,
    pub devices: u32,
    pub device_memory_mb: u64,
    pub shutdown_timeout_ms: u64,
    pub seed: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            log_level:           env_str("SPACETIME_LOG_LEVEL", "info"),
            node_count:          env_parse("SPACETIME_NODES", 1024),
            chords:              env_parse("SPACETIME_CHORDS", 256),
            initial_weight:      env_parse("SPACETIME_INITIAL_WEIGHT", 0.5),
            steps:               env_parse("SPACETIME_STEPS", 1000),
            dt:                  env_parse("SPACETIME_DT", 1.0),
            excitation_rate:     env_parse("SPACETIME_EXCITATION_RATE", 0.02),
            devices:             env_parse("SPACETIME_DEVICES", 3),
            device_memory_mb:    env_parse("SPACETIME_DEVICE_MEMORY_MB", 1024),
            shutdown_timeout_ms: env_parse("SPACETIME_SHUTDOWN_TIMEOUT_MS", 5000),
            seed:                env_parse("SPACETIME_SEED", 42),
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
