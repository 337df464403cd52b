//! [`ComputeCluster`]: device enumeration and fixed role assignment.
//!
//! Device 0 always runs physics. The remaining devices are split between
//! spectral-dimension and MCMC workers once, at initialisation; the roles do
//! not change until the cluster is rebuilt.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::device::{DeviceDescriptor, DeviceEnumerator, DeviceId};
use crate::error::ComputeError;
use crate::memory::DeviceArena;

// ─────────────────────────────────────────────
// ClusterConfig
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ClusterConfig {
    /// Explicit spectral worker count. `None` takes whatever MCMC leaves over,
    /// or half the workers (rounded up) when both counts are unset.
    pub spectral_workers: Option<usize>,
    /// Explicit MCMC worker count, same rules as `spectral_workers`.
    pub mcmc_workers: Option<usize>,
    /// Fail initialisation when the physics device lacks f64 support.
    pub require_double_precision: bool,
}

impl ClusterConfig {
    /// Reads `SPACETIME_CLUSTER_SPECTRAL_WORKERS`, `SPACETIME_CLUSTER_MCMC_WORKERS`
    /// and `SPACETIME_CLUSTER_REQUIRE_F64`.
    pub fn from_env() -> Self {
        fn env_opt_usize(key: &str) -> Option<usize> {
            std::env::var(key).ok().and_then(|v| v.parse().ok())
        }
        fn env_bool(key: &str) -> bool {
            std::env::var(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        }

        Self {
            spectral_workers:         env_opt_usize("SPACETIME_CLUSTER_SPECTRAL_WORKERS"),
            mcmc_workers:             env_opt_usize("SPACETIME_CLUSTER_MCMC_WORKERS"),
            require_double_precision: env_bool("SPACETIME_CLUSTER_REQUIRE_F64"),
        }
    }
}

// ─────────────────────────────────────────────
// Roles & capabilities
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterMode {
    /// Physics only; snapshots are never dispatched.
    SingleDevice,
    /// Physics plus at least one worker device.
    MultiDevice,
}

impl std::fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterMode::SingleDevice => write!(f, "single-device"),
            ClusterMode::MultiDevice  => write!(f, "multi-device"),
        }
    }
}

/// Disjoint device sets, fixed at initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRoles {
    pub physics:  DeviceId,
    pub spectral: Vec<DeviceId>,
    pub mcmc:     Vec<DeviceId>,
    /// Devices left without a role after explicit counts were applied.
    pub idle:     Vec<DeviceId>,
}

impl ClusterRoles {
    /// Split `devices` (device 0 first) according to `config`.
    pub fn assign(devices: &[DeviceId], config: &ClusterConfig) -> Option<Self> {
        let (&physics, rest) = devices.split_first()?;
        let workers = rest.len();

        let (spectral, mcmc) = match (config.spectral_workers, config.mcmc_workers) {
            (None, None) => {
                let s = workers.div_ceil(2);
                (s, workers - s)
            }
            (Some(s), None) => {
                let s = s.min(workers);
                (s, workers - s)
            }
            (None, Some(m)) => {
                let m = m.min(workers);
                (workers - m, m)
            }
            (Some(s), Some(m)) => {
                let s = s.min(workers);
                (s, m.min(workers - s))
            }
        };

        Some(Self {
            physics,
            spectral: rest[..spectral].to_vec(),
            mcmc:     rest[spectral..spectral + mcmc].to_vec(),
            idle:     rest[spectral + mcmc..].to_vec(),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.spectral.len() + self.mcmc.len()
    }
}

/// Capability summary reported to hosts and the driver's final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCapabilities {
    pub total_devices:                 usize,
    pub physics_device_name:           String,
    pub spectral_worker_count:         usize,
    pub mcmc_worker_count:             usize,
    pub is_double_precision_supported: bool,
    pub mode:                          ClusterMode,
    pub total_vram_mb:                 u64,
}

// ─────────────────────────────────────────────
// ComputeCluster
// ─────────────────────────────────────────────

#[derive(Debug)]
pub struct ComputeCluster {
    devices: Vec<DeviceDescriptor>,
    roles:   ClusterRoles,
    arenas:  Vec<DeviceArena>,
}

impl ComputeCluster {
    /// Enumerate devices, validate the physics device and assign roles.
    pub fn initialize(
        enumerator: &dyn DeviceEnumerator,
        config: &ClusterConfig,
    ) -> Result<Self, ComputeError> {
        let mut devices = enumerator.enumerate()?;
        if devices.is_empty() {
            return Err(ComputeError::NoDevice);
        }
        devices.sort_by_key(|d| d.id);

        let physics = &devices[0];
        if config.require_double_precision && !physics.supports_f64 {
            return Err(ComputeError::DoublePrecisionUnsupported {
                device: physics.id,
                name:   physics.name.clone(),
            });
        }

        let ids: Vec<DeviceId> = devices.iter().map(|d| d.id).collect();
        let roles = ClusterRoles::assign(&ids, config).ok_or(ComputeError::NoDevice)?;
        let arenas = devices.iter().map(DeviceArena::for_device).collect();

        info!(
            physics = %physics.name,
            kind = %physics.kind,
            memory_mb = physics.memory_mb,
            f64 = physics.supports_f64,
            "physics device selected"
        );
        for d in &devices[1..] {
            if !d.supports_f64 {
                warn!(device = %d.id, name = %d.name, "worker device lacks double precision");
            }
        }
        if !roles.idle.is_empty() {
            warn!(idle = roles.idle.len(), "devices left without a role");
        }

        let cluster = Self { devices, roles, arenas };
        info!(
            devices = cluster.device_count(),
            spectral = cluster.roles.spectral.len(),
            mcmc = cluster.roles.mcmc.len(),
            mode = %cluster.mode(),
            "compute cluster initialised"
        );
        Ok(cluster)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn device(&self, id: DeviceId) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn roles(&self) -> &ClusterRoles {
        &self.roles
    }

    pub fn physics_device(&self) -> &DeviceDescriptor {
        &self.devices[0]
    }

    pub fn spectral_workers(&self) -> &[DeviceId] {
        &self.roles.spectral
    }

    pub fn mcmc_workers(&self) -> &[DeviceId] {
        &self.roles.mcmc
    }

    pub fn mode(&self) -> ClusterMode {
        if self.roles.worker_count() == 0 {
            ClusterMode::SingleDevice
        } else {
            ClusterMode::MultiDevice
        }
    }

    pub fn is_double_precision_supported(&self) -> bool {
        self.physics_device().supports_f64
    }

    pub fn total_vram_mb(&self) -> u64 {
        self.devices.iter().map(|d| d.memory_mb).sum()
    }

    /// Arena of device `id`.
    pub fn arena(&self, id: DeviceId) -> Result<&DeviceArena, ComputeError> {
        self.devices
            .iter()
            .position(|d| d.id == id)
            .map(|i| &self.arenas[i])
            .ok_or(ComputeError::UnknownDevice(id))
    }

    pub fn physics_arena(&self) -> &DeviceArena {
        &self.arenas[0]
    }

    pub fn capabilities(&self) -> ClusterCapabilities {
        ClusterCapabilities {
            total_devices:                 self.device_count(),
            physics_device_name:           self.physics_device().name.clone(),
            spectral_worker_count:         self.roles.spectral.len(),
            mcmc_worker_count:             self.roles.mcmc.len(),
            is_double_precision_supported: self.is_double_precision_supported(),
            mode:                          self.mode(),
            total_vram_mb:                 self.total_vram_mb(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{EmulatedDeviceEnumerator, StaticDeviceEnumerator};

    fn ids(n: u32) -> Vec<DeviceId> {
        (0..n).map(DeviceId).collect()
    }

    #[test]
    fn five_devices_split_two_and_two() {
        let cluster = ComputeCluster::initialize(
            &StaticDeviceEnumerator::uniform(5, 8192, true),
            &ClusterConfig::default(),
        )
        .unwrap();

        assert_eq!(cluster.roles().physics, DeviceId(0));
        assert_eq!(cluster.spectral_workers(), &[DeviceId(1), DeviceId(2)]);
        assert_eq!(cluster.mcmc_workers(), &[DeviceId(3), DeviceId(4)]);
        assert_eq!(cluster.mode(), ClusterMode::MultiDevice);

        let caps = cluster.capabilities();
        assert_eq!(caps.total_devices, 5);
        assert_eq!(caps.total_vram_mb, 5 * 8192);
        assert_eq!(caps.physics_device_name, "gpu-0");
    }

    #[test]
    fn odd_worker_count_favours_spectral() {
        let roles = ClusterRoles::assign(&ids(4), &ClusterConfig::default()).unwrap();
        assert_eq!(roles.spectral.len(), 2);
        assert_eq!(roles.mcmc.len(), 1);
    }

    #[test]
    fn single_device_has_no_workers() {
        let cluster = ComputeCluster::initialize(
            &EmulatedDeviceEnumerator::default(),
            &ClusterConfig::default(),
        )
        .unwrap();
        assert_eq!(cluster.mode(), ClusterMode::SingleDevice);
        assert_eq!(cluster.roles().worker_count(), 0);
    }

    #[test]
    fn explicit_counts_are_clamped() {
        let cfg = ClusterConfig {
            spectral_workers: Some(10),
            mcmc_workers: Some(3),
            ..Default::default()
        };
        let roles = ClusterRoles::assign(&ids(4), &cfg).unwrap();
        assert_eq!(roles.spectral.len(), 3);
        assert!(roles.mcmc.is_empty());

        let cfg = ClusterConfig { mcmc_workers: Some(1), ..Default::default() };
        let roles = ClusterRoles::assign(&ids(5), &cfg).unwrap();
        assert_eq!(roles.spectral.len(), 3);
        assert_eq!(roles.mcmc, vec![DeviceId(4)]);

        let cfg = ClusterConfig {
            spectral_workers: Some(1),
            mcmc_workers: Some(1),
            ..Default::default()
        };
        let roles = ClusterRoles::assign(&ids(5), &cfg).unwrap();
        assert_eq!(roles.idle, vec![DeviceId(3), DeviceId(4)]);
    }

    #[test]
    fn no_device_is_an_error() {
        let err = ComputeCluster::initialize(
            &StaticDeviceEnumerator::default(),
            &ClusterConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ComputeError::NoDevice);
    }

    #[test]
    fn missing_double_precision_fails_when_required() {
        let cfg = ClusterConfig { require_double_precision: true, ..Default::default() };
        let err = ComputeCluster::initialize(&StaticDeviceEnumerator::uniform(2, 1024, false), &cfg)
            .unwrap_err();
        assert!(matches!(err, ComputeError::DoublePrecisionUnsupported { device: DeviceId(0), .. }));

        // not required → accepted
        let cluster = ComputeCluster::initialize(
            &StaticDeviceEnumerator::uniform(2, 1024, false),
            &ClusterConfig::default(),
        )
        .unwrap();
        assert!(!cluster.is_double_precision_supported());
    }

    #[test]
    fn arenas_are_sized_from_device_memory() {
        let cluster = ComputeCluster::initialize(
            &StaticDeviceEnumerator::uniform(2, 16, true),
            &ClusterConfig::default(),
        )
        .unwrap();
        let arena = cluster.arena(DeviceId(1)).unwrap();
        assert_eq!(arena.device(), DeviceId(1));
        assert_eq!(arena.capacity_bytes(), 16 * 1024 * 1024);
        assert!(matches!(cluster.arena(DeviceId(7)), Err(ComputeError::UnknownDevice(_))));
    }
}
