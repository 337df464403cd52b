//! Device identity, capabilities and enumeration.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

// ─────────────────────────────────────────────
// DeviceId
// ─────────────────────────────────────────────

/// Ordinal of a device in enumeration order. Device 0 is always physics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ─────────────────────────────────────────────
// DeviceKind
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Discrete accelerator driven through a vendor runtime.
    Gpu,
    /// Host-emulated accelerator: kernels run on the rayon pool, memory is a
    /// capacity-accounted host arena.
    Emulated,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Gpu      => write!(f, "gpu"),
            DeviceKind::Emulated => write!(f, "emulated"),
        }
    }
}

// ─────────────────────────────────────────────
// DeviceDescriptor
// ─────────────────────────────────────────────

/// Static description of one enumerated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id:                  DeviceId,
    pub name:                String,
    pub kind:                DeviceKind,
    /// Global memory in MiB; sizes the device arena.
    pub memory_mb:           u64,
    pub supports_f64:        bool,
    /// Parallel lanes the device exposes (SMs × warps, or host threads).
    pub compute_units:       u32,
}

impl DeviceDescriptor {
    pub fn memory_bytes(&self) -> u64 {
        self.memory_mb * 1024 * 1024
    }
}

// ─────────────────────────────────────────────
// DeviceEnumerator
// ─────────────────────────────────────────────

/// Source of the device list used by [`crate::ComputeCluster::initialize`].
///
/// Implementations must return devices in a stable order; the first entry
/// becomes the physics device.
pub trait DeviceEnumerator: Send + Sync {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, ComputeError>;
}

/// Host-emulated accelerators, one per configured device slot.
#[derive(Debug, Clone)]
pub struct EmulatedDeviceEnumerator {
    pub device_count: u32,
    pub memory_mb:    u64,
    pub supports_f64: bool,
}

impl Default for EmulatedDeviceEnumerator {
    fn default() -> Self {
        Self {
            device_count: 1,
            memory_mb:    4096,
            supports_f64: true,
        }
    }
}

impl DeviceEnumerator for EmulatedDeviceEnumerator {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, ComputeError> {
        let lanes = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);

        Ok((0..self.device_count)
            .map(|i| DeviceDescriptor {
                id:            DeviceId(i),
                name:          format!("emulated-accelerator-{i}"),
                kind:          DeviceKind::Emulated,
                memory_mb:     self.memory_mb,
                supports_f64:  self.supports_f64,
                compute_units: lanes,
            })
            .collect())
    }
}

/// Fixed device list, for hosts that discover devices out of band and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceEnumerator {
    pub devices: Vec<DeviceDescriptor>,
}

impl StaticDeviceEnumerator {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self { devices }
    }

    /// `count` identical GPU descriptors, ids `0..count`.
    pub fn uniform(count: u32, memory_mb: u64, supports_f64: bool) -> Self {
        Self {
            devices: (0..count)
                .map(|i| DeviceDescriptor {
                    id:            DeviceId(i),
                    name:          format!("gpu-{i}"),
                    kind:          DeviceKind::Gpu,
                    memory_mb,
                    supports_f64,
                    compute_units: 64,
                })
                .collect(),
        }
    }
}

impl DeviceEnumerator for StaticDeviceEnumerator {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, ComputeError> {
        Ok(self.devices.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emulated_enumerator_numbers_devices_in_order() {
        let e = EmulatedDeviceEnumerator { device_count: 3, ..Default::default() };
        let devices = e.enumerate().unwrap();
        let ids: Vec<_> = devices.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![DeviceId(0), DeviceId(1), DeviceId(2)]);
        assert!(devices.iter().all(|d| d.kind == DeviceKind::Emulated));
    }

    #[test]
    fn memory_bytes_scales_from_mib() {
        let d = &StaticDeviceEnumerator::uniform(1, 2, true).devices[0];
        assert_eq!(d.memory_bytes(), 2 * 1024 * 1024);
    }
}
