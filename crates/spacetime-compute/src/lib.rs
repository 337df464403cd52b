//! # spacetime-compute
//!
//! Accelerator layer for the hybrid topology engine.
//!
//! - [`DeviceEnumerator`] lists devices; [`EmulatedDeviceEnumerator`] backs
//!   them with the host thread pool.
//! - [`DeviceArena`] / [`DeviceBuffer`] enforce device affinity: a buffer is
//!   only readable from the device that allocated it.
//! - [`ComputeCluster`] picks the physics device and splits the rest into
//!   spectral and MCMC workers.

pub mod cluster;
pub mod device;
pub mod error;
pub mod memory;

pub use cluster::{ClusterCapabilities, ClusterConfig, ClusterMode, ClusterRoles, ComputeCluster};
pub use device::{
    DeviceDescriptor, DeviceEnumerator, DeviceId, DeviceKind, EmulatedDeviceEnumerator,
    StaticDeviceEnumerator,
};
pub use error::ComputeError;
pub use memory::{DeviceArena, DeviceBuffer};
