//! Error types for the compute layer.

use thiserror::Error;

use crate::device::DeviceId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComputeError {
    #[error("no hardware-accelerated compute device found")]
    NoDevice,

    #[error("device {device} ('{name}') does not support double precision")]
    DoublePrecisionUnsupported { device: DeviceId, name: String },

    #[error("device {0} not present in the cluster")]
    UnknownDevice(DeviceId),

    #[error("buffer lives on device {owner} and cannot be accessed from device {accessor}")]
    DeviceMismatch { owner: DeviceId, accessor: DeviceId },

    #[error("device {device} out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { device: DeviceId, requested: u64, available: u64 },

    #[error("buffer length mismatch: expected {expected}, got {got}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("device enumeration failed: {0}")]
    Enumeration(String),
}
