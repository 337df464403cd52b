//! Per-device memory arenas and device-bound buffers.
//!
//! A [`DeviceBuffer`] is owned by the arena that allocated it and can only be
//! viewed from that arena's device. Moving data between devices always goes
//! through host memory: `download` on the source, `upload` on the target.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::device::{DeviceDescriptor, DeviceId};
use crate::error::ComputeError;

#[derive(Debug)]
struct ArenaLedger {
    device:   DeviceId,
    capacity: u64,
    used:     AtomicU64,
    peak:     AtomicU64,
}

impl ArenaLedger {
    fn reserve(&self, bytes: u64) -> Result<(), ComputeError> {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(bytes);
            if next > self.capacity {
                return Err(ComputeError::OutOfMemory {
                    device:    self.device,
                    requested: bytes,
                    available: self.capacity - current,
                });
            }
            match self.used.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => {
                    self.peak.fetch_max(next, Ordering::Relaxed);
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, bytes: u64) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

// ─────────────────────────────────────────────
// DeviceArena
// ─────────────────────────────────────────────

/// Capacity-accounted allocator for one device. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeviceArena {
    ledger: Arc<ArenaLedger>,
}

impl DeviceArena {
    pub fn new(device: DeviceId, capacity_bytes: u64) -> Self {
        Self {
            ledger: Arc::new(ArenaLedger {
                device,
                capacity: capacity_bytes,
                used:     AtomicU64::new(0),
                peak:     AtomicU64::new(0),
            }),
        }
    }

    pub fn for_device(desc: &DeviceDescriptor) -> Self {
        Self::new(desc.id, desc.memory_bytes())
    }

    pub fn device(&self) -> DeviceId {
        self.ledger.device
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.ledger.capacity
    }

    pub fn used_bytes(&self) -> u64 {
        self.ledger.used.load(Ordering::Relaxed)
    }

    pub fn peak_bytes(&self) -> u64 {
        self.ledger.peak.load(Ordering::Relaxed)
    }

    pub fn available_bytes(&self) -> u64 {
        self.capacity_bytes().saturating_sub(self.used_bytes())
    }

    /// Whether `bytes` more could be allocated right now.
    pub fn can_fit(&self, bytes: u64) -> bool {
        bytes <= self.available_bytes()
    }

    /// Host → device copy.
    pub fn upload<T: Copy>(&self, host: &[T]) -> Result<DeviceBuffer<T>, ComputeError> {
        let bytes = byte_len::<T>(host.len());
        self.ledger.reserve(bytes)?;
        Ok(DeviceBuffer {
            data:    host.to_vec(),
            bytes,
            ledger:  Arc::clone(&self.ledger),
        })
    }

    /// Device allocation of `len` default-initialised elements.
    pub fn alloc<T: Copy + Default>(&self, len: usize) -> Result<DeviceBuffer<T>, ComputeError> {
        let bytes = byte_len::<T>(len);
        self.ledger.reserve(bytes)?;
        Ok(DeviceBuffer {
            data:    vec![T::default(); len],
            bytes,
            ledger:  Arc::clone(&self.ledger),
        })
    }

    /// Device → host copy. Fails if `buffer` belongs to another device.
    pub fn download<T: Copy>(&self, buffer: &DeviceBuffer<T>) -> Result<Vec<T>, ComputeError> {
        Ok(buffer.view(self.device())?.to_vec())
    }
}

fn byte_len<T>(len: usize) -> u64 {
    (len as u64).saturating_mul(std::mem::size_of::<T>() as u64)
}

// ─────────────────────────────────────────────
// DeviceBuffer
// ─────────────────────────────────────────────

/// Typed allocation living on exactly one device.
///
/// Not `Clone`: duplicating device memory is an explicit upload. Dropping the
/// buffer returns its bytes to the arena.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    data:    Vec<T>,
    bytes:   u64,
    ledger:  Arc<ArenaLedger>,
}

impl<T: Copy> DeviceBuffer<T> {
    pub fn device(&self) -> DeviceId {
        self.ledger.device
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes
    }

    /// Kernel-side read access from `accessor`.
    pub fn view(&self, accessor: DeviceId) -> Result<&[T], ComputeError> {
        self.check_device(accessor)?;
        Ok(&self.data)
    }

    /// Kernel-side write access from `accessor`.
    pub fn view_mut(&mut self, accessor: DeviceId) -> Result<&mut [T], ComputeError> {
        self.check_device(accessor)?;
        Ok(&mut self.data)
    }

    /// Overwrite the buffer from host memory; lengths must match.
    pub fn copy_from_host(&mut self, host: &[T]) -> Result<(), ComputeError> {
        if host.len() != self.data.len() {
            return Err(ComputeError::SizeMismatch {
                expected: self.data.len(),
                got:      host.len(),
            });
        }
        self.data.copy_from_slice(host);
        Ok(())
    }

    fn check_device(&self, accessor: DeviceId) -> Result<(), ComputeError> {
        if accessor != self.device() {
            return Err(ComputeError::DeviceMismatch {
                owner: self.device(),
                accessor,
            });
        }
        Ok(())
    }
}

impl<T> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        self.ledger.release(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_accounts_bytes_and_drop_releases_them() {
        let arena = DeviceArena::new(DeviceId(0), 1024);
        {
            let buf = arena.upload(&[1u32, 2, 3, 4]).unwrap();
            assert_eq!(buf.size_bytes(), 16);
            assert_eq!(arena.used_bytes(), 16);
        }
        assert_eq!(arena.used_bytes(), 0);
        assert_eq!(arena.peak_bytes(), 16);
    }

    #[test]
    fn allocation_beyond_capacity_fails() {
        let arena = DeviceArena::new(DeviceId(1), 8);
        let _a = arena.alloc::<u32>(2).unwrap();
        let err = arena.alloc::<u32>(1).unwrap_err();
        assert_eq!(
            err,
            ComputeError::OutOfMemory { device: DeviceId(1), requested: 4, available: 0 }
        );
    }

    #[test]
    fn cross_device_access_is_rejected() {
        let a = DeviceArena::new(DeviceId(0), 1024);
        let b = DeviceArena::new(DeviceId(1), 1024);
        let buf = a.upload(&[1.0f64, 2.0]).unwrap();

        assert!(matches!(b.download(&buf), Err(ComputeError::DeviceMismatch { .. })));
        let host = a.download(&buf).unwrap();
        let moved = b.upload(&host).unwrap();
        assert_eq!(moved.view(DeviceId(1)).unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn copy_from_host_requires_equal_length() {
        let arena = DeviceArena::new(DeviceId(0), 1024);
        let mut buf = arena.alloc::<f64>(3).unwrap();
        assert!(buf.copy_from_host(&[1.0, 2.0]).is_err());
        buf.copy_from_host(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(buf.view(DeviceId(0)).unwrap(), &[1.0, 2.0, 3.0]);
    }
}
