//! # spacetime-snapshot
//!
//! [`GraphSnapshot`]: an owned, versioned, read-only copy of the CSR topology
//! plus per-node mass, scalar field and curvature, stamped with the physics
//! tick it was taken at. Snapshots share no buffers with the live graph.

pub mod error;
pub mod snapshot;

pub use error::SnapshotError;
pub use snapshot::{should_dispatch, GraphSnapshot, DEFAULT_DISPATCH_INTERVAL, WORKSPACE_VECTORS};
