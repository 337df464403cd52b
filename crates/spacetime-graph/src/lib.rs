//! # spacetime-graph
//!
//! Authoritative graph for the spacetime simulation.
//!
//! Provides the data model the topology engine mutates and snapshots:
//! - [`model::NodeState`]          : discrete per-node state (rest / excited / refractory)
//! - [`model::TopologySignature`]  : cheap staleness token (version + structural hash)
//! - [`adjacency::SymmetricAdjacency`] : sorted, symmetric weighted adjacency rows
//! - [`graph::SpacetimeGraph`]     : adjacency + node fields + topology version
//!
//! Node count is fixed per topology epoch. Changing it means building a new
//! [`SpacetimeGraph`].

pub mod adjacency;
pub mod error;
pub mod graph;
pub mod model;

pub use adjacency::SymmetricAdjacency;
pub use error::GraphError;
pub use graph::SpacetimeGraph;
pub use model::{normalize_pair, EdgeRef, NodeState, TopologySignature};
