//! # spacetime-hybrid
//!
//! Hybrid CPU/accelerator topology pipeline.
//!
//! Analysis modules never mutate the graph directly. They implement
//! [`HybridPhysicsModule`] and emit [`TopologyRecommendation`]s; once per step
//! the [`HybridCoordinator`]:
//!
//! 1. collects recommendations into the bounded [`RecommendationBuffer`],
//! 2. filters by minimum priority and per-step limit,
//! 3. resolves conflicts (highest priority per normalised pair wins),
//! 4. applies survivors one by one, collecting an [`ApplyBatchReport`],
//! 5. rebuilds or reweights the CSR and re-uploads it to the physics device.

pub mod apply;
pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod module;
pub mod modules;
pub mod recommendation;

pub use apply::{apply_recommendation, ApplyBatchReport, ApplyOutcome, NoOpReason};
pub use buffer::{RecommendationBuffer, DEFAULT_CAPACITY};
pub use config::CoordinatorConfig;
pub use coordinator::{CoordinatorState, CoordinatorStats, CycleReport, HybridCoordinator, RebuildKind};
pub use error::{ApplyError, HybridError};
pub use module::{HybridPhysicsModule, PhysicsModule};
pub use modules::{EdgeDecayConfig, EdgeDecayModule, TriadicClosureConfig, TriadicClosureModule};
pub use recommendation::{RecommendationType, TopologyRecommendation};
