//! Module capabilities the coordinator drives each step.

use spacetime_graph::SpacetimeGraph;

use crate::error::HybridError;
use crate::recommendation::TopologyRecommendation;

/// Per-step analysis module.
///
/// Modules only read the graph. Topology changes go through
/// [`HybridPhysicsModule`] recommendations so the coordinator can resolve
/// conflicts between modules.
pub trait PhysicsModule: Send {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    fn initialize(&mut self, _graph: &SpacetimeGraph) -> Result<(), HybridError> {
        Ok(())
    }

    fn execute_step(&mut self, graph: &SpacetimeGraph, dt: f64) -> Result<(), HybridError>;
}

/// A [`PhysicsModule`] that proposes topology mutations.
pub trait HybridPhysicsModule: PhysicsModule {
    /// Recommendations produced by the last `execute_step`.
    fn recommendations(&mut self, graph: &SpacetimeGraph) -> Vec<TopologyRecommendation>;

    fn has_recommendations(&self) -> bool;

    /// Reset per-step state after the coordinator has collected.
    fn clear_recommendations(&mut self);
}
