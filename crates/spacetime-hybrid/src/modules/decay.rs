//! Edge decay: edges between resting nodes slowly lose weight; edges that
//! have fallen below a floor are proposed for removal.

use spacetime_graph::{NodeState, SpacetimeGraph};

use crate::error::HybridError;
use crate::module::{HybridPhysicsModule, PhysicsModule};
use crate::recommendation::TopologyRecommendation;

#[derive(Debug, Clone)]
pub struct EdgeDecayConfig {
    /// Weight lost per unit time by an edge whose endpoints are both at rest.
    pub decay_rate: f64,
    /// Edges lighter than this are proposed for removal.
    pub removal_floor: f64,
    pub weaken_priority: f64,
    pub removal_priority: f64,
}

impl Default for EdgeDecayConfig {
    fn default() -> Self {
        Self {
            decay_rate:       0.01,
            removal_floor:    0.02,
            weaken_priority:  1.0,
            removal_priority: 5.0,
        }
    }
}

#[derive(Debug)]
pub struct EdgeDecayModule {
    config:  EdgeDecayConfig,
    enabled: bool,
    pending: Vec<TopologyRecommendation>,
}

impl EdgeDecayModule {
    pub const NAME: &'static str = "edge_decay";

    pub fn new(config: EdgeDecayConfig) -> Self {
        Self { config, enabled: true, pending: Vec::new() }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Default for EdgeDecayModule {
    fn default() -> Self {
        Self::new(EdgeDecayConfig::default())
    }
}

impl PhysicsModule for EdgeDecayModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn execute_step(&mut self, graph: &SpacetimeGraph, dt: f64) -> Result<(), HybridError> {
        self.pending.clear();
        let delta = self.config.decay_rate * dt;
        let at_rest = |i: u32| graph.node_state(i) == Some(NodeState::Rest);

        for e in graph.edges() {
            if e.weight < self.config.removal_floor {
                self.pending.push(TopologyRecommendation::remove_edge(
                    e.a,
                    e.b,
                    self.config.removal_priority,
                    Self::NAME,
                ));
            } else if delta > 0.0 && at_rest(e.a) && at_rest(e.b) {
                // lighter edges decay first
                let priority = self.config.weaken_priority * (1.0 - e.weight.min(1.0));
                self.pending.push(TopologyRecommendation::weaken_edge(
                    e.a,
                    e.b,
                    delta,
                    priority,
                    Self::NAME,
                ));
            }
        }
        Ok(())
    }
}

impl HybridPhysicsModule for EdgeDecayModule {
    fn recommendations(&mut self, _graph: &SpacetimeGraph) -> Vec<TopologyRecommendation> {
        self.pending.clone()
    }

    fn has_recommendations(&self) -> bool {
        !self.pending.is_empty()
    }

    fn clear_recommendations(&mut self) {
        self.pending.clear();
    }
}
