//! Triadic closure around excited nodes: two neighbours of an excited node
//! that are not yet connected get a `CreateEdge` proposal.

use spacetime_graph::{NodeState, SpacetimeGraph};

use crate::error::HybridError;
use crate::module::{HybridPhysicsModule, PhysicsModule};
use crate::recommendation::TopologyRecommendation;

#[derive(Debug, Clone)]
pub struct TriadicClosureConfig {
    /// Multiplied by both incident weights to form the priority.
    pub base_priority: f64,
    /// Cap on proposals per step.
    pub max_per_step: usize,
}

impl Default for TriadicClosureConfig {
    fn default() -> Self {
        Self { base_priority: 10.0, max_per_step: 64 }
    }
}

#[derive(Debug)]
pub struct TriadicClosureModule {
    config:  TriadicClosureConfig,
    enabled: bool,
    pending: Vec<TopologyRecommendation>,
}

impl TriadicClosureModule {
    pub const NAME: &'static str = "triadic_closure";

    pub fn new(config: TriadicClosureConfig) -> Self {
        Self { config, enabled: true, pending: Vec::new() }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Default for TriadicClosureModule {
    fn default() -> Self {
        Self::new(TriadicClosureConfig::default())
    }
}

impl PhysicsModule for TriadicClosureModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn execute_step(&mut self, graph: &SpacetimeGraph, _dt: f64) -> Result<(), HybridError> {
        self.pending.clear();
        let centres = graph
            .node_states()
            .iter()
            .enumerate()
            .filter(|(_, &s)| s == NodeState::Excited)
            .map(|(i, _)| i as u32);

        'centres: for c in centres {
            let nbrs: Vec<(u32, f64)> = graph.neighbors(c).collect();
            for (k, &(u, wu)) in nbrs.iter().enumerate() {
                for &(v, wv) in &nbrs[k + 1..] {
                    if graph.has_edge(u, v) {
                        continue;
                    }
                    if self.pending.len() >= self.config.max_per_step {
                        break 'centres;
                    }
                    // new edge inherits the geometric mean of the open triad
                    self.pending.push(TopologyRecommendation::create_edge(
                        u,
                        v,
                        (wu * wv).sqrt(),
                        self.config.base_priority * wu * wv,
                        Self::NAME,
                    ));
                }
            }
        }
        Ok(())
    }
}

impl HybridPhysicsModule for TriadicClosureModule {
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
