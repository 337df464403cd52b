//! Stand-in for the numeric physics kernels: an excitable-media node cycle
//! and a relaxing scalar field. Enough to drive the reference modules.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use spacetime_graph::{GraphError, NodeState, SpacetimeGraph};

/// Scalar-field kick applied when a node fires.
const FIRE_KICK: f64 = 1.0;
/// Fraction of the field lost per unit time.
const RELAXATION: f64 = 0.1;

#[derive(Debug)]
pub struct PhysicsStub {
    excitation_rate: f64,
    rng:             StdRng,
}

impl PhysicsStub {
    pub fn new(excitation_rate: f64, seed: u64) -> Self {
        Self { excitation_rate, rng: StdRng::seed_from_u64(seed) }
    }

    /// `Rest → Excited` with probability `excitation_rate`,
    /// `Excited → Refractory → Rest` deterministically. Firing nodes get a
    /// field kick; the field relaxes towards zero.
    pub fn step(&mut self, graph: &mut SpacetimeGraph, dt: f64) -> Result<usize, GraphError> {
        let decay = (1.0 - RELAXATION * dt).clamp(0.0, 1.0);
        let mut field: Vec<f64> = graph.scalar_fields().iter().map(|phi| phi * decay).collect();
        let mut fired = 0;

        for i in 0..graph.node_count() {
            let node = i as u32;
            let next = match graph.node_state(node) {
                Some(NodeState::Rest) if self.rng.gen_bool(self.excitation_rate.clamp(0.0, 1.0)) => {
                    field[i] += FIRE_KICK;
                    fired += 1;
                    NodeState::Excited
                }
                Some(NodeState::Excited) => NodeState::Refractory,
                _ => NodeState::Rest,
            };
            graph.set_node_state(node, next)?;
        }
        graph.replace_scalar_field(field)?;
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excitation_cycle_advances() {
        let mut g = SpacetimeGraph::ring(8, 0.5).unwrap();
        let mut physics = PhysicsStub::new(1.0, 1);

        assert_eq!(physics.step(&mut g, 1.0).unwrap(), 8);
        assert!(g.node_states().iter().all(|&s| s == NodeState::Excited));
        physics.step(&mut g, 1.0).unwrap();
        assert!(g.node_states().iter().all(|&s| s == NodeState::Refractory));
        physics.step(&mut g, 1.0).unwrap();
        assert!(g.node_states().iter().all(|&s| s == NodeState::Rest));
    }

    #[test]
    fn field_relaxes_without_firing() {
        let mut g = SpacetimeGraph::ring(4, 0.5).unwrap();
        g.set_scalar_field(2, 1.0).unwrap();
        let mut physics = PhysicsStub::new(0.0, 1);
        physics.step(&mut g, 1.0).unwrap();
        assert!((g.scalar_field(2).unwrap() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn topology_is_untouched() {
        let mut g = SpacetimeGraph::ring(16, 0.5).unwrap();
        let sig = g.topology_signature();
        let mut physics = PhysicsStub::new(0.3, 9);
        for _ in 0..10 {
            physics.step(&mut g, 1.0).unwrap();
        }
        assert_eq!(g.topology_signature(), sig);
    }
}
