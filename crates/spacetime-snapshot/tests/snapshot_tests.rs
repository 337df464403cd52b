//! Snapshot determinism and isolation from the live graph.

use spacetime_compute::{DeviceArena, DeviceId};
use spacetime_csr::CsrTopology;
use spacetime_graph::SpacetimeGraph;
use spacetime_snapshot::GraphSnapshot;

// ═══════════════════════════════════════════════
// Determinism
// ═══════════════════════════════════════════════

#[test]
fn back_to_back_snapshots_are_identical() {
    let mut g = SpacetimeGraph::ring(32, 0.5).unwrap();
    g.add_edge(0, 16, 0.9).unwrap();
    g.set_scalar_field(5, -1.5).unwrap();

    let a = GraphSnapshot::from_graph(&g, None, 100).unwrap();
    let b = GraphSnapshot::from_graph(&g, None, 100).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.topology_version(), b.topology_version());
}

#[test]
fn resident_csr_snapshot_matches_host_build() {
    let g = SpacetimeGraph::ring(16, 0.25).unwrap();
    let arena = DeviceArena::new(DeviceId(0), 1 << 16);
    let mut csr = CsrTopology::from_graph(&g).unwrap();
    csr.upload_to_gpu(&arena).unwrap();

    let via_device = GraphSnapshot::from_graph(&g, Some(&csr), 4).unwrap();
    let via_graph = GraphSnapshot::from_graph(&g, None, 4).unwrap();
    assert_eq!(via_device, via_graph);
}

// ═══════════════════════════════════════════════
// Isolation
// ═══════════════════════════════════════════════

#[test]
fn later_mutations_do_not_reach_snapshot() {
    let mut g = SpacetimeGraph::ring(8, 0.5).unwrap();
    let snap = GraphSnapshot::from_graph(&g, None, 1).unwrap();
    let before = snap.clone();

    g.remove_edge(0, 1).unwrap();
    g.set_edge_weight(2, 3, 0.9).unwrap();
    g.set_scalar_field(4, 3.0).unwrap();

    assert_eq!(snap, before);
    assert_eq!(snap.edge_count(), 8);
    assert_ne!(snap.signature(), g.topology_signature());
}

// ═══════════════════════════════════════════════
// Weight consistency
// ═══════════════════════════════════════════════

#[test]
fn weight_only_change_is_visible_through_resident_csr() {
    let mut g = SpacetimeGraph::ring(4, 0.5).unwrap();
    let arena = DeviceArena::new(DeviceId(0), 1 << 16);
    let mut csr = CsrTopology::from_graph(&g).unwrap();
    csr.upload_to_gpu(&arena).unwrap();

    g.set_edge_weight(0, 1, 0.9).unwrap();
    assert!(!csr.is_stale(&g.topology_signature()));
    assert!(!csr.is_current(&g));

    let with_csr = GraphSnapshot::from_graph(&g, Some(&csr), 1).unwrap();
    let fresh = GraphSnapshot::from_graph(&g, None, 1).unwrap();
    assert_eq!(with_csr, fresh);
    assert!((with_csr.total_weight() - 2.4).abs() < 1e-12);

    // node mass agrees with the snapshot's own weights
    let row0: f64 = with_csr.edge_weights()[..2].iter().sum();
    assert!((with_csr.node_mass()[0] - row0).abs() < 1e-12);

    // once the CSR picks up the new weights it is reused again
    csr.update_weights_from_graph(&g).unwrap();
    assert!(csr.is_current(&g));
    assert_eq!(GraphSnapshot::from_graph(&g, Some(&csr), 1).unwrap(), fresh);
}
