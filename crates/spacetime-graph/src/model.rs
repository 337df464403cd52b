use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// NodeState
// ─────────────────────────────────────────────

/// Discrete excitable-medium state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeState {
    #[default]
    Rest,
    Excited,
    Refractory,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Rest       => write!(f, "rest"),
            NodeState::Excited    => write!(f, "excited"),
            NodeState::Refractory => write!(f, "refractory"),
        }
    }
}

// ─────────────────────────────────────────────
// EdgeRef
// ─────────────────────────────────────────────

/// One undirected edge as yielded by [`crate::SpacetimeGraph::edges`].
///
/// Always normalised so that `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeRef {
    pub a:      u32,
    pub b:      u32,
    pub weight: f64,
}

/// Normalise an unordered pair to `(min, max)`.
#[inline]
pub fn normalize_pair(a: u32, b: u32) -> (u32, u32) {
    if a <= b { (a, b) } else { (b, a) }
}

// ─────────────────────────────────────────────
// TopologySignature
// ─────────────────────────────────────────────

/// Staleness token for cached topology consumers.
///
/// `structure_hash` is the XOR of a 64-bit mix of every normalised edge pair,
/// so it is independent of insertion order and is maintained in O(1) per
/// mutation. Two graphs with the same node count and edge set hash equal;
/// `version` additionally distinguishes a remove-then-re-add sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TopologySignature {
    pub node_count:     u32,
    pub version:        u64,
    pub structure_hash: u64,
}

impl TopologySignature {
    /// `true` when both signatures describe the same edge set, regardless of
    /// how many mutations it took to get there.
    pub fn same_structure(&self, other: &Self) -> bool {
        self.node_count == other.node_count && self.structure_hash == other.structure_hash
    }

    /// Signature of an edge set given as undirected pairs, each listed once.
    pub fn from_pairs<I>(node_count: u32, version: u64, pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let structure_hash = pairs.into_iter().fold(0, |h, (a, b)| h ^ pair_mix(a, b));
        Self { node_count, version, structure_hash }
    }
}

/// splitmix64 finaliser over a normalised pair.
#[inline]
pub(crate) fn pair_mix(a: u32, b: u32) -> u64 {
    let (lo, hi) = normalize_pair(a, b);
    let mut z = ((hi as u64) << 32 | lo as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
