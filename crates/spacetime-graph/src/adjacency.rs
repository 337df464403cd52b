// ─────────────────────────────────────────────
// SymmetricAdjacency
// ─────────────────────────────────────────────

/// Weighted undirected adjacency stored as one sorted row per node.
///
/// Each undirected edge `(a, b)` lives twice: `(b, w)` in row `a` and
/// `(a, w)` in row `b`. Rows are kept sorted by neighbour index, which is the
/// same order the CSR uses, so building a CSR from this index is a straight
/// concatenation.
///
/// Out-of-range indices are treated as absent (queries return `None`/`false`);
/// range and self-loop validation happens one level up in
/// [`crate::SpacetimeGraph`].
#[derive(Debug, Clone, Default)]
pub struct SymmetricAdjacency {
    rows:       Vec<Vec<(u32, f64)>>,
    edge_count: usize,
}

impl SymmetricAdjacency {
    pub fn new(node_count: usize) -> Self {
        Self {
            rows:       vec![Vec::new(); node_count],
            edge_count: 0,
        }
    }

    // ── Mutations ──────────────────────────────────────

    /// Insert `(a, b)` with weight `w` in both rows.
    ///
    /// Returns `false` (and changes nothing) if the edge already exists.
    pub fn insert(&mut self, a: u32, b: u32, w: f64) -> bool {
        if a == b || !self.in_range(a) || !self.in_range(b) {
            return false;
        }
        let row_a = &mut self.rows[a as usize];
        let pos_a = match row_a.binary_search_by_key(&b, |&(c, _)| c) {
            Ok(_) => return false,
            Err(pos) => pos,
        };
        row_a.insert(pos_a, (b, w));

        let row_b = &mut self.rows[b as usize];
        let pos_b = row_b
            .binary_search_by_key(&a, |&(c, _)| c)
            .unwrap_or_else(|pos| pos);
        row_b.insert(pos_b, (a, w));

        self.edge_count += 1;
        true
    }

    /// Remove `(a, b)` from both rows, returning the old weight.
    pub fn remove(&mut self, a: u32, b: u32) -> Option<f64> {
        if !self.in_range(a) || !self.in_range(b) {
            return None;
        }
        let row_a = &mut self.rows[a as usize];
        let pos_a = row_a.binary_search_by_key(&b, |&(c, _)| c).ok()?;
        let (_, w) = row_a.remove(pos_a);

        let row_b = &mut self.rows[b as usize];
        if let Ok(pos_b) = row_b.binary_search_by_key(&a, |&(c, _)| c) {
            row_b.remove(pos_b);
        }

        self.edge_count -= 1;
        Some(w)
    }

    /// Overwrite the weight of an existing edge in both rows.
    pub fn set_weight(&mut self, a: u32, b: u32, w: f64) -> bool {
        if !self.in_range(a) || !self.in_range(b) {
            return false;
        }
        let Ok(pos_a) = self.rows[a as usize].binary_search_by_key(&b, |&(c, _)| c) else {
            return false;
        };
        self.rows[a as usize][pos_a].1 = w;
        if let Ok(pos_b) = self.rows[b as usize].binary_search_by_key(&a, |&(c, _)| c) {
            self.rows[b as usize][pos_b].1 = w;
        }
        true
    }

    // ── Queries ────────────────────────────────────────

    pub fn weight(&self, a: u32, b: u32) -> Option<f64> {
        let row = self.rows.get(a as usize)?;
        row.binary_search_by_key(&b, |&(c, _)| c)
            .ok()
            .map(|pos| row[pos].1)
    }

    pub fn contains(&self, a: u32, b: u32) -> bool {
        self.weight(a, b).is_some()
    }

    /// Sorted `(neighbour, weight)` entries of row `i` (empty if out of range).
    pub fn row(&self, i: u32) -> &[(u32, f64)] {
        self.rows.get(i as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn degree(&self, i: u32) -> usize {
        self.row(i).len()
    }

    pub fn node_count(&self) -> usize {
        self.rows.len()
    }

    /// Undirected edge count (each pair counted once).
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Directed entry count, i.e. the CSR `nnz` this adjacency maps to.
    pub fn directed_entry_count(&self) -> usize {
        self.edge_count * 2
    }

    #[inline]
    fn in_range(&self, i: u32) -> bool {
        (i as usize) < self.rows.len()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_symmetric_and_sorted() {
        let mut adj = SymmetricAdjacency::new(5);
        assert!(adj.insert(0, 3, 0.5));
        assert!(adj.insert(0, 1, 0.2));
        assert!(adj.insert(4, 0, 0.9));

        assert_eq!(adj.row(0), &[(1, 0.2), (3, 0.5), (4, 0.9)]);
        assert_eq!(adj.row(4), &[(0, 0.9)]);
        assert_eq!(adj.edge_count(), 3);
        assert_eq!(adj.directed_entry_count(), 6);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut adj = SymmetricAdjacency::new(3);
        assert!(adj.insert(1, 2, 0.5));
        assert!(!adj.insert(2, 1, 0.7));
        assert_eq!(adj.weight(1, 2), Some(0.5));
        assert_eq!(adj.edge_count(), 1);
    }

    #[test]
    fn self_loop_and_out_of_range_are_ignored() {
        let mut adj = SymmetricAdjacency::new(3);
        assert!(!adj.insert(1, 1, 0.5));
        assert!(!adj.insert(1, 7, 0.5));
        assert_eq!(adj.edge_count(), 0);
        assert!(adj.row(9).is_empty());
    }

    #[test]
    fn remove_cleans_both_rows() {
        let mut adj = SymmetricAdjacency::new(3);
        adj.insert(0, 2, 0.4);
        assert_eq!(adj.remove(2, 0), Some(0.4));
        assert!(adj.row(0).is_empty());
        assert!(adj.row(2).is_empty());
        assert_eq!(adj.remove(0, 2), None);
        assert_eq!(adj.edge_count(), 0);
    }

    #[test]
    fn set_weight_updates_both_directions() {
        let mut adj = SymmetricAdjacency::new(3);
        adj.insert(0, 1, 0.4);
        assert!(adj.set_weight(1, 0, 0.75));
        assert_eq!(adj.weight(0, 1), Some(0.75));
        assert_eq!(adj.weight(1, 0), Some(0.75));
        assert!(!adj.set_weight(0, 2, 0.1));
    }
}
