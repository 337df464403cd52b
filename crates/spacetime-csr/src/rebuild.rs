//! Parallel CSR rebuild: degree count → prefix scan → atomic scatter →
//! per-row sort → verification.
//!
//! The pipeline never materialises a dense matrix and never deduplicates
//! between the deletion and addition sets; resolving conflicting proposals
//! happens before a rebuild is requested.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::csr::{split_rows, CsrTopology};
use crate::error::CsrError;
use crate::scan::exclusive_scan;

// ─────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────

/// Undirected edge to insert; scattered into both endpoint rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewEdge {
    pub a:      u32,
    pub b:      u32,
    pub weight: f64,
}

impl NewEdge {
    pub fn new(a: u32, b: u32, weight: f64) -> Self {
        Self { a, b, weight }
    }
}

/// Per-entry deletion flags over a CSR's directed entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionMask {
    flags: Vec<bool>,
}

impl DeletionMask {
    /// Mask sized for `csr` with nothing marked.
    pub fn for_csr(csr: &CsrTopology) -> Self {
        Self { flags: vec![false; csr.nnz()] }
    }

    /// Mark both directed entries of `(a, b)`. Returns `false` if the edge is
    /// not present in `csr`.
    pub fn mark_pair(&mut self, csr: &CsrTopology, a: u32, b: u32) -> bool {
        match (csr.find_entry(a, b), csr.find_entry(b, a)) {
            (Some(ab), Some(ba)) => {
                self.flags[ab] = true;
                self.flags[ba] = true;
                true
            }
            _ => false,
        }
    }

    /// Mark a single directed entry. Returns `false` if `entry` is out of
    /// range.
    pub fn mark_entry(&mut self, entry: usize) -> bool {
        match self.flags.get_mut(entry) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    pub fn is_marked(&self, entry: usize) -> bool {
        self.flags.get(entry).copied().unwrap_or(false)
    }

    /// Number of marked directed entries.
    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// What to change relative to the previous CSR.
#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildRequest<'a> {
    pub deletions:    Option<&'a DeletionMask>,
    /// Entries with weight strictly below the floor are dropped.
    pub weight_floor: Option<f64>,
    pub additions:    &'a [NewEdge],
}

#[derive(Debug, Clone, Copy)]
pub struct RebuildOptions {
    /// Run the verification pass.
    pub verify: bool,
    /// Reject the rebuild when verification fails; otherwise the report is
    /// returned alongside the new CSR.
    pub enforce: bool,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self { verify: true, enforce: true }
    }
}

// ─────────────────────────────────────────────
// Report
// ─────────────────────────────────────────────

/// Fail-soft diagnostic produced by the verification pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub node_count:        usize,
    pub old_nnz:           usize,
    pub new_nnz:           usize,
    pub deleted_entries:   usize,
    pub added_edges:       usize,
    pub verified:          bool,
    /// `row_offsets[N]` equals the number of entries actually scattered.
    pub row_sum_matches:   bool,
    pub unsorted_rows:     usize,
    pub self_loops:        usize,
    pub duplicate_entries: usize,
    pub elapsed_us:        u64,
}

impl RebuildReport {
    pub fn is_valid(&self) -> bool {
        !self.verified
            || (self.row_sum_matches
                && self.unsorted_rows == 0
                && self.self_loops == 0
                && self.duplicate_entries == 0)
    }
}

impl std::fmt::Display for RebuildReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "nnz {} -> {} (-{} +{}), row_sum_ok={}, unsorted={}, self_loops={}, duplicates={}",
            self.old_nnz,
            self.new_nnz,
            self.deleted_entries,
            self.added_edges * 2,
            self.row_sum_matches,
            self.unsorted_rows,
            self.self_loops,
            self.duplicate_entries,
        )
    }
}

// ─────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────

/// Produce a new CSR from `prev` with `request` applied.
///
/// The result carries `prev`'s signature, weight epoch and node potential and
/// is host-only;
/// the caller stamps the new signature and re-uploads.
pub fn rebuild(
    prev: &CsrTopology,
    request: &RebuildRequest<'_>,
    options: &RebuildOptions,
) -> Result<(CsrTopology, RebuildReport), CsrError> {
    let started = Instant::now();
    let n = prev.node_count();
    let offsets = prev.row_offsets();
    let cols = prev.col_indices();
    let weights = prev.edge_weights();

    if let Some(mask) = request.deletions {
        if mask.len() != prev.nnz() {
            return Err(CsrError::MaskLength { expected: prev.nnz(), got: mask.len() });
        }
    }
    if let Some(bad) = request
        .additions
        .iter()
        .flat_map(|e| [e.a, e.b])
        .find(|&v| v as usize >= n)
    {
        return Err(CsrError::NodeOutOfRange { node: bad, node_count: n });
    }

    let keep = |e: usize| {
        !request.deletions.is_some_and(|m| m.is_marked(e))
            && request.weight_floor.map_or(true, |floor| weights[e] >= floor)
    };

    // 1. degrees
    let degrees: Vec<AtomicU32> = (0..n)
        .into_par_iter()
        .map(|i| {
            let kept = (offsets[i] as usize..offsets[i + 1] as usize)
                .filter(|&e| keep(e))
                .count();
            AtomicU32::new(kept as u32)
        })
        .collect();
    let survivors: usize = degrees.iter().map(|d| d.load(Ordering::Relaxed) as usize).sum();
    request.additions.par_iter().for_each(|e| {
        degrees[e.a as usize].fetch_add(1, Ordering::Relaxed);
        degrees[e.b as usize].fetch_add(1, Ordering::Relaxed);
    });
    let degrees: Vec<u32> = degrees.into_iter().map(AtomicU32::into_inner).collect();

    let total: u64 = degrees.iter().map(|&d| d as u64).sum();
    if total > u32::MAX as u64 {
        return Err(CsrError::TooManyEntries(total));
    }

    // 2. prefix scan
    let new_offsets = exclusive_scan(&degrees);
    let nnz = new_offsets[n] as usize;

    // 3. scatter through per-row cursors
    let cursors: Vec<AtomicU32> = new_offsets[..n].iter().map(|&o| AtomicU32::new(o)).collect();
    let new_cols: Vec<AtomicU32> = (0..nnz).map(|_| AtomicU32::new(0)).collect();
    let new_weights: Vec<AtomicU64> = (0..nnz).map(|_| AtomicU64::new(0)).collect();

    let put = |row: u32, col: u32, w: f64| {
        let pos = cursors[row as usize].fetch_add(1, Ordering::Relaxed) as usize;
        new_cols[pos].store(col, Ordering::Relaxed);
        new_weights[pos].store(w.to_bits(), Ordering::Relaxed);
    };
    (0..n).into_par_iter().for_each(|i| {
        for e in offsets[i] as usize..offsets[i + 1] as usize {
            if keep(e) {
                put(i as u32, cols[e], weights[e]);
            }
        }
    });
    request.additions.par_iter().for_each(|e| {
        put(e.a, e.b, e.weight);
        put(e.b, e.a, e.weight);
    });

    let scattered: u64 = cursors
        .iter()
        .zip(&new_offsets[..n])
        .map(|(c, &start)| (c.load(Ordering::Relaxed) - start) as u64)
        .sum();
    let mut new_cols: Vec<u32> = new_cols.into_iter().map(AtomicU32::into_inner).collect();
    let mut new_weights: Vec<f64> = new_weights
        .into_iter()
        .map(|w| f64::from_bits(w.into_inner()))
        .collect();

    // 4. per-row insertion sort
    split_rows(&new_offsets, &mut new_cols)
        .into_par_iter()
        .zip(split_rows(&new_offsets, &mut new_weights))
        .for_each(|(c, w)| insertion_sort_row(c, w));

    // 5. verification
    let mut report = RebuildReport {
        node_count:      n,
        old_nnz:         prev.nnz(),
        new_nnz:         nnz,
        deleted_entries: prev.nnz() - survivors,
        added_edges:     request.additions.len(),
        ..Default::default()
    };
    if options.verify {
        verify(&new_offsets, &new_cols, scattered, &mut report);
    }
    report.elapsed_us = started.elapsed().as_micros() as u64;

    if !report.is_valid() {
        error!(%report, "CSR rebuild verification failed");
        if options.enforce {
            return Err(CsrError::VerificationFailed(Box::new(report)));
        }
    } else {
        debug!(%report, elapsed_us = report.elapsed_us, "CSR rebuilt");
    }

    let csr = CsrTopology::from_parts_unchecked(
        n,
        new_offsets,
        new_cols,
        new_weights,
        prev.node_potential().to_vec(),
        prev.signature(),
        prev.weight_epoch(),
    );
    Ok((csr, report))
}

/// Sort one row by column, carrying weights. Rows are short, so insertion
/// sort beats a general sort here; ties order by weight for determinism.
fn insertion_sort_row(cols: &mut [u32], weights: &mut [f64]) {
    for i in 1..cols.len() {
        let (c, w) = (cols[i], weights[i]);
        let mut j = i;
        while j > 0 && (cols[j - 1], weights[j - 1]) > (c, w) {
            cols[j] = cols[j - 1];
            weights[j] = weights[j - 1];
            j -= 1;
        }
        cols[j] = c;
        weights[j] = w;
    }
}

fn verify(offsets: &[u32], cols: &[u32], scattered: u64, report: &mut RebuildReport) {
    let n = offsets.len() - 1;
    let (unsorted, self_loops, duplicates) = (0..n)
        .into_par_iter()
        .map(|i| {
            let row = &cols[offsets[i] as usize..offsets[i + 1] as usize];
            let unsorted = row.windows(2).any(|w| w[0] > w[1]) as usize;
            let loops = row.iter().filter(|&&c| c as usize == i).count();
            let dups = row.windows(2).filter(|w| w[0] == w[1]).count();
            (unsorted, loops, dups)
        })
        .reduce(|| (0, 0, 0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2));

    report.verified = true;
    report.row_sum_matches = offsets[n] as u64 == scattered;
    report.unsorted_rows = unsorted;
    report.self_loops = self_loops;
    report.duplicate_entries = duplicates;
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetime_graph::SpacetimeGraph;

    fn ring_csr(n: usize) -> CsrTopology {
        CsrTopology::from_graph(&SpacetimeGraph::ring(n, 0.5).unwrap()).unwrap()
    }

    #[test]
    fn insertion_sort_carries_weights() {
        let mut c = [5, 1, 3];
        let mut w = [0.5, 0.1, 0.3];
        insertion_sort_row(&mut c, &mut w);
        assert_eq!(c, [1, 3, 5]);
        assert_eq!(w, [0.1, 0.3, 0.5]);
    }

    #[test]
    fn mark_entry_ignores_out_of_range() {
        let csr = ring_csr(4);
        let mut mask = DeletionMask::for_csr(&csr);
        assert_eq!(mask.len(), 8);

        assert!(mask.mark_entry(7));
        assert!(mask.is_marked(7));
        assert!(!mask.mark_entry(8));
        assert!(!mask.mark_entry(usize::MAX));
        assert!(!mask.is_marked(8));
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn add_and_delete_matches_fresh_build() {
        let prev = ring_csr(10);
        let mut mask = DeletionMask::for_csr(&prev);
        assert!(mask.mark_pair(&prev, 3, 4));
        assert!(!mask.mark_pair(&prev, 0, 5));
        assert_eq!(mask.count(), 2);

        let additions = [NewEdge::new(0, 5, 0.8), NewEdge::new(2, 7, 0.4)];
        let request = RebuildRequest { deletions: Some(&mask), additions: &additions, ..Default::default() };
        let (csr, report) = rebuild(&prev, &request, &RebuildOptions::default()).unwrap();

        let mut graph = SpacetimeGraph::ring(10, 0.5).unwrap();
        graph.remove_edge(3, 4).unwrap();
        graph.add_edge(0, 5, 0.8).unwrap();
        graph.add_edge(2, 7, 0.4).unwrap();
        let fresh = CsrTopology::from_graph(&graph).unwrap();

        assert!(report.is_valid());
        assert_eq!(report.new_nnz, 20 - 2 + 4);
        assert_eq!(report.deleted_entries, 2);
        assert_eq!(csr.row_offsets(), fresh.row_offsets());
        assert_eq!(csr.col_indices(), fresh.col_indices());
        assert_eq!(csr.edge_weights(), fresh.edge_weights());
        assert!(csr.is_symmetric());
    }

    #[test]
    fn weight_floor_drops_light_entries() {
        let graph = SpacetimeGraph::from_edges(4, [(0, 1, 0.05), (1, 2, 0.5), (2, 3, 0.09)]).unwrap();
        let prev = CsrTopology::from_graph(&graph).unwrap();
        let request = RebuildRequest { weight_floor: Some(0.1), ..Default::default() };
        let (csr, report) = rebuild(&prev, &request, &RebuildOptions::default()).unwrap();
        assert_eq!(csr.edge_count(), 1);
        assert!(csr.has_edge(2, 1));
        assert_eq!(report.deleted_entries, 4);
    }

    #[test]
    fn empty_request_is_identity() {
        let prev = ring_csr(7);
        let (csr, _) = rebuild(&prev, &RebuildRequest::default(), &RebuildOptions::default()).unwrap();
        assert_eq!(csr.col_indices(), prev.col_indices());
        assert_eq!(csr.signature(), prev.signature());
    }

    #[test]
    fn duplicates_are_reported_not_removed() {
        let prev = ring_csr(5);
        let additions = [NewEdge::new(0, 1, 0.9)];
        let request = RebuildRequest { additions: &additions, ..Default::default() };

        let soft = RebuildOptions { verify: true, enforce: false };
        let (csr, report) = rebuild(&prev, &request, &soft).unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.duplicate_entries, 2);
        assert_eq!(csr.degree(0), 3);

        let err = rebuild(&prev, &request, &RebuildOptions::default()).unwrap_err();
        assert!(matches!(err, CsrError::VerificationFailed(r) if r.duplicate_entries == 2));
    }

    #[test]
    fn self_loop_addition_is_reported() {
        let prev = ring_csr(5);
        let additions = [NewEdge::new(2, 2, 0.9)];
        let request = RebuildRequest { additions: &additions, ..Default::default() };
        let err = rebuild(&prev, &request, &RebuildOptions::default()).unwrap_err();
        assert!(matches!(err, CsrError::VerificationFailed(r) if r.self_loops == 2));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let prev = ring_csr(5);
        let additions = [NewEdge::new(0, 9, 0.1)];
        let request = RebuildRequest { additions: &additions, ..Default::default() };
        assert!(matches!(
            rebuild(&prev, &request, &RebuildOptions::default()),
            Err(CsrError::NodeOutOfRange { node: 9, node_count: 5 })
        ));

        let other = ring_csr(6);
        let mask = DeletionMask::for_csr(&other);
        let request = RebuildRequest { deletions: Some(&mask), ..Default::default() };
        assert!(matches!(
            rebuild(&prev, &request, &RebuildOptions::default()),
            Err(CsrError::MaskLength { expected: 10, got: 12 })
        ));
    }
}
