//! Exclusive prefix scan over row degrees.
//!
//! Inputs up to [`BLOCK_SIZE`] elements are scanned as a single Kogge–Stone
//! block. Larger inputs use the hierarchical scheme: every block is scanned
//! independently, the block totals are scanned recursively, then each block
//! adds its offset. Blocks run on the rayon pool.

use rayon::prelude::*;

/// Elements per scan block (one thread block on a real device).
pub const BLOCK_SIZE: usize = 1024;

/// Exclusive scan of `input`, with the grand total appended.
///
/// The result has `input.len() + 1` entries: `out[0] = 0`,
/// `out[i] = Σ input[..i]`, `out[len] = Σ input`. Callers must ensure the
/// total fits in `u32`.
pub fn exclusive_scan(input: &[u32]) -> Vec<u32> {
    let inclusive = if input.len() <= BLOCK_SIZE {
        let mut block = input.to_vec();
        kogge_stone_inclusive(&mut block);
        block
    } else {
        hierarchical_inclusive(input)
    };

    let mut out = Vec::with_capacity(input.len() + 1);
    out.push(0);
    out.extend(inclusive);
    out
}

/// Plain sequential exclusive scan; reference for tests and benchmarks.
pub fn exclusive_scan_sequential(input: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(input.len() + 1);
    let mut acc = 0u32;
    out.push(acc);
    for &x in input {
        acc += x;
        out.push(acc);
    }
    out
}

/// In-place inclusive Kogge–Stone scan of one block.
///
/// Each doubling step reads the previous step's values only, matching the
/// lockstep semantics of a shared-memory block scan.
fn kogge_stone_inclusive(block: &mut [u32]) {
    let mut prev = block.to_vec();
    let mut offset = 1;
    while offset < block.len() {
        block
            .par_iter_mut()
            .enumerate()
            .skip(offset)
            .for_each(|(i, v)| *v = prev[i] + prev[i - offset]);
        prev.copy_from_slice(block);
        offset <<= 1;
    }
}

fn hierarchical_inclusive(input: &[u32]) -> Vec<u32> {
    let mut data = input.to_vec();

    // 1. independent block scans
    data.par_chunks_mut(BLOCK_SIZE).for_each(kogge_stone_inclusive);

    // 2. scan of block totals (recursive for very large inputs)
    let block_sums: Vec<u32> = data
        .chunks(BLOCK_SIZE)
        .map(|chunk| chunk.last().copied().unwrap_or(0))
        .collect();
    let block_offsets = exclusive_scan(&block_sums);

    // 3. add block offsets
    data.par_chunks_mut(BLOCK_SIZE)
        .zip(block_offsets.par_iter())
        .for_each(|(chunk, &offset)| {
            if offset != 0 {
                chunk.iter_mut().for_each(|v| *v += offset);
            }
        });

    data
}
