//! # spacetime-csr
//!
//! Compressed-sparse-row topology store and its rebuild pipeline.
//!
//! ## Layout
//!
//! - `row_offsets[N + 1]`: non-decreasing, `row_offsets[N] == nnz`
//! - `col_indices[nnz]`: strictly increasing within each row, no self-loops
//! - `edge_weights[nnz]`: parallel to `col_indices`
//!
//! Every undirected edge appears in both endpoint rows.
//!
//! ## Rebuild
//!
//! [`rebuild`] turns a previous CSR plus a deletion mask / weight floor and a
//! list of [`NewEdge`]s into a fresh CSR through degree counting, an
//! exclusive [`scan`], an atomic per-row scatter and a per-row insertion
//! sort, followed by a fail-soft [`RebuildReport`].

pub mod csr;
pub mod dense;
pub mod error;
pub mod rebuild;
pub mod scan;

pub use csr::{CsrArrays, CsrTopology};
pub use dense::DenseMatrix;
pub use error::CsrError;
pub use rebuild::{rebuild, DeletionMask, NewEdge, RebuildOptions, RebuildReport, RebuildRequest};
pub use scan::{exclusive_scan, BLOCK_SIZE};
