use thiserror::Error;

use spacetime_csr::CsrError;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot topology invalid: {0}")]
    Csr(#[from] CsrError),

    #[error("field '{field}' has {got} entries, expected {expected}")]
    FieldLength { field: &'static str, expected: usize, got: usize },

    #[error("total weight {0} is not finite")]
    NonFiniteWeight(f64),

    #[error("snapshot node count {snapshot} disagrees with its signature ({signature})")]
    SignatureMismatch { snapshot: usize, signature: u32 },
}
