//! Epoch-based cooperative cancellation.
//!
//! `cancel_all` bumps a shared epoch; every token issued before the bump
//! observes itself as cancelled at its next check. Tokens issued afterwards
//! are unaffected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::OrchestratorError;

#[derive(Debug, Clone, Default)]
pub struct CancelSource {
    epoch: Arc<AtomicU64>,
}

impl CancelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            epoch:  Arc::clone(&self.epoch),
            issued: self.epoch.load(Ordering::Acquire),
        }
    }

    /// Cancel every outstanding token.
    pub fn cancel_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    epoch:  Arc<AtomicU64>,
    issued: u64,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        CancelSource::new().token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.epoch.load(Ordering::Acquire) != self.issued
    }

    /// `Err(Cancelled)` once the token has been cancelled.
    #[inline]
    pub fn check(&self) -> Result<(), OrchestratorError> {
        if self.is_cancelled() {
            Err(OrchestratorError::Cancelled)
        } else {
            Ok(())
        }
    }
}
