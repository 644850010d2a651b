// src/pipeline/cancellation.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::MatchError;
use crate::models::JobState;

/// Cooperative cancellation flag, checked by the orchestrator between stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with `Cancelled` if cancellation was requested before `stage`.
    pub fn check(&self, stage: JobState) -> Result<(), MatchError> {
        if self.is_cancelled() {
            Err(MatchError::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}
