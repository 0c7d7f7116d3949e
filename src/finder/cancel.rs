//! Cooperative cancellation shared between a requester and one traversal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::FinderError;

/// Clone-shared cancellation flag. Cancelling is sticky and never preempts:
/// the traversal observes it at its own check points.
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

    /// `Err(FinderError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), FinderError> {
        if self.is_cancelled() {
            Err(FinderError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_visible_to_clones() {
        let token = CancellationToken::new();
        let worker_side = token.clone();
        assert!(worker_side.check().is_ok());
        token.cancel();
        assert!(worker_side.is_cancelled());
        assert!(matches!(worker_side.check(), Err(FinderError::Cancelled)));
    }
}
