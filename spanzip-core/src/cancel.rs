//! Cooperative cancellation.
//!
//! Parsing a large central directory can take a while on slow media. The
//! engine checks a [`CancelToken`] between archive-level steps (between
//! successive central-header records and between entries), never in the
//! middle of a fixed-size header read.

use crate::error::{Result, SpanZipError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared cancellation flag.
///
/// Cloning the token shares the flag; cancelling through any clone is seen
/// by all of them.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Return [`SpanZipError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SpanZipError::Cancelled)
        } else {
            Ok(())
        }
    }
}
