//! Identifier allocation for orders and events.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdGenerationError {
    #[error("identifier space exhausted")]
    Exhausted,
}

/// Source of unique, strictly increasing identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<u64, IdGenerationError>;
}

/// Process-local counter starting at 1.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    last: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after `last`, so the next identifier is `last + 1`.
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> Result<u64, IdGenerationError> {
        self.last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                last.checked_add(1)
            })
            .map(|previous| previous + 1)
            .map_err(|_| IdGenerationError::Exhausted)
    }
}
