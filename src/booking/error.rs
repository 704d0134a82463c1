//! Error types for order creation.

use thiserror::Error;

use super::InputValidationError;
use crate::boost::{AdjustmentError, StrategyProviderError};
use crate::idgen::IdGenerationError;
use crate::model::RoomKey;
use crate::store::{AvailabilityError, StoreError};

/// Top-level error returned by [`Booking::create_order`](super::Booking::create_order).
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid booking request: {0}")]
    InputValidation(#[from] InputValidationError),

    #[error("{0}")]
    Unavailable(#[from] AvailabilityError),

    #[error("cannot allocate identifier: {0}")]
    IdGeneration(#[from] IdGenerationError),

    /// The availability read succeeded but did not return a record for a
    /// requested day.
    #[error("availability read returned no record for {0}")]
    DataConsistency(RoomKey),

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    StrategyProvider(#[from] StrategyProviderError),

    #[error("price strategy '{strategy}' failed: {source}")]
    Adjustment {
        strategy: String,
        #[source]
        source: AdjustmentError,
    },

    #[error("booking cancelled before any change was made")]
    Cancelled,
}

impl BookingError {
    /// Whether the failure is ours rather than the client's.
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            BookingError::InputValidation(_) | BookingError::Unavailable(_)
        )
    }
}
