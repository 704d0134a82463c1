//! Price-adjustment strategies applied to an order before it is persisted.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::Order;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdjustmentError {
    #[error("promo code {code} expired at {valid_through}")]
    PromoCodeExpired {
        code: String,
        valid_through: DateTime<Utc>,
    },
}

/// The collaborator could not produce its strategies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot load price strategies: {0}")]
pub struct StrategyProviderError(pub String);

/// Percentage discount on every place of the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoCode {
    pub code: String,
    pub discount_percent: u8,
    pub valid_through: DateTime<Utc>,
}

/// Fixed discount for returning customers.
///
/// Customer loyalty levels are not tracked yet, so applying it leaves the
/// order unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoyaltyDiscount {
    pub customer_email: String,
    pub amount: crate::Amount,
    pub valid_through: DateTime<Utc>,
}

/// A single pricing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceAdjustment {
    PromoCode(PromoCode),
    Loyalty(LoyaltyDiscount),
}

impl PriceAdjustment {
    /// Adjust the order in place. Expiry is judged against the order's
    /// creation time.
    pub fn apply(&self, order: &mut Order) -> Result<(), AdjustmentError> {
        match self {
            PriceAdjustment::PromoCode(promo) => {
                if order.created_at > promo.valid_through {
                    return Err(AdjustmentError::PromoCodeExpired {
                        code: promo.code.clone(),
                        valid_through: promo.valid_through,
                    });
                }
                for place in &mut order.places {
                    place.price = place.price.discounted(promo.discount_percent);
                }
                order.reprice();
                Ok(())
            }
            PriceAdjustment::Loyalty(_) => Ok(()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PriceAdjustment::PromoCode(promo) => &promo.code,
            PriceAdjustment::Loyalty(_) => "loyalty",
        }
    }
}

/// Supplies the strategies for one booking request, in application order.
pub trait StrategyProvider: Send + Sync {
    fn strategies(&self) -> Result<Vec<PriceAdjustment>, StrategyProviderError>;
}

/// A fixed list of strategies.
#[derive(Debug, Clone, Default)]
pub struct StaticStrategies(pub Vec<PriceAdjustment>);

impl StrategyProvider for StaticStrategies {
    fn strategies(&self) -> Result<Vec<PriceAdjustment>, StrategyProviderError> {
        Ok(self.0.clone())
    }
}
