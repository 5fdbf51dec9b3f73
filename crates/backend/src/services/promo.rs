//! Promo code validation and redemption.

use chrono::Utc;
use sqlx::PgPool;

use butter_crumb_core::Money;

use crate::db::{PromoCodeRepository, RepositoryError};
use crate::models::promo::PromoCode;

/// Errors from promo code operations.
#[derive(Debug, thiserror::Error)]
pub enum PromoError {
    /// No promo code with this code string.
    #[error("promo code {0:?} not found")]
    UnknownCode(String),

    /// The code exists but cannot currently be redeemed.
    #[error("promo code is not currently valid")]
    NotValid,

    /// The order total is below the code's minimum.
    #[error("order total below the minimum of {minimum} for this code")]
    BelowMinimumOrder { minimum: Money },

    /// Underlying storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Service for validating and redeeming promo codes.
pub struct PromoService<'a> {
    pool: &'a PgPool,
}

impl<'a> PromoService<'a> {
    /// Create a promo service over a connection pool.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Validate a code against an order total and compute its discount.
    ///
    /// Does not redeem the code; call [`PromoService::redeem`] once the
    /// order is placed.
    ///
    /// # Errors
    ///
    /// `UnknownCode`, `NotValid`, or `BelowMinimumOrder`; storage errors.
    pub async fn validate(
        &self,
        code: &str,
        order_total: Money,
    ) -> Result<(PromoCode, Money), PromoError> {
        let promo = PromoCodeRepository::new(self.pool)
            .get_by_code(code)
            .await?
            .ok_or_else(|| PromoError::UnknownCode(code.to_owned()))?;

        let now = Utc::now();
        if !promo.is_valid(now) {
            return Err(PromoError::NotValid);
        }
        if let Some(minimum) = promo.minimum_order_value
            && order_total < minimum
        {
            return Err(PromoError::BelowMinimumOrder { minimum });
        }

        let discount = promo.discount_for(order_total, now);
        Ok((promo, discount))
    }

    /// Redeem a code, incrementing its usage count.
    ///
    /// The increment is conditional on the usage limit, so two concurrent
    /// redemptions of the last slot cannot both succeed. Returns whether
    /// the redemption was recorded.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn redeem(&self, promo: &PromoCode) -> Result<bool, PromoError> {
        let redeemed = PromoCodeRepository::new(self.pool)
            .increment_usage(promo.id)
            .await?;
        if redeemed {
            tracing::info!(code = %promo.code, "promo code redeemed");
        } else {
            tracing::warn!(code = %promo.code, "promo code usage limit hit during redemption");
        }
        Ok(redeemed)
    }
}
