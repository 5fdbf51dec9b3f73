//! Promo code domain type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use butter_crumb_core::{DiscountType, Money, PromoCodeId};

/// A promotional discount code.
#[derive(Debug, Clone)]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    /// Percentage points for [`DiscountType::Percentage`], a money amount
    /// for [`DiscountType::FixedAmount`].
    pub discount_value: Decimal,
    pub minimum_order_value: Option<Money>,
    pub maximum_discount: Option<Money>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PromoCode {
    /// Whether the code can be redeemed at `now`.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if self.valid_from.is_some_and(|from| now < from) {
            return false;
        }
        if self.valid_until.is_some_and(|until| now > until) {
            return false;
        }
        if self
            .usage_limit
            .is_some_and(|limit| self.usage_count >= limit)
        {
            return false;
        }
        true
    }

    /// The discount this code grants against `order_total`.
    ///
    /// Zero when the code is not currently valid or the order is under the
    /// minimum. Percentage discounts are capped by `maximum_discount` when
    /// set, and every discount is capped at the order total.
    #[must_use]
    pub fn discount_for(&self, order_total: Money, now: DateTime<Utc>) -> Money {
        if !self.is_valid(now) {
            return Money::ZERO;
        }
        if self
            .minimum_order_value
            .is_some_and(|minimum| order_total < minimum)
        {
            return Money::ZERO;
        }

        let discount = match self.discount_type {
            DiscountType::Percentage => Money::new(
                order_total.amount() * self.discount_value / Decimal::from(100),
            ),
            DiscountType::FixedAmount => Money::new(self.discount_value),
        };

        let capped = match self.maximum_discount {
            Some(maximum) => discount.cap_at(maximum),
            None => discount,
        };
        capped.cap_at(order_total)
    }
}

/// Input for creating a promo code.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPromoCode {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub minimum_order_value: Option<Money>,
    pub maximum_discount: Option<Money>,
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Field mask for partially updating a promo code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromoCodeUpdate {
    pub description: Option<String>,
    pub discount_value: Option<Decimal>,
    pub minimum_order_value: Option<Money>,
    pub maximum_discount: Option<Money>,
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}
