//! Monetary amounts backed by decimal arithmetic.
//!
//! The store operates in a single currency, so [`Money`] wraps a bare
//! [`Decimal`] rather than carrying a currency code. Amounts map to
//! `NUMERIC(10, 2)` columns in Postgres.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in the store currency's standard unit (dollars, not cents).
///
/// Never use floating point for money; all arithmetic goes through
/// [`rust_decimal::Decimal`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero in the store currency.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a monetary amount from a raw decimal.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a monetary amount from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by an item quantity.
    #[must_use]
    pub fn times(&self, quantity: i32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Clamp a computed amount so it never exceeds `cap`.
    #[must_use]
    pub fn cap_at(self, cap: Self) -> Self {
        if self.0 > cap.0 { cap } else { self }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i32> for Money {
    type Output = Self;

    fn mul(self, quantity: i32) -> Self {
        self.times(quantity)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<'_, sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<'_, sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        assert_eq!(Money::from_cents(500).to_string(), "$5.00");
        assert_eq!(Money::from_cents(1), Money::new(Decimal::new(1, 2)));
    }

    #[test]
    fn test_line_total_arithmetic() {
        let unit = Money::from_cents(500);
        assert_eq!(unit * 2, Money::from_cents(1000));
        assert_eq!(unit.times(3), Money::from_cents(1500));
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_cents(1000), Money::from_cents(300)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(1300));
    }

    #[test]
    fn test_cap_at() {
        let discount = Money::from_cents(2000);
        assert_eq!(discount.cap_at(Money::from_cents(1500)), Money::from_cents(1500));
        assert_eq!(discount.cap_at(Money::from_cents(2500)), Money::from_cents(2000));
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Money::from_cents(1299)).expect("serialize");
        assert_eq!(json, "\"12.99\"");
    }
}
