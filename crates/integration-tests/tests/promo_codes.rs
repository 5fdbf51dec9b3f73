//! Promo code validity and discount math.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use butter_crumb_backend::models::PromoCode;
use butter_crumb_core::{DiscountType, Money, PromoCodeId};

fn code(discount_type: DiscountType, value: i64) -> PromoCode {
    let now = Utc::now();
    PromoCode {
        id: PromoCodeId::new(1),
        code: "CRUMB10".to_owned(),
        description: None,
        discount_type,
        discount_value: match discount_type {
            DiscountType::Percentage => Decimal::from(value),
            DiscountType::FixedAmount => Decimal::new(value, 2),
        },
        minimum_order_value: None,
        maximum_discount: None,
        usage_limit: None,
        usage_count: 0,
        valid_from: None,
        valid_until: None,
        is_active: true,
        created_at: now,
        updated_at: None,
    }
}

#[test]
fn test_percentage_discount_math() {
    let promo = code(DiscountType::Percentage, 10);
    assert_eq!(
        promo.discount_for(Money::from_cents(5000), Utc::now()),
        Money::from_cents(500)
    );
    assert_eq!(
        promo.discount_for(Money::from_cents(1299), Utc::now()),
        Money::new(Decimal::new(1299, 3)) // $1.299, stored unrounded
    );
}

#[test]
fn test_fixed_discount_never_exceeds_order_total() {
    let promo = code(DiscountType::FixedAmount, 2000);
    assert_eq!(
        promo.discount_for(Money::from_cents(1200), Utc::now()),
        Money::from_cents(1200)
    );
    assert_eq!(
        promo.discount_for(Money::from_cents(5000), Utc::now()),
        Money::from_cents(2000)
    );
}

#[test]
fn test_maximum_discount_caps_percentage() {
    let mut promo = code(DiscountType::Percentage, 25);
    promo.maximum_discount = Some(Money::from_cents(750));

    assert_eq!(
        promo.discount_for(Money::from_cents(10_000), Utc::now()),
        Money::from_cents(750)
    );
}

#[test]
fn test_minimum_order_value_gates_discount() {
    let mut promo = code(DiscountType::Percentage, 10);
    promo.minimum_order_value = Some(Money::from_cents(3000));

    assert_eq!(
        promo.discount_for(Money::from_cents(2999), Utc::now()),
        Money::ZERO
    );
    assert_eq!(
        promo.discount_for(Money::from_cents(3000), Utc::now()),
        Money::from_cents(300)
    );
}

#[test]
fn test_window_and_usage_limit() {
    let now = Utc::now();

    let mut promo = code(DiscountType::Percentage, 10);
    promo.valid_from = Some(now + Duration::days(1));
    assert!(!promo.is_valid(now));

    promo.valid_from = Some(now - Duration::days(7));
    promo.valid_until = Some(now + Duration::days(7));
    assert!(promo.is_valid(now));

    promo.usage_limit = Some(100);
    promo.usage_count = 100;
    assert!(!promo.is_valid(now));
}

#[test]
fn test_inactive_code_grants_nothing() {
    let mut promo = code(DiscountType::FixedAmount, 500);
    promo.is_active = false;

    assert!(!promo.is_valid(Utc::now()));
    assert_eq!(
        promo.discount_for(Money::from_cents(5000), Utc::now()),
        Money::ZERO
    );
}
