//! Cart validation and merge rule tests.

#![allow(clippy::unwrap_used)]

use butter_crumb_backend::services::cart::{
    AddPlan, CartError, plan_addition, plan_merge, validate_addition,
};
use butter_crumb_core::{CartItemId, Money, ProductId};
use uuid::Uuid;

use butter_crumb_integration_tests::{cart_item, product, user_cart};

#[test]
fn test_quantity_increment_violation_leaves_cart_unchanged() {
    // quantity_increment = 3, quantity = 4 -> rejected
    let mut croissants = product(1, 425, 30);
    croissants.minimum_quantity = 3;
    croissants.quantity_increment = 3;

    let cart = user_cart(vec![]);
    let result = plan_addition(&cart, &croissants, 4, None);

    assert!(matches!(
        result,
        Err(CartError::QuantityNotInIncrements { increment: 3 })
    ));
    assert!(cart.is_empty());
}

#[test]
fn test_minimum_quantity_enforced() {
    let mut cookies = product(2, 300, 60);
    cookies.minimum_quantity = 6;
    cookies.quantity_increment = 6;

    assert!(matches!(
        validate_addition(&cookies, 3),
        Err(CartError::BelowMinimumQuantity { minimum: 6 })
    ));
    assert!(validate_addition(&cookies, 6).is_ok());
    assert!(validate_addition(&cookies, 12).is_ok());
}

#[test]
fn test_out_of_stock_and_backorder() {
    let mut cake = product(3, 4800, 0);
    assert!(matches!(
        validate_addition(&cake, 1),
        Err(CartError::OutOfStock)
    ));

    cake.allow_backorder = true;
    assert!(validate_addition(&cake, 1).is_ok());
}

#[test]
fn test_identical_instructions_merge_into_one_line() {
    let sourdough = product(1, 850, 20);
    let cart = user_cart(vec![cart_item(1, 1, 2, 850, Some("sliced"))]);

    let plan = plan_addition(&cart, &sourdough, 1, Some("sliced".to_owned())).unwrap();
    assert_eq!(
        plan,
        AddPlan::Merge {
            item_id: CartItemId::new(1),
            new_quantity: 3,
        }
    );
}

#[test]
fn test_differing_instructions_make_independent_lines() {
    let sourdough = product(1, 850, 20);
    let cart = user_cart(vec![cart_item(1, 1, 2, 850, Some("sliced"))]);

    let plan = plan_addition(&cart, &sourdough, 1, None).unwrap();
    assert!(matches!(plan, AddPlan::Insert(_)));

    let plan = plan_addition(&cart, &sourdough, 1, Some("whole".to_owned())).unwrap();
    match plan {
        AddPlan::Insert(line) => {
            assert_eq!(line.product_id, ProductId::new(1));
            assert_eq!(line.special_instructions.as_deref(), Some("whole"));
        }
        AddPlan::Merge { .. } => panic!("must not merge across differing instructions"),
    }
}

#[test]
fn test_login_merge_folds_guest_lines() {
    let user = user_cart(vec![
        cart_item(1, 1, 1, 850, None),
        cart_item(2, 2, 6, 300, None),
    ]);

    let mut guest = user_cart(vec![
        cart_item(10, 1, 2, 800, None),                 // same product, same (no) instructions
        cart_item(11, 2, 6, 300, Some("extra crispy")), // same product, new instructions
        cart_item(12, 3, 1, 4800, None),                // product the user doesn't have
    ]);
    guest.user_id = None;
    guest.session_id = Some(Uuid::new_v4());

    let plan = plan_merge(&user, &guest);

    // Bump keeps the user line and its price snapshot
    assert_eq!(plan.bumps, vec![(CartItemId::new(1), 3)]);

    // Two guest lines move over with their own snapshots
    assert_eq!(plan.inserts.len(), 2);
    assert_eq!(plan.inserts[0].product_id, ProductId::new(2));
    assert_eq!(
        plan.inserts[0].special_instructions.as_deref(),
        Some("extra crispy")
    );
    assert_eq!(plan.inserts[1].product_id, ProductId::new(3));
    assert_eq!(plan.inserts[1].unit_price, Money::from_cents(4800));
}

#[test]
fn test_login_merge_respects_existing_delivery_prefs() {
    let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

    let mut guest = user_cart(vec![]);
    guest.user_id = None;
    guest.session_id = Some(Uuid::new_v4());
    guest.requested_delivery_date = Some(date);
    guest.delivery_time_slot = Some("morning".to_owned());

    // Unset user prefs adopt the guest's
    let plan = plan_merge(&user_cart(vec![]), &guest);
    assert_eq!(plan.requested_delivery_date, Some(date));
    assert_eq!(plan.delivery_time_slot.as_deref(), Some("morning"));

    // Set user prefs win
    let mut opinionated = user_cart(vec![]);
    opinionated.requested_delivery_date =
        Some(chrono::NaiveDate::from_ymd_opt(2026, 3, 20).unwrap());
    opinionated.delivery_time_slot = Some("evening".to_owned());
    let plan = plan_merge(&opinionated, &guest);
    assert!(plan.requested_delivery_date.is_none());
    assert!(plan.delivery_time_slot.is_none());
}

#[test]
fn test_cart_subtotal_uses_price_snapshots() {
    // Line prices differ from whatever the catalog says now
    let cart = user_cart(vec![
        cart_item(1, 1, 2, 500, None),
        cart_item(2, 2, 1, 300, None),
    ]);
    assert_eq!(cart.subtotal(), Money::from_cents(1300));
    assert_eq!(cart.item_count(), 3);
}
