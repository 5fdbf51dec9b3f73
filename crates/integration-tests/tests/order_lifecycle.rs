//! End-to-end order lifecycle tests against the in-memory store.
//!
//! These verify the inventory interaction contract: stock is decremented
//! exactly once at order creation and incremented exactly once if and only
//! if the order is cancelled.

#![allow(clippy::unwrap_used)]

use chrono::Utc;

use butter_crumb_backend::models::{Address, AddressType};
use butter_crumb_backend::services::orders::{OrderEngine, OrderError};
use butter_crumb_core::{AddressId, Money, OrderStatus, ProductId, UserId};

use butter_crumb_integration_tests::{
    InMemoryStore, cart_item, checkout_request, product, user_cart,
};

#[tokio::test]
async fn test_checkout_scenario_totals_and_stock() {
    // cart [ {A, qty 2, 5.00}, {B, qty 1, 3.00} ]
    let store = InMemoryStore::with_products(vec![product(1, 500, 10), product(2, 300, 4)]);
    let engine = OrderEngine::new(store);

    let cart = user_cart(vec![cart_item(1, 1, 2, 500, None), cart_item(2, 2, 1, 300, None)]);
    let order = engine
        .create_from_cart(&cart, &checkout_request())
        .await
        .unwrap();

    assert_eq!(order.totals.subtotal, Money::from_cents(1300));
    assert_eq!(order.totals.shipping_cost, Money::ZERO);
    assert_eq!(order.totals.tax_amount, Money::ZERO);
    assert_eq!(order.totals.total, Money::from_cents(1300));

    assert_eq!(engine.store().stock_of(ProductId::new(1)), 8);
    assert_eq!(engine.store().stock_of(ProductId::new(2)), 3);

    // Items carry full snapshots
    assert_eq!(order.items.len(), 2);
    let first = &order.items[0];
    assert_eq!(first.product_sku, "SKU-001");
    assert_eq!(first.subtotal, Money::from_cents(1000));
    assert_eq!(first.product_snapshot.price, Money::from_cents(500));
}

#[tokio::test]
async fn test_cancel_pending_restores_stock_and_records_reason() {
    let store = InMemoryStore::with_products(vec![product(1, 500, 10), product(2, 300, 4)]);
    let engine = OrderEngine::new(store);

    let cart = user_cart(vec![cart_item(1, 1, 2, 500, None), cart_item(2, 2, 1, 300, None)]);
    let order = engine
        .create_from_cart(&cart, &checkout_request())
        .await
        .unwrap();

    let cancelled = engine.cancel(&order, Some("changed mind")).await.unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("changed mind"));
    assert_eq!(engine.store().stock_of(ProductId::new(1)), 10);
    assert_eq!(engine.store().stock_of(ProductId::new(2)), 4);
}

#[tokio::test]
async fn test_cancel_delivered_rejected_and_order_unchanged() {
    let store = InMemoryStore::with_products(vec![product(1, 500, 10)]);
    let engine = OrderEngine::new(store);

    let cart = user_cart(vec![cart_item(1, 1, 1, 500, None)]);
    let mut order = engine
        .create_from_cart(&cart, &checkout_request())
        .await
        .unwrap();

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ] {
        order = engine.update_status(&order, status, None).await.unwrap();
    }

    let result = engine.cancel(&order, None).await;
    assert!(matches!(
        result,
        Err(OrderError::NotCancellable(OrderStatus::Delivered))
    ));
    assert_eq!(engine.store().stored_order(order.id), order);
    // Stock stays consumed for fulfilled orders
    assert_eq!(engine.store().stock_of(ProductId::new(1)), 9);
}

#[tokio::test]
async fn test_checkout_with_stored_address_snapshots_it() {
    let store = InMemoryStore::with_products(vec![product(1, 500, 10)]);
    let now = Utc::now();
    store.add_address(Address {
        id: AddressId::new(5),
        user_id: UserId::new(9),
        address_type: AddressType::Shipping,
        is_default: true,
        first_name: "Ona".to_owned(),
        last_name: "Reyes".to_owned(),
        phone: Some("+1 503 555 0100".to_owned()),
        address_line1: "44 Crumb Court".to_owned(),
        address_line2: None,
        city: "Portland".to_owned(),
        state: "OR".to_owned(),
        postal_code: "97209".to_owned(),
        country: "US".to_owned(),
        label: Some("Home".to_owned()),
        delivery_instructions: Some("Gate code 4411".to_owned()),
        created_at: now,
        updated_at: now,
    });
    let engine = OrderEngine::new(store);

    let mut request = checkout_request();
    request.shipping_address = None;
    request.shipping_address_id = Some(AddressId::new(5));

    let cart = user_cart(vec![cart_item(1, 1, 1, 500, None)]);
    let order = engine.create_from_cart(&cart, &request).await.unwrap();

    assert_eq!(order.shipping_address.first_name, "Ona");
    assert_eq!(order.shipping_address.address_line1, "44 Crumb Court");
    assert_eq!(
        order.shipping_address.delivery_instructions.as_deref(),
        Some("Gate code 4411")
    );
    assert_eq!(order.shipping_address_id, Some(AddressId::new(5)));
    // Billing same as shipping: no distinct snapshot stored, reader falls back
    assert!(order.billing_address.is_none());
    assert_eq!(order.billing_address(), &order.shipping_address);
}

#[tokio::test]
async fn test_distinct_billing_address_snapshot() {
    let store = InMemoryStore::with_products(vec![product(1, 500, 10)]);
    let now = Utc::now();
    store.add_address(Address {
        id: AddressId::new(7),
        user_id: UserId::new(9),
        address_type: AddressType::Billing,
        is_default: false,
        first_name: "Accounts".to_owned(),
        last_name: "Payable".to_owned(),
        phone: None,
        address_line1: "1 Invoice Way".to_owned(),
        address_line2: None,
        city: "Portland".to_owned(),
        state: "OR".to_owned(),
        postal_code: "97210".to_owned(),
        country: "US".to_owned(),
        label: None,
        delivery_instructions: None,
        created_at: now,
        updated_at: now,
    });
    let engine = OrderEngine::new(store);

    let mut request = checkout_request();
    request.billing_same_as_shipping = false;
    request.billing_address_id = Some(AddressId::new(7));

    let cart = user_cart(vec![cart_item(1, 1, 1, 500, None)]);
    let order = engine.create_from_cart(&cart, &request).await.unwrap();

    let billing = order.billing_address();
    assert_eq!(billing.address_line1, "1 Invoice Way");
    assert_ne!(billing, &order.shipping_address);
}

#[tokio::test]
async fn test_empty_cart_creates_nothing() {
    let store = InMemoryStore::with_products(vec![product(1, 500, 10)]);
    let engine = OrderEngine::new(store);

    let result = engine
        .create_from_cart(&user_cart(vec![]), &checkout_request())
        .await;

    assert!(matches!(result, Err(OrderError::EmptyCart)));
    assert_eq!(engine.store().order_count(), 0);
    assert_eq!(engine.store().stock_of(ProductId::new(1)), 10);
}

#[tokio::test]
async fn test_insufficient_stock_is_all_or_nothing() {
    let store = InMemoryStore::with_products(vec![product(1, 500, 10), product(2, 300, 0)]);
    let engine = OrderEngine::new(store);

    let cart = user_cart(vec![cart_item(1, 1, 2, 500, None), cart_item(2, 2, 1, 300, None)]);
    let result = engine.create_from_cart(&cart, &checkout_request()).await;

    assert!(matches!(
        result,
        Err(OrderError::InsufficientStock { product_id }) if product_id == ProductId::new(2)
    ));
    assert_eq!(engine.store().order_count(), 0);
    assert_eq!(engine.store().stock_of(ProductId::new(1)), 10);
}

#[tokio::test]
async fn test_order_number_shape() {
    let store = InMemoryStore::with_products(vec![product(1, 500, 10)]);
    let engine = OrderEngine::new(store);

    let cart = user_cart(vec![cart_item(1, 1, 1, 500, None)]);
    let order = engine
        .create_from_cart(&cart, &checkout_request())
        .await
        .unwrap();

    let text = order.order_number.to_string();
    assert!(text.starts_with("BC-"), "got {text}");
    assert_eq!(text.len(), "BC-YYMMDD-XXXX".len());
}
