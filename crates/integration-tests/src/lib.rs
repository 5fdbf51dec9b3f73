//! Shared fixtures for Butter & Crumb integration tests.
//!
//! Provides an in-memory [`OrderStore`] so the order lifecycle engine can be
//! driven end to end without a database, plus builders for the domain types
//! the tests exercise.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use butter_crumb_backend::db::RepositoryError;
use butter_crumb_backend::models::{
    Address, AddressSnapshot, Cart, CartItem, NewOrder, Order, OrderItem, Product,
    StockReservation,
};
use butter_crumb_backend::services::orders::{InsertOrderError, OrderRequest, OrderStore};
use butter_crumb_core::{
    AddressId, CartId, CartItemId, FulfillmentType, Money, OrderId, OrderItemId, OrderStatus,
    PaymentStatus, ProductId, UserId,
};

/// In-memory [`OrderStore`] mirroring the transactional semantics of the
/// Postgres store: order creation is all-or-nothing, reservations respect
/// the stock floor unless backorders are allowed, and releases are
/// unconditional.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    products: HashMap<ProductId, Product>,
    addresses: HashMap<AddressId, Address>,
    orders: HashMap<OrderId, Order>,
    next_order_id: i32,
    next_item_id: i32,
}

impl InMemoryStore {
    /// Store seeded with the given products.
    #[must_use]
    pub fn with_products(products: Vec<Product>) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            for product in products {
                state.products.insert(product.id, product);
            }
            state.next_order_id = 1;
            state.next_item_id = 1;
        }
        store
    }

    /// Add a stored address.
    pub fn add_address(&self, address: Address) {
        self.state
            .lock()
            .unwrap()
            .addresses
            .insert(address.id, address);
    }

    /// Current stock counter for a product.
    #[must_use]
    pub fn stock_of(&self, id: ProductId) -> i32 {
        self.state
            .lock()
            .unwrap()
            .products
            .get(&id)
            .map_or(0, |product| product.stock_quantity)
    }

    /// The stored copy of an order.
    ///
    /// # Panics
    ///
    /// Panics if the order was never stored.
    #[must_use]
    pub fn stored_order(&self, id: OrderId) -> Order {
        self.state.lock().unwrap().orders.get(&id).cloned().unwrap()
    }

    /// Number of orders stored.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.state.lock().unwrap().orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().unwrap().products.get(&id).cloned())
    }

    async fn address(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        Ok(self.state.lock().unwrap().addresses.get(&id).cloned())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, InsertOrderError> {
        let mut state = self.state.lock().unwrap();

        for reservation in &order.reservations {
            let product = state
                .products
                .get(&reservation.product_id)
                .ok_or(InsertOrderError::Repository(RepositoryError::NotFound))?;
            if product.stock_quantity < reservation.quantity && !product.allow_backorder {
                return Err(InsertOrderError::InsufficientStock {
                    product_id: reservation.product_id,
                });
            }
        }
        for reservation in &order.reservations {
            if let Some(product) = state.products.get_mut(&reservation.product_id) {
                product.stock_quantity -= reservation.quantity;
            }
        }

        let order_id = OrderId::new(state.next_order_id);
        state.next_order_id += 1;
        let now = Utc::now();

        let mut items = Vec::with_capacity(order.items.len());
        for item in order.items {
            let item_id = OrderItemId::new(state.next_item_id);
            state.next_item_id += 1;
            items.push(OrderItem {
                id: item_id,
                order_id,
                product_id: item.product_id,
                product_name: item.product_name,
                product_sku: item.product_sku,
                product_snapshot: item.product_snapshot,
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal,
                special_instructions: item.special_instructions,
                created_at: now,
            });
        }

        let created = Order {
            id: order_id,
            order_number: order.order_number,
            user_id: order.user_id,
            status: OrderStatus::Pending,
            shipping_address_id: order.shipping_address_id,
            billing_address_id: order.billing_address_id,
            shipping_address: order.shipping_address,
            billing_address: order.billing_address,
            totals: order.totals,
            payment_status: PaymentStatus::Pending,
            payment_method: order.payment_method,
            payment_reference: None,
            fulfillment_type: order.fulfillment_type,
            requested_date: order.requested_date,
            requested_time_slot: order.requested_time_slot,
            contact_email: order.contact_email,
            contact_phone: order.contact_phone,
            customer_notes: order.customer_notes,
            internal_notes: None,
            confirmed_at: None,
            preparing_at: None,
            ready_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            items,
        };
        state.orders.insert(order_id, created.clone());
        Ok(created)
    }

    async fn persist_transition(
        &self,
        order: &Order,
        releases: &[StockReservation],
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        for release in releases {
            if let Some(product) = state.products.get_mut(&release.product_id) {
                product.stock_quantity += release.quantity;
            }
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }
}

// =============================================================================
// Fixture builders
// =============================================================================

/// A tracked-inventory product with the given id, price, and stock.
#[must_use]
pub fn product(id: i32, price_cents: i64, stock: i32) -> Product {
    let now = Utc::now();
    Product {
        id: ProductId::new(id),
        sku: format!("SKU-{id:03}"),
        name: format!("Product {id}"),
        slug: format!("product-{id}"),
        description: "A test bake.".to_owned(),
        short_description: None,
        price: Money::from_cents(price_cents),
        compare_at_price: None,
        stock_quantity: stock,
        low_stock_threshold: 5,
        track_inventory: true,
        allow_backorder: false,
        lead_time_hours: 0,
        minimum_quantity: 1,
        quantity_increment: 1,
        is_gluten_free: false,
        is_dairy_free: false,
        is_vegan: false,
        is_keto_friendly: false,
        allergens: vec!["wheat".to_owned()],
        is_seasonal: false,
        available_from: None,
        available_until: None,
        average_rating: None,
        review_count: 0,
        is_active: true,
        is_featured: false,
        is_bestseller: false,
        display_order: 0,
        category_id: None,
        created_at: now,
        updated_at: now,
    }
}

/// A cart line for the given product.
#[must_use]
pub fn cart_item(
    id: i32,
    product_id: i32,
    quantity: i32,
    unit_price_cents: i64,
    instructions: Option<&str>,
) -> CartItem {
    let now = Utc::now();
    CartItem {
        id: CartItemId::new(id),
        cart_id: CartId::new(1),
        product_id: ProductId::new(product_id),
        quantity,
        unit_price: Money::from_cents(unit_price_cents),
        special_instructions: instructions.map(str::to_owned),
        created_at: now,
        updated_at: now,
    }
}

/// A user cart holding the given lines.
#[must_use]
pub fn user_cart(items: Vec<CartItem>) -> Cart {
    let now = Utc::now();
    Cart {
        id: CartId::new(1),
        user_id: Some(UserId::new(9)),
        session_id: None,
        requested_delivery_date: None,
        delivery_time_slot: None,
        created_at: now,
        updated_at: now,
        expires_at: None,
        items,
    }
}

/// An inline shipping snapshot, as a guest checkout would supply.
#[must_use]
pub fn shipping_snapshot() -> AddressSnapshot {
    AddressSnapshot {
        first_name: "June".to_owned(),
        last_name: "Park".to_owned(),
        phone: None,
        address_line1: "12 Rye Lane".to_owned(),
        address_line2: None,
        city: "Portland".to_owned(),
        state: "OR".to_owned(),
        postal_code: "97201".to_owned(),
        country: "US".to_owned(),
        delivery_instructions: None,
    }
}

/// A guest checkout request with an inline shipping address.
#[must_use]
pub fn checkout_request() -> OrderRequest {
    OrderRequest {
        shipping_address_id: None,
        shipping_address: Some(shipping_snapshot()),
        billing_address_id: None,
        billing_same_as_shipping: true,
        fulfillment_type: FulfillmentType::Delivery,
        requested_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        requested_time_slot: None,
        contact_email: "june@example.com".to_owned(),
        contact_phone: None,
        customer_notes: None,
        payment_method: Some("card".to_owned()),
    }
}
