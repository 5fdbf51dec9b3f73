//! Order lifecycle engine.
//!
//! Converts a cart into an immutable order, walks the order through its
//! status graph, and coordinates the inventory ledger: stock is decremented
//! exactly once at creation and incremented exactly once if and only if the
//! order is later cancelled. No other code path touches stock for an
//! order's items.
//!
//! The engine is generic over [`OrderStore`], which supplies the product
//! lookup, the address resolver, and transactional persistence. Production
//! code uses [`PgOrderStore`]; tests drive the engine against an in-memory
//! store, so every lifecycle property is checkable without a database.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use butter_crumb_core::{
    AddressId, FulfillmentType, OrderNumber, OrderStatus, ProductId,
};

use crate::db::{AddressRepository, OrderRepository, ProductRepository, RepositoryError};
use crate::models::address::AddressSnapshot;
use crate::models::cart::Cart;
use crate::models::order::{
    NewOrder, NewOrderItem, Order, OrderTotals, ProductSnapshot, StockReservation,
    TransitionError,
};
use crate::models::product::Product;

/// How many fresh order numbers to try before giving up on a unique insert.
const ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// Errors from the order lifecycle engine.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// Checkout from an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// Neither a stored address id nor an inline address was supplied.
    #[error("shipping address required")]
    ShippingAddressRequired,

    /// Both a stored address id and an inline address were supplied.
    #[error("supply either a stored shipping address or an inline one, not both")]
    ShippingAddressConflict,

    /// The referenced stored address does not exist.
    #[error("address {0} not found")]
    AddressNotFound(AddressId),

    /// A cart line references a product that no longer exists.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// A tracked product did not have enough stock to reserve.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    /// Could not find a free order number within the retry budget.
    #[error("order number collision retries exhausted")]
    OrderNumberCollision,

    /// Illegal status transition.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Cancel requested on an order past the cancellable states.
    #[error("order in status {0} cannot be cancelled")]
    NotCancellable(OrderStatus),

    /// Underlying storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors from persisting a [`NewOrder`].
#[derive(Debug, thiserror::Error)]
pub enum InsertOrderError {
    /// A stock reservation hit the floor check; nothing was persisted.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    /// The generated order number already exists.
    #[error("order number already exists")]
    DuplicateOrderNumber,

    /// Any other storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Checkout payload accompanying a cart.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRequest {
    /// Stored address to snapshot; mutually exclusive with
    /// `shipping_address`.
    pub shipping_address_id: Option<AddressId>,
    /// Inline address for guest checkout; mutually exclusive with
    /// `shipping_address_id`.
    pub shipping_address: Option<AddressSnapshot>,
    pub billing_address_id: Option<AddressId>,
    pub billing_same_as_shipping: bool,
    pub fulfillment_type: FulfillmentType,
    pub requested_date: NaiveDate,
    pub requested_time_slot: Option<String>,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub customer_notes: Option<String>,
    pub payment_method: Option<String>,
}

/// Persistence interface the engine drives.
///
/// `insert_order` must persist the order, its items, and its stock
/// reservations as one transactional unit: either everything lands or
/// nothing does. `persist_transition` applies stock releases
/// unconditionally alongside the status change.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look up a product by id.
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Resolve a stored address by id.
    async fn address(&self, id: AddressId) -> Result<Option<crate::models::address::Address>, RepositoryError>;

    /// Persist a new order atomically, applying its stock reservations.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, InsertOrderError>;

    /// Persist a status transition, applying stock releases.
    async fn persist_transition(
        &self,
        order: &Order,
        releases: &[StockReservation],
    ) -> Result<(), RepositoryError>;
}

/// The order lifecycle engine.
pub struct OrderEngine<S> {
    store: S,
}

impl<S: OrderStore> OrderEngine<S> {
    /// Create an engine over the given store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Convert a cart into a persisted order.
    ///
    /// The cart itself is not cleared here; the caller owns cart lifecycle
    /// and clears it after creation succeeds.
    ///
    /// # Errors
    ///
    /// Validation failures (`EmptyCart`, address selection,
    /// `InsufficientStock`) and storage failures; on any error nothing has
    /// been persisted.
    pub async fn create_from_cart(
        &self,
        cart: &Cart,
        request: &OrderRequest,
    ) -> Result<Order, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let shipping_address = self.resolve_shipping(request).await?;
        let billing_address = self.resolve_billing(request).await?;

        let totals = OrderTotals::from_subtotal(cart.subtotal());

        let mut items = Vec::with_capacity(cart.items.len());
        let mut reservations = Vec::new();
        for cart_item in &cart.items {
            let product = self
                .store
                .product(cart_item.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(cart_item.product_id))?;

            items.push(NewOrderItem {
                product_id: product.id,
                product_name: product.name.clone(),
                product_sku: product.sku.clone(),
                product_snapshot: ProductSnapshot::of(&product),
                quantity: cart_item.quantity,
                unit_price: cart_item.unit_price,
                subtotal: cart_item.line_total(),
                special_instructions: cart_item.special_instructions.clone(),
            });

            if product.track_inventory {
                reservations.push(StockReservation {
                    product_id: product.id,
                    quantity: cart_item.quantity,
                });
            }
        }

        // The database's unique constraint is the real collision guard; a
        // fresh number per attempt makes hitting it twice vanishingly rare.
        let mut attempt = 0;
        loop {
            let order = NewOrder {
                order_number: OrderNumber::generate(),
                user_id: cart.user_id,
                shipping_address_id: request.shipping_address_id,
                billing_address_id: if request.billing_same_as_shipping {
                    None
                } else {
                    request.billing_address_id
                },
                shipping_address: shipping_address.clone(),
                billing_address: billing_address.clone(),
                totals,
                payment_method: request.payment_method.clone(),
                fulfillment_type: request.fulfillment_type,
                requested_date: request.requested_date,
                requested_time_slot: request.requested_time_slot.clone(),
                contact_email: request.contact_email.clone(),
                contact_phone: request.contact_phone.clone(),
                customer_notes: request.customer_notes.clone(),
                items: items.clone(),
                reservations: reservations.clone(),
            };

            match self.store.insert_order(order).await {
                Ok(created) => {
                    tracing::info!(
                        order_number = %created.order_number,
                        items = created.items.len(),
                        total = %created.totals.total,
                        "order created"
                    );
                    return Ok(created);
                }
                Err(InsertOrderError::DuplicateOrderNumber) => {
                    attempt += 1;
                    if attempt >= ORDER_NUMBER_ATTEMPTS {
                        return Err(OrderError::OrderNumberCollision);
                    }
                    tracing::warn!(attempt, "order number collision, regenerating");
                }
                Err(InsertOrderError::InsufficientStock { product_id }) => {
                    return Err(OrderError::InsufficientStock { product_id });
                }
                Err(InsertOrderError::Repository(err)) => return Err(err.into()),
            }
        }
    }

    /// Move an order to a new status.
    ///
    /// Returns the updated order; the input order is untouched, so a
    /// rejected transition leaves the caller holding exactly what was
    /// loaded. Transitioning into `cancelled` releases stock for every
    /// item whose product still exists and tracks inventory.
    ///
    /// # Errors
    ///
    /// `Transition` when the target is not reachable from the current
    /// status; storage errors from persistence.
    pub async fn update_status(
        &self,
        order: &Order,
        new_status: OrderStatus,
        reason: Option<&str>,
    ) -> Result<Order, OrderError> {
        let updated = order.apply_transition(new_status, reason, Utc::now())?;

        let releases = if new_status == OrderStatus::Cancelled {
            self.releases_for(order).await?
        } else {
            Vec::new()
        };

        self.store.persist_transition(&updated, &releases).await?;

        tracing::info!(
            order_number = %updated.order_number,
            from = %order.status,
            to = %new_status,
            "order status updated"
        );
        Ok(updated)
    }

    /// Cancel an order, storing the optional reason.
    ///
    /// # Errors
    ///
    /// `NotCancellable` for orders past `pending`/`confirmed`; otherwise as
    /// [`OrderEngine::update_status`].
    pub async fn cancel(&self, order: &Order, reason: Option<&str>) -> Result<Order, OrderError> {
        if !order.is_cancellable() {
            return Err(OrderError::NotCancellable(order.status));
        }
        self.update_status(order, OrderStatus::Cancelled, reason).await
    }

    async fn resolve_shipping(
        &self,
        request: &OrderRequest,
    ) -> Result<AddressSnapshot, OrderError> {
        match (request.shipping_address_id, &request.shipping_address) {
            (Some(_), Some(_)) => Err(OrderError::ShippingAddressConflict),
            (Some(id), None) => {
                let address = self
                    .store
                    .address(id)
                    .await?
                    .ok_or(OrderError::AddressNotFound(id))?;
                Ok(address.snapshot())
            }
            (None, Some(inline)) => Ok(inline.clone()),
            (None, None) => Err(OrderError::ShippingAddressRequired),
        }
    }

    async fn resolve_billing(
        &self,
        request: &OrderRequest,
    ) -> Result<Option<AddressSnapshot>, OrderError> {
        if request.billing_same_as_shipping {
            return Ok(None);
        }
        let Some(id) = request.billing_address_id else {
            return Ok(None);
        };
        // A stale billing reference degrades to the shipping fallback
        // rather than blocking checkout.
        Ok(self.store.address(id).await?.map(|address| address.snapshot()))
    }

    async fn releases_for(&self, order: &Order) -> Result<Vec<StockReservation>, OrderError> {
        let mut releases = Vec::new();
        for item in &order.items {
            match self.store.product(item.product_id).await? {
                Some(product) if product.track_inventory => {
                    releases.push(StockReservation {
                        product_id: item.product_id,
                        quantity: item.quantity,
                    });
                }
                _ => {}
            }
        }
        Ok(releases)
    }
}

/// Production [`OrderStore`] backed by `PostgreSQL`.
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).get_by_id(id).await
    }

    async fn address(
        &self,
        id: AddressId,
    ) -> Result<Option<crate::models::address::Address>, RepositoryError> {
        AddressRepository::new(&self.pool).get_by_id(id).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, InsertOrderError> {
        OrderRepository::new(&self.pool).create(order).await
    }

    async fn persist_transition(
        &self,
        order: &Order,
        releases: &[StockReservation],
    ) -> Result<(), RepositoryError> {
        OrderRepository::new(&self.pool)
            .persist_transition(order, releases)
            .await
    }
}
