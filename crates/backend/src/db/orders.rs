//! Database operations for orders and order items.
//!
//! Order creation is one transaction: the order row, its items, and its
//! stock reservations land together or not at all. The reservation is an
//! atomic conditional decrement, so a concurrent checkout that would drive
//! a tracked product negative loses cleanly instead of racing.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, QueryBuilder};

use butter_crumb_core::{
    AddressId, FulfillmentType, Money, OrderId, OrderItemId, OrderNumber, OrderStatus,
    PaymentStatus, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::address::AddressSnapshot;
use crate::models::order::{
    NewOrder, Order, OrderFilters, OrderItem, OrderTotals, ProductSnapshot, StockReservation,
};
use crate::services::orders::InsertOrderError;

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, shipping_address_id, \
     billing_address_id, shipping_address_snapshot, billing_address_snapshot, subtotal, \
     shipping_cost, tax_amount, discount_amount, total, payment_status, payment_method, \
     payment_reference, fulfillment_type, requested_date, requested_time_slot, contact_email, \
     contact_phone, customer_notes, internal_notes, confirmed_at, preparing_at, ready_at, \
     completed_at, cancelled_at, cancellation_reason, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, product_sku, \
     product_snapshot, quantity, unit_price, subtotal, special_instructions, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: Option<UserId>,
    status: String,
    shipping_address_id: Option<AddressId>,
    billing_address_id: Option<AddressId>,
    shipping_address_snapshot: JsonValue,
    billing_address_snapshot: Option<JsonValue>,
    subtotal: Money,
    shipping_cost: Money,
    tax_amount: Money,
    discount_amount: Money,
    total: Money,
    payment_status: String,
    payment_method: Option<String>,
    payment_reference: Option<String>,
    fulfillment_type: String,
    requested_date: NaiveDate,
    requested_time_slot: Option<String>,
    contact_email: String,
    contact_phone: Option<String>,
    customer_notes: Option<String>,
    internal_notes: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    preparing_at: Option<DateTime<Utc>>,
    ready_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let order_number = OrderNumber::parse(&self.order_number).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order number in database: {e}"))
        })?;
        let status = OrderStatus::from_str(&self.status)
            .map_err(RepositoryError::DataCorruption)?;
        let payment_status = PaymentStatus::from_str(&self.payment_status)
            .map_err(RepositoryError::DataCorruption)?;
        let fulfillment_type = FulfillmentType::from_str(&self.fulfillment_type)
            .map_err(RepositoryError::DataCorruption)?;

        let shipping_address: AddressSnapshot =
            serde_json::from_value(self.shipping_address_snapshot).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid shipping snapshot: {e}"))
            })?;
        let billing_address: Option<AddressSnapshot> = self
            .billing_address_snapshot
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid billing snapshot: {e}"))
            })?;

        Ok(Order {
            id: self.id,
            order_number,
            user_id: self.user_id,
            status,
            shipping_address_id: self.shipping_address_id,
            billing_address_id: self.billing_address_id,
            shipping_address,
            billing_address,
            totals: OrderTotals {
                subtotal: self.subtotal,
                shipping_cost: self.shipping_cost,
                tax_amount: self.tax_amount,
                discount_amount: self.discount_amount,
                total: self.total,
            },
            payment_status,
            payment_method: self.payment_method,
            payment_reference: self.payment_reference,
            fulfillment_type,
            requested_date: self.requested_date,
            requested_time_slot: self.requested_time_slot,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            customer_notes: self.customer_notes,
            internal_notes: self.internal_notes,
            confirmed_at: self.confirmed_at,
            preparing_at: self.preparing_at,
            ready_at: self.ready_at,
            completed_at: self.completed_at,
            cancelled_at: self.cancelled_at,
            cancellation_reason: self.cancellation_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

/// Internal row type for order item queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    product_sku: String,
    product_snapshot: JsonValue,
    quantity: i32,
    unit_price: Money,
    subtotal: Money,
    special_instructions: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let product_snapshot: ProductSnapshot = serde_json::from_value(row.product_snapshot)
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid product snapshot: {e}"))
            })?;

        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_sku: row.product_sku,
            product_snapshot,
            quantity: row.quantity,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
            special_instructions: row.special_instructions,
            created_at: row.created_at,
        })
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new order with its items and stock reservations.
    ///
    /// Everything runs in one transaction. A reservation whose floor check
    /// fails rolls the whole creation back.
    ///
    /// # Errors
    ///
    /// `InsertOrderError::DuplicateOrderNumber` on an order-number
    /// collision (caller regenerates and retries),
    /// `InsertOrderError::InsufficientStock` when a reservation cannot be
    /// applied, `InsertOrderError::Repository` otherwise.
    pub async fn create(&self, new: NewOrder) -> Result<Order, InsertOrderError> {
        let shipping_snapshot = to_json(&new.shipping_address)?;
        let billing_snapshot = new.billing_address.as_ref().map(to_json).transpose()?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let order_row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (
                order_number, user_id, status,
                shipping_address_id, billing_address_id,
                shipping_address_snapshot, billing_address_snapshot,
                subtotal, shipping_cost, tax_amount, discount_amount, total,
                payment_status, payment_method, fulfillment_type,
                requested_date, requested_time_slot,
                contact_email, contact_phone, customer_notes
            )
            VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    'pending', $12, $13, $14, $15, $16, $17, $18)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(new.order_number.as_str())
        .bind(new.user_id)
        .bind(new.shipping_address_id)
        .bind(new.billing_address_id)
        .bind(shipping_snapshot)
        .bind(billing_snapshot)
        .bind(new.totals.subtotal)
        .bind(new.totals.shipping_cost)
        .bind(new.totals.tax_amount)
        .bind(new.totals.discount_amount)
        .bind(new.totals.total)
        .bind(&new.payment_method)
        .bind(new.fulfillment_type.as_str())
        .bind(new.requested_date)
        .bind(&new.requested_time_slot)
        .bind(&new.contact_email)
        .bind(&new.contact_phone)
        .bind(&new.customer_notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return InsertOrderError::DuplicateOrderNumber;
            }
            InsertOrderError::Repository(RepositoryError::Database(e))
        })?;

        let order_id = order_row.id;
        let mut items = Vec::with_capacity(new.items.len());
        for item in &new.items {
            let snapshot = to_json(&item.product_snapshot)?;
            let row = sqlx::query_as::<_, OrderItemRow>(&format!(
                r"
                INSERT INTO order_items (
                    order_id, product_id, product_name, product_sku, product_snapshot,
                    quantity, unit_price, subtotal, special_instructions
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING {ORDER_ITEM_COLUMNS}
                "
            ))
            .bind(order_id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(&item.product_sku)
            .bind(snapshot)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.subtotal)
            .bind(&item.special_instructions)
            .fetch_one(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            items.push(OrderItem::try_from(row)?);
        }

        for reservation in &new.reservations {
            let result = sqlx::query(
                r"
                UPDATE products
                SET stock_quantity = stock_quantity - $2, updated_at = NOW()
                WHERE id = $1 AND (stock_quantity >= $2 OR allow_backorder)
                ",
            )
            .bind(reservation.product_id)
            .bind(reservation.quantity)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back the order and any
                // reservations already applied.
                return Err(InsertOrderError::InsufficientStock {
                    product_id: reservation.product_id,
                });
            }
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(order_row.into_order(items)?)
    }

    /// Persist a status transition and apply stock releases.
    ///
    /// The caller has already validated the transition; this writes the
    /// order's current lifecycle fields verbatim and increments stock for
    /// each release in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order row is gone.
    pub async fn persist_transition(
        &self,
        order: &Order,
        releases: &[StockReservation],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE orders
            SET status = $2, confirmed_at = $3, preparing_at = $4, ready_at = $5,
                completed_at = $6, cancelled_at = $7, cancellation_reason = $8,
                updated_at = $9
            WHERE id = $1
            ",
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.confirmed_at)
        .bind(order.preparing_at)
        .bind(order.ready_at)
        .bind(order.completed_at)
        .bind(order.cancelled_at)
        .bind(&order.cancellation_reason)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        for release in releases {
            sqlx::query(
                r"
                UPDATE products
                SET stock_quantity = stock_quantity + $2, updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(release.product_id)
            .bind(release.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get an order by ID, optionally scoped to a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(
        &self,
        id: OrderId,
        user_id: Option<UserId>,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE id = $1 AND ($2::INT IS NULL OR user_id = $2)
            "
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        self.attach_items(row).await
    }

    /// Get an order by its human-readable order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(
        &self,
        order_number: &str,
        user_id: Option<UserId>,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE order_number = $1 AND ($2::INT IS NULL OR user_id = $2)
            "
        ))
        .bind(order_number)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        self.attach_items(row).await
    }

    /// Paginated order history for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_user(
        &self,
        user_id: UserId,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(self.pool)
        .await?;

        Ok((self.attach_items_all(rows).await?, total))
    }

    /// Paginated filtered order listing for staff, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &self,
        filters: &OrderFilters,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_order_filters(&mut count_query, filters);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        push_order_filters(&mut query, filters);
        query.push(" ORDER BY created_at DESC");
        query.push(" LIMIT ").push_bind(page_size);
        query.push(" OFFSET ").push_bind((page - 1) * page_size);

        let rows = query
            .build_query_as::<OrderRow>()
            .fetch_all(self.pool)
            .await?;

        Ok((self.attach_items_all(rows).await?, total))
    }

    /// Update staff-only notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_notes(
        &self,
        id: OrderId,
        internal_notes: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET internal_notes = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(internal_notes)
        .fetch_optional(self.pool)
        .await?;

        match self.attach_items(row).await? {
            Some(order) => Ok(order),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Mark an order as paid, storing the provider's reference.
    ///
    /// Called by the payment collaborator once funds are confirmed; payment
    /// status is independent of the fulfillment lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        payment_reference: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET payment_status = 'paid',
                payment_reference = COALESCE($2, payment_reference),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(payment_reference)
        .fetch_optional(self.pool)
        .await?;

        match self.attach_items(row).await? {
            Some(order) => Ok(order),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Whether a user has a completed order containing a product.
    ///
    /// Drives the verified-purchase flag on reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn user_completed_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM orders o
                JOIN order_items i ON i.order_id = o.id
                WHERE o.user_id = $1 AND i.product_id = $2
                  AND o.status IN ('delivered', 'picked_up')
            )
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    async fn attach_items(&self, row: Option<OrderRow>) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(&format!(
            r"
            SELECT {ORDER_ITEM_COLUMNS} FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "
        ))
        .bind(row.id)
        .fetch_all(self.pool)
        .await?;

        let items = items
            .into_iter()
            .map(OrderItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(row.into_order(items)?))
    }

    async fn attach_items_all(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<i32> = rows.iter().map(|row| row.id.as_i32()).collect();

        let item_rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            r"
            SELECT {ORDER_ITEM_COLUMNS} FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id
            "
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: std::collections::HashMap<OrderId, Vec<OrderItem>> =
            std::collections::HashMap::new();
        for item_row in item_rows {
            let item = OrderItem::try_from(item_row)?;
            by_order.entry(item.order_id).or_default().push(item);
        }

        rows.into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<JsonValue, RepositoryError> {
    serde_json::to_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("failed to serialize snapshot: {e}")))
}

/// Append the shared WHERE clauses for order listing queries.
fn push_order_filters(query: &mut QueryBuilder<'_, Postgres>, filters: &OrderFilters) {
    query.push(" WHERE TRUE");

    if let Some(status) = filters.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(payment_status) = filters.payment_status {
        query
            .push(" AND payment_status = ")
            .push_bind(payment_status.as_str());
    }
    if let Some(fulfillment_type) = filters.fulfillment_type {
        query
            .push(" AND fulfillment_type = ")
            .push_bind(fulfillment_type.as_str());
    }
    if let Some(date_from) = filters.date_from {
        query.push(" AND requested_date >= ").push_bind(date_from);
    }
    if let Some(date_to) = filters.date_to {
        query.push(" AND requested_date <= ").push_bind(date_to);
    }
    if let Some(search) = &filters.search {
        let pattern = format!("%{search}%");
        query.push(" AND (order_number ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR contact_email ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}
