//! Database operations for carts and cart items.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use butter_crumb_core::{CartId, CartItemId, Money, ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::{Cart, CartItem, NewCartItem};

const CART_COLUMNS: &str = "id, user_id, session_id, requested_delivery_date, \
     delivery_time_slot, created_at, updated_at, expires_at";

const CART_ITEM_COLUMNS: &str = "id, cart_id, product_id, quantity, unit_price, \
     special_instructions, created_at, updated_at";

/// Internal row type for cart queries.
#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: Option<UserId>,
    session_id: Option<Uuid>,
    requested_delivery_date: Option<NaiveDate>,
    delivery_time_slot: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl CartRow {
    fn into_cart(self, items: Vec<CartItem>) -> Cart {
        Cart {
            id: self.id,
            user_id: self.user_id,
            session_id: self.session_id,
            requested_delivery_date: self.requested_delivery_date,
            delivery_time_slot: self.delivery_time_slot,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
            items,
        }
    }
}

/// Internal row type for cart item queries.
#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
    unit_price: Money,
    special_instructions: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            special_instructions: row.special_instructions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's cart with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        self.attach_items(row).await
    }

    /// Get an unexpired guest cart with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_session(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE session_id = $1 AND expires_at > $2"
        ))
        .bind(session_id)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        self.attach_items(row).await
    }

    /// Create an empty cart for a user or a guest session.
    ///
    /// Guest carts get an expiry; user carts never expire.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user or session already
    /// has a cart, `RepositoryError::Database` for other failures.
    pub async fn create(
        &self,
        user_id: Option<UserId>,
        session_id: Option<Uuid>,
    ) -> Result<Cart, RepositoryError> {
        let expires_at = session_id.map(|_| Cart::guest_expiry(Utc::now()));

        let row = sqlx::query_as::<_, CartRow>(&format!(
            r"
            INSERT INTO carts (user_id, session_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING {CART_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(session_id)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("cart already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into_cart(Vec::new()))
    }

    /// Insert a cart line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_item(&self, new: NewCartItem) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            r"
            INSERT INTO cart_items (cart_id, product_id, quantity, unit_price, special_instructions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CART_ITEM_COLUMNS}
            "
        ))
        .bind(new.cart_id)
        .bind(new.product_id)
        .bind(new.quantity)
        .bind(new.unit_price)
        .bind(&new.special_instructions)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Set a line's quantity (merge bumps).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this cart.
    pub async fn set_item_quantity(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            r"
            UPDATE cart_items
            SET quantity = $3, updated_at = NOW()
            WHERE id = $2 AND cart_id = $1
            RETURNING {CART_ITEM_COLUMNS}
            "
        ))
        .bind(cart_id)
        .bind(item_id)
        .bind(quantity)
        .fetch_optional(self.pool)
        .await?;

        row.map(CartItem::from).ok_or(RepositoryError::NotFound)
    }

    /// Update a line's quantity and/or instructions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this cart.
    pub async fn update_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantity: Option<i32>,
        special_instructions: Option<String>,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            r"
            UPDATE cart_items
            SET quantity = COALESCE($3, quantity),
                special_instructions = COALESCE($4, special_instructions),
                updated_at = NOW()
            WHERE id = $2 AND cart_id = $1
            RETURNING {CART_ITEM_COLUMNS}
            "
        ))
        .bind(cart_id)
        .bind(item_id)
        .bind(quantity)
        .bind(special_instructions)
        .fetch_optional(self.pool)
        .await?;

        row.map(CartItem::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a line.
    ///
    /// # Returns
    ///
    /// Returns `true` if the line was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $2 AND cart_id = $1")
            .bind(cart_id)
            .bind(item_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every line in a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Update delivery preferences; unset arguments leave fields untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cart doesn't exist.
    pub async fn update_delivery(
        &self,
        cart_id: CartId,
        requested_delivery_date: Option<NaiveDate>,
        delivery_time_slot: Option<String>,
    ) -> Result<Cart, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            r"
            UPDATE carts
            SET requested_delivery_date = COALESCE($2, requested_delivery_date),
                delivery_time_slot = COALESCE($3, delivery_time_slot),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CART_COLUMNS}
            "
        ))
        .bind(cart_id)
        .bind(requested_delivery_date)
        .bind(delivery_time_slot)
        .fetch_optional(self.pool)
        .await?;

        self.attach_items(row).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a cart and (via cascade) its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete every expired guest cart. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM carts WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn attach_items(&self, row: Option<CartRow>) -> Result<Option<Cart>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, CartItemRow>(&format!(
            r"
            SELECT {CART_ITEM_COLUMNS} FROM cart_items
            WHERE cart_id = $1
            ORDER BY created_at, id
            "
        ))
        .bind(row.id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(
            row.into_cart(items.into_iter().map(CartItem::from).collect()),
        ))
    }
}
