//! Cart operations: quantity validation, line merging, and the
//! guest-to-user merge on login.
//!
//! Validation and merge decisions are pure functions over the domain types;
//! [`CartService`] wires them to the repositories. Checkout trusts the
//! validation done here, so every mutation path must go through
//! [`validate_addition`] or [`validate_quantity`].

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use butter_crumb_core::{CartItemId, ProductId, UserId};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::cart::{Cart, CartItem, NewCartItem};
use crate::models::product::Product;

/// Errors from cart operations.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    /// The referenced product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The product is not currently sold.
    #[error("product is not available")]
    ProductInactive,

    /// The product is out of stock and does not allow backorders.
    #[error("product is out of stock")]
    OutOfStock,

    /// Quantity below the product's minimum order quantity.
    #[error("minimum order quantity is {minimum}")]
    BelowMinimumQuantity { minimum: i32 },

    /// Quantity not a multiple of the product's order increment.
    #[error("quantity must be in increments of {increment}")]
    QuantityNotInIncrements { increment: i32 },

    /// The referenced cart line does not exist in this cart.
    #[error("cart item {0} not found")]
    ItemNotFound(CartItemId),

    /// Underlying storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Validate a quantity against the product's ordering constraints.
///
/// # Errors
///
/// `BelowMinimumQuantity` or `QuantityNotInIncrements`; nothing is mutated.
pub fn validate_quantity(product: &Product, quantity: i32) -> Result<(), CartError> {
    if quantity < product.minimum_quantity {
        return Err(CartError::BelowMinimumQuantity {
            minimum: product.minimum_quantity,
        });
    }
    if product.quantity_increment > 1 && quantity % product.quantity_increment != 0 {
        return Err(CartError::QuantityNotInIncrements {
            increment: product.quantity_increment,
        });
    }
    Ok(())
}

/// Validate that a product can be added to a cart at all.
///
/// # Errors
///
/// `ProductInactive`, `OutOfStock`, or a quantity constraint violation;
/// nothing is mutated.
pub fn validate_addition(product: &Product, quantity: i32) -> Result<(), CartError> {
    if !product.is_active {
        return Err(CartError::ProductInactive);
    }
    if !product.is_in_stock() {
        return Err(CartError::OutOfStock);
    }
    validate_quantity(product, quantity)
}

/// What applying an addition to a cart should do.
#[derive(Debug, Clone, PartialEq)]
pub enum AddPlan {
    /// Bump an existing line that has identical special instructions.
    Merge {
        item_id: CartItemId,
        new_quantity: i32,
    },
    /// Insert a fresh line, snapshotting the product's current price.
    Insert(NewCartItem),
}

/// Decide how an addition lands in the cart.
///
/// Re-adding a product with identical special instructions merges into the
/// existing line; differing instructions create an independent line.
///
/// # Errors
///
/// Validation errors from [`validate_addition`].
pub fn plan_addition(
    cart: &Cart,
    product: &Product,
    quantity: i32,
    special_instructions: Option<String>,
) -> Result<AddPlan, CartError> {
    validate_addition(product, quantity)?;

    if let Some(existing) = cart.mergeable_line(product.id, special_instructions.as_deref()) {
        return Ok(AddPlan::Merge {
            item_id: existing.id,
            new_quantity: existing.quantity + quantity,
        });
    }

    Ok(AddPlan::Insert(NewCartItem {
        cart_id: cart.id,
        product_id: product.id,
        quantity,
        unit_price: product.price,
        special_instructions,
    }))
}

/// How a guest cart folds into a user cart on login.
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    /// Existing user-cart lines to bump, with their new quantities.
    pub bumps: Vec<(CartItemId, i32)>,
    /// Guest lines to copy into the user cart.
    pub inserts: Vec<NewCartItem>,
    /// Delivery date to adopt, only when the user cart has none.
    pub requested_delivery_date: Option<chrono::NaiveDate>,
    /// Time slot to adopt, only when the user cart has none.
    pub delivery_time_slot: Option<String>,
}

impl MergePlan {
    /// Whether the merge changes the user cart at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bumps.is_empty()
            && self.inserts.is_empty()
            && self.requested_delivery_date.is_none()
            && self.delivery_time_slot.is_none()
    }
}

/// Decide how `guest_cart` folds into `user_cart`.
///
/// Guest lines merge into user lines by the identical-instructions rule,
/// keeping the user line's price snapshot; unmatched lines move over with
/// the guest's snapshot. Delivery preferences copy only into unset fields.
#[must_use]
pub fn plan_merge(user_cart: &Cart, guest_cart: &Cart) -> MergePlan {
    let mut plan = MergePlan::default();

    for guest_item in &guest_cart.items {
        match user_cart.mergeable_line(
            guest_item.product_id,
            guest_item.special_instructions.as_deref(),
        ) {
            Some(existing) => plan
                .bumps
                .push((existing.id, existing.quantity + guest_item.quantity)),
            None => plan.inserts.push(NewCartItem {
                cart_id: user_cart.id,
                product_id: guest_item.product_id,
                quantity: guest_item.quantity,
                unit_price: guest_item.unit_price,
                special_instructions: guest_item.special_instructions.clone(),
            }),
        }
    }

    if user_cart.requested_delivery_date.is_none() {
        plan.requested_delivery_date = guest_cart.requested_delivery_date;
    }
    if user_cart.delivery_time_slot.is_none() {
        plan.delivery_time_slot = guest_cart.delivery_time_slot.clone();
    }

    plan
}

/// Cart persistence coordinator.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    /// Create a cart service over a connection pool.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the cart for a user or guest session, creating it on first
    /// access.
    ///
    /// # Errors
    ///
    /// Storage errors; `RepositoryError::Conflict` when neither identity is
    /// supplied.
    pub async fn get_or_create(
        &self,
        user_id: Option<UserId>,
        session_id: Option<Uuid>,
    ) -> Result<Cart, CartError> {
        let repo = CartRepository::new(self.pool);

        let existing = match (user_id, session_id) {
            (Some(user_id), _) => repo.get_by_user(user_id).await?,
            (None, Some(session_id)) => repo.get_by_session(session_id, Utc::now()).await?,
            (None, None) => {
                return Err(RepositoryError::Conflict(
                    "cart needs a user or a guest session".to_owned(),
                )
                .into());
            }
        };

        match existing {
            Some(cart) => Ok(cart),
            None => Ok(repo.create(user_id, session_id.filter(|_| user_id.is_none())).await?),
        }
    }

    /// Add a product to the cart, merging lines per the
    /// identical-instructions rule.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` plus the validation errors of [`plan_addition`].
    pub async fn add_item(
        &self,
        cart: &Cart,
        product_id: ProductId,
        quantity: i32,
        special_instructions: Option<String>,
    ) -> Result<CartItem, CartError> {
        let product = ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;

        let repo = CartRepository::new(self.pool);
        match plan_addition(cart, &product, quantity, special_instructions)? {
            AddPlan::Merge {
                item_id,
                new_quantity,
            } => Ok(repo.set_item_quantity(cart.id, item_id, new_quantity).await?),
            AddPlan::Insert(new_item) => Ok(repo.insert_item(new_item).await?),
        }
    }

    /// Update a line's quantity and/or instructions, re-validating the
    /// quantity constraints.
    ///
    /// # Errors
    ///
    /// `ItemNotFound` when the line is not in this cart; quantity
    /// validation errors; storage errors.
    pub async fn update_item(
        &self,
        cart: &Cart,
        item_id: CartItemId,
        quantity: Option<i32>,
        special_instructions: Option<String>,
    ) -> Result<CartItem, CartError> {
        let item = cart
            .items
            .iter()
            .find(|item| item.id == item_id)
            .ok_or(CartError::ItemNotFound(item_id))?;

        if let Some(quantity) = quantity {
            let product = ProductRepository::new(self.pool)
                .get_by_id(item.product_id)
                .await?
                .ok_or(CartError::ProductNotFound(item.product_id))?;
            validate_quantity(&product, quantity)?;
        }

        let repo = CartRepository::new(self.pool);
        Ok(repo
            .update_item(cart.id, item_id, quantity, special_instructions)
            .await?)
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// `ItemNotFound` when the line is not in this cart; storage errors.
    pub async fn remove_item(&self, cart: &Cart, item_id: CartItemId) -> Result<(), CartError> {
        let removed = CartRepository::new(self.pool)
            .delete_item(cart.id, item_id)
            .await?;
        if !removed {
            return Err(CartError::ItemNotFound(item_id));
        }
        Ok(())
    }

    /// Remove every line from the cart.
    ///
    /// Called by checkout after order creation succeeds; the order engine
    /// never clears carts itself.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn clear(&self, cart: &Cart) -> Result<(), CartError> {
        CartRepository::new(self.pool).clear(cart.id).await?;
        Ok(())
    }

    /// Update the cart's requested delivery preferences.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn update_delivery(
        &self,
        cart: &Cart,
        requested_delivery_date: Option<chrono::NaiveDate>,
        delivery_time_slot: Option<String>,
    ) -> Result<Cart, CartError> {
        Ok(CartRepository::new(self.pool)
            .update_delivery(cart.id, requested_delivery_date, delivery_time_slot)
            .await?)
    }

    /// Fold a guest session's cart into the user's cart after login, then
    /// delete the guest cart.
    ///
    /// Returns the user cart, reloaded.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn merge_on_login(
        &self,
        user_id: UserId,
        session_id: Uuid,
    ) -> Result<Cart, CartError> {
        let repo = CartRepository::new(self.pool);
        let user_cart = self.get_or_create(Some(user_id), None).await?;

        let Some(guest_cart) = repo.get_by_session(session_id, Utc::now()).await? else {
            return Ok(user_cart);
        };

        let plan = plan_merge(&user_cart, &guest_cart);
        for (item_id, new_quantity) in &plan.bumps {
            repo.set_item_quantity(user_cart.id, *item_id, *new_quantity)
                .await?;
        }
        for insert in &plan.inserts {
            repo.insert_item(insert.clone()).await?;
        }
        if plan.requested_delivery_date.is_some() || plan.delivery_time_slot.is_some() {
            repo.update_delivery(
                user_cart.id,
                plan.requested_delivery_date,
                plan.delivery_time_slot.clone(),
            )
            .await?;
        }

        repo.delete(guest_cart.id).await?;
        tracing::debug!(user = %user_id, merged_lines = guest_cart.items.len(), "guest cart merged");

        Ok(repo
            .get_by_user(user_id)
            .await?
            .unwrap_or(user_cart))
    }

    /// Delete expired guest carts. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn cleanup_expired(&self) -> Result<u64, CartError> {
        let removed = CartRepository::new(self.pool)
            .delete_expired(Utc::now())
            .await?;
        if removed > 0 {
            tracing::info!(removed, "expired guest carts deleted");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use butter_crumb_core::Money;

    use super::*;
    use crate::models::cart::tests::{cart_with_items, item};
    use crate::models::product::tests::sample_product;

    fn product_with_rules(minimum: i32, increment: i32) -> Product {
        let mut product = sample_product();
        product.minimum_quantity = minimum;
        product.quantity_increment = increment;
        product
    }

    #[test]
    fn test_quantity_below_minimum_rejected() {
        let product = product_with_rules(6, 1);
        assert!(matches!(
            validate_quantity(&product, 5),
            Err(CartError::BelowMinimumQuantity { minimum: 6 })
        ));
        assert!(validate_quantity(&product, 6).is_ok());
    }

    #[test]
    fn test_quantity_increment_rejected() {
        let product = product_with_rules(1, 3);
        assert!(matches!(
            validate_quantity(&product, 4),
            Err(CartError::QuantityNotInIncrements { increment: 3 })
        ));
        assert!(validate_quantity(&product, 3).is_ok());
        assert!(validate_quantity(&product, 9).is_ok());
    }

    #[test]
    fn test_inactive_product_rejected() {
        let mut product = sample_product();
        product.is_active = false;
        assert!(matches!(
            validate_addition(&product, 1),
            Err(CartError::ProductInactive)
        ));
    }

    #[test]
    fn test_out_of_stock_respects_backorder() {
        let mut product = sample_product();
        product.stock_quantity = 0;
        assert!(matches!(
            validate_addition(&product, 1),
            Err(CartError::OutOfStock)
        ));

        product.allow_backorder = true;
        assert!(validate_addition(&product, 1).is_ok());
    }

    #[test]
    fn test_plan_addition_merges_identical_instructions() {
        let product = sample_product();
        let cart = cart_with_items(vec![item(1, 1, 2, 850, None)]);

        let plan = plan_addition(&cart, &product, 3, None).expect("valid addition");
        assert_eq!(
            plan,
            AddPlan::Merge {
                item_id: CartItemId::new(1),
                new_quantity: 5,
            }
        );
    }

    #[test]
    fn test_plan_addition_splits_on_differing_instructions() {
        let product = sample_product();
        let cart = cart_with_items(vec![item(1, 1, 2, 850, None)]);

        let plan = plan_addition(&cart, &product, 1, Some("sliced".to_owned()))
            .expect("valid addition");
        match plan {
            AddPlan::Insert(new_item) => {
                assert_eq!(new_item.product_id, product.id);
                assert_eq!(new_item.quantity, 1);
                // Fresh lines snapshot the live catalog price
                assert_eq!(new_item.unit_price, product.price);
                assert_eq!(new_item.special_instructions.as_deref(), Some("sliced"));
            }
            AddPlan::Merge { .. } => panic!("differing instructions must not merge"),
        }
    }

    #[test]
    fn test_plan_addition_rejection_leaves_no_plan() {
        let product = product_with_rules(1, 3);
        let cart = cart_with_items(vec![]);
        assert!(plan_addition(&cart, &product, 4, None).is_err());
    }

    #[test]
    fn test_plan_merge_bumps_and_inserts() {
        let user_cart = cart_with_items(vec![item(1, 10, 2, 500, None)]);
        let mut guest_cart = cart_with_items(vec![
            item(2, 10, 1, 450, None),                    // merges with user line
            item(3, 10, 1, 450, Some("gift wrapped")),    // differing instructions
            item(4, 11, 2, 300, None),                    // new product
        ]);
        guest_cart.user_id = None;
        guest_cart.session_id = Some(Uuid::new_v4());

        let plan = plan_merge(&user_cart, &guest_cart);

        assert_eq!(plan.bumps, vec![(CartItemId::new(1), 3)]);
        assert_eq!(plan.inserts.len(), 2);
        // Moved lines keep the guest's price snapshot
        assert_eq!(plan.inserts[0].unit_price, Money::from_cents(450));
        assert_eq!(
            plan.inserts[0].special_instructions.as_deref(),
            Some("gift wrapped")
        );
        assert_eq!(plan.inserts[1].product_id, ProductId::new(11));
    }

    #[test]
    fn test_plan_merge_copies_delivery_prefs_only_when_unset() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date");

        let mut guest_cart = cart_with_items(vec![]);
        guest_cart.requested_delivery_date = Some(date);
        guest_cart.delivery_time_slot = Some("morning".to_owned());

        let bare_user_cart = cart_with_items(vec![]);
        let plan = plan_merge(&bare_user_cart, &guest_cart);
        assert_eq!(plan.requested_delivery_date, Some(date));
        assert_eq!(plan.delivery_time_slot.as_deref(), Some("morning"));

        let mut opinionated_user_cart = cart_with_items(vec![]);
        opinionated_user_cart.requested_delivery_date =
            Some(chrono::NaiveDate::from_ymd_opt(2026, 3, 20).expect("valid date"));
        opinionated_user_cart.delivery_time_slot = Some("evening".to_owned());
        let plan = plan_merge(&opinionated_user_cart, &guest_cart);
        assert!(plan.requested_delivery_date.is_none());
        assert!(plan.delivery_time_slot.is_none());
    }

    #[test]
    fn test_empty_merge_plan() {
        let plan = plan_merge(&cart_with_items(vec![]), &cart_with_items(vec![]));
        assert!(plan.is_empty());
    }
}
