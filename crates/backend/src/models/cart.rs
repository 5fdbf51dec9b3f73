//! Cart domain types.
//!
//! A cart belongs to exactly one authenticated user or one guest session,
//! never both. Line items snapshot the product price at add-time so a later
//! catalog price change does not silently reprice a cart.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use butter_crumb_core::{CartId, CartItemId, Money, ProductId, UserId};

/// How long a guest cart lives before the expiry sweep removes it.
pub const GUEST_CART_TTL_DAYS: i64 = 7;

/// A shopping cart for an authenticated user or a guest session.
#[derive(Debug, Clone)]
pub struct Cart {
    pub id: CartId,
    /// Set for authenticated users; mutually exclusive with `session_id`.
    pub user_id: Option<UserId>,
    /// Set for guest sessions; mutually exclusive with `user_id`.
    pub session_id: Option<Uuid>,

    // Requested delivery preferences, carried over to checkout
    pub requested_delivery_date: Option<NaiveDate>,
    pub delivery_time_slot: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Guest carts only; user carts never expire.
    pub expires_at: Option<DateTime<Utc>>,

    pub items: Vec<CartItem>,
}

impl Cart {
    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Sum of line totals at snapshot prices.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a guest cart has passed its expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires < now)
    }

    /// Expiry timestamp for a guest cart created at `now`.
    #[must_use]
    pub fn guest_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(GUEST_CART_TTL_DAYS)
    }

    /// Find the line that an addition of `product_id` with these
    /// instructions would merge into.
    ///
    /// Lines merge only when the special instructions match exactly;
    /// differing instructions produce independent lines for the same
    /// product.
    #[must_use]
    pub fn mergeable_line(
        &self,
        product_id: ProductId,
        special_instructions: Option<&str>,
    ) -> Option<&CartItem> {
        self.items.iter().find(|item| {
            item.product_id == product_id
                && item.special_instructions.as_deref() == special_instructions
        })
    }
}

/// A single line in a cart.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: i32,
    /// Price snapshot taken when the line was added.
    pub unit_price: Money,
    /// Per-line note, e.g. "Happy Birthday June!".
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    /// Line total at the snapshot price.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// Input for inserting a cart line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewCartItem {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
    pub special_instructions: Option<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn cart_with_items(items: Vec<CartItem>) -> Cart {
        let now = Utc::now();
        Cart {
            id: CartId::new(1),
            user_id: Some(UserId::new(1)),
            session_id: None,
            requested_delivery_date: None,
            delivery_time_slot: None,
            created_at: now,
            updated_at: now,
            expires_at: None,
            items,
        }
    }

    pub(crate) fn item(
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

    #[test]
    fn test_subtotal_and_count() {
        let cart = cart_with_items(vec![item(1, 1, 2, 500, None), item(2, 2, 1, 300, None)]);
        assert_eq!(cart.subtotal(), Money::from_cents(1300));
        assert_eq!(cart.item_count(), 3);
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_empty_cart() {
        let cart = cart_with_items(vec![]);
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), Money::ZERO);
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_guest_expiry_window() {
        let now = Utc::now();
        let mut cart = cart_with_items(vec![]);
        cart.user_id = None;
        cart.session_id = Some(Uuid::new_v4());
        cart.expires_at = Some(Cart::guest_expiry(now));

        assert!(!cart.is_expired(now));
        assert!(!cart.is_expired(now + Duration::days(GUEST_CART_TTL_DAYS)));
        assert!(cart.is_expired(now + Duration::days(GUEST_CART_TTL_DAYS) + Duration::seconds(1)));
    }

    #[test]
    fn test_mergeable_line_requires_identical_instructions() {
        let cart = cart_with_items(vec![
            item(1, 7, 1, 500, None),
            item(2, 7, 1, 500, Some("candles please")),
        ]);

        let plain = cart.mergeable_line(ProductId::new(7), None).expect("line");
        assert_eq!(plain.id, CartItemId::new(1));

        let noted = cart
            .mergeable_line(ProductId::new(7), Some("candles please"))
            .expect("line");
        assert_eq!(noted.id, CartItemId::new(2));

        assert!(cart.mergeable_line(ProductId::new(7), Some("no candles")).is_none());
        assert!(cart.mergeable_line(ProductId::new(8), None).is_none());
    }
}
