//! Order domain types and the pure half of the lifecycle state machine.
//!
//! An order is an immutable snapshot of what was bought and where it goes;
//! only `status` and `payment_status` change afterwards, and `status` only
//! moves forward through the graph defined on
//! [`OrderStatus`](butter_crumb_core::OrderStatus).
//!
//! [`Order::apply_transition`] is pure: it returns the transitioned copy and
//! never mutates the receiver, so a rejected transition cannot leave a
//! half-updated order behind.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use butter_crumb_core::{
    AddressId, FulfillmentType, Money, OrderId, OrderItemId, OrderNumber, OrderStatus,
    PaymentStatus, ProductId, UserId,
};

use super::address::AddressSnapshot;
use super::product::Product;

/// Maximum characters of the long description carried into a snapshot.
const SNAPSHOT_DESCRIPTION_LIMIT: usize = 200;

/// An illegal status transition request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot transition from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Immutable copy of a product's commerce-relevant fields, embedded in each
/// order item for historical accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    /// Catalog price at purchase time; the line's `unit_price` may differ if
    /// the cart snapshotted an older price.
    pub price: Money,
    pub description: Option<String>,
    pub is_gluten_free: bool,
    pub is_dairy_free: bool,
    pub is_vegan: bool,
}

impl ProductSnapshot {
    /// Capture a snapshot of the product as it exists right now.
    #[must_use]
    pub fn of(product: &Product) -> Self {
        let description = product.short_description.clone().or_else(|| {
            let description = &product.description;
            if description.is_empty() {
                None
            } else {
                Some(description.chars().take(SNAPSHOT_DESCRIPTION_LIMIT).collect())
            }
        });

        Self {
            id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone(),
            price: product.price,
            description,
            is_gluten_free: product.is_gluten_free,
            is_dairy_free: product.is_dairy_free,
            is_vegan: product.is_vegan,
        }
    }
}

/// Order pricing, computed once at creation and never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Totals for a given subtotal.
    ///
    /// Shipping and tax are fixed at zero: that business logic is
    /// unimplemented, and keeping the columns explicit beats hiding them in
    /// the subtotal.
    #[must_use]
    pub fn from_subtotal(subtotal: Money) -> Self {
        let shipping_cost = Money::ZERO;
        let tax_amount = Money::ZERO;
        let discount_amount = Money::ZERO;
        Self {
            subtotal,
            shipping_cost,
            tax_amount,
            discount_amount,
            total: subtotal + shipping_cost + tax_amount - discount_amount,
        }
    }
}

/// A customer order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,

    // Stored-address references (informational; the snapshots are canonical)
    pub shipping_address_id: Option<AddressId>,
    pub billing_address_id: Option<AddressId>,
    pub shipping_address: AddressSnapshot,
    /// Absent when billing is the same as shipping; readers fall back.
    pub billing_address: Option<AddressSnapshot>,

    pub totals: OrderTotals,

    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    /// Opaque reference from the payment provider, set by the collaborator
    /// that confirms funds.
    pub payment_reference: Option<String>,

    pub fulfillment_type: FulfillmentType,
    pub requested_date: NaiveDate,
    pub requested_time_slot: Option<String>,

    pub contact_email: String,
    pub contact_phone: Option<String>,

    pub customer_notes: Option<String>,
    /// Staff-only notes, never shown to the customer.
    pub internal_notes: Option<String>,

    // Lifecycle timestamps, each stamped exactly once by its transition
    pub confirmed_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub items: Vec<OrderItem>,
}

impl Order {
    /// Whether the order may still be cancelled.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.status.is_cancellable()
    }

    /// Whether the customer may still modify the order.
    #[must_use]
    pub fn is_modifiable(&self) -> bool {
        self.status.is_modifiable()
    }

    /// The billing snapshot, falling back to shipping when billing was the
    /// same as shipping at checkout.
    #[must_use]
    pub fn billing_address(&self) -> &AddressSnapshot {
        self.billing_address.as_ref().unwrap_or(&self.shipping_address)
    }

    /// Apply a status transition, returning the updated copy.
    ///
    /// Exactly one lifecycle timestamp is stamped per successful call:
    /// `confirmed_at`, `preparing_at`, or `ready_at` for the corresponding
    /// states, `completed_at` for `delivered`/`picked_up`, and
    /// `cancelled_at` (plus the stored reason) for `cancelled`. Re-entering
    /// a state is rejected like any other illegal transition, so a stamp
    /// can never be overwritten.
    ///
    /// Inventory release on cancellation is coordinated by the lifecycle
    /// engine, not here; this function is pure bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when `target` is not among the current
    /// status's successors. The receiver is unmodified either way.
    pub fn apply_transition(
        &self,
        target: OrderStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        if !self.status.can_transition_to(target) {
            return Err(TransitionError {
                from: self.status,
                to: target,
            });
        }

        let mut updated = self.clone();
        updated.status = target;
        updated.updated_at = now;

        match target {
            OrderStatus::Confirmed => updated.confirmed_at = Some(now),
            OrderStatus::Preparing => updated.preparing_at = Some(now),
            OrderStatus::Ready => updated.ready_at = Some(now),
            OrderStatus::Delivered | OrderStatus::PickedUp => updated.completed_at = Some(now),
            OrderStatus::Cancelled => {
                updated.cancelled_at = Some(now);
                updated.cancellation_reason = reason.map(str::to_owned);
            }
            OrderStatus::OutForDelivery | OrderStatus::Pending => {}
        }

        Ok(updated)
    }
}

/// A single line in an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub product_snapshot: ProductSnapshot,
    pub quantity: i32,
    pub unit_price: Money,
    /// `unit_price * quantity`, stored rather than derived.
    pub subtotal: Money,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filter criteria for the admin order listing.
#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub fulfillment_type: Option<FulfillmentType>,
    /// Inclusive requested-date range.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Matches order number or contact email, case-insensitively.
    pub search: Option<String>,
}

/// A fully assembled order awaiting persistence.
///
/// The store persists the order, its items, and the stock reservations as
/// one transactional unit.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub user_id: Option<UserId>,
    pub shipping_address_id: Option<AddressId>,
    pub billing_address_id: Option<AddressId>,
    pub shipping_address: AddressSnapshot,
    pub billing_address: Option<AddressSnapshot>,
    pub totals: OrderTotals,
    pub payment_method: Option<String>,
    pub fulfillment_type: FulfillmentType,
    pub requested_date: NaiveDate,
    pub requested_time_slot: Option<String>,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub customer_notes: Option<String>,
    pub items: Vec<NewOrderItem>,
    pub reservations: Vec<StockReservation>,
}

/// A single line of a [`NewOrder`].
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub product_snapshot: ProductSnapshot,
    pub quantity: i32,
    pub unit_price: Money,
    pub subtotal: Money,
    pub special_instructions: Option<String>,
}

/// A stock decrement to apply atomically while persisting a [`NewOrder`].
///
/// Only items whose product tracks inventory produce a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockReservation {
    pub product_id: ProductId,
    pub quantity: i32,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(1),
            order_number: OrderNumber::parse("BC-260301-A1B2").expect("valid number"),
            user_id: Some(UserId::new(1)),
            status,
            shipping_address_id: None,
            billing_address_id: None,
            shipping_address: AddressSnapshot {
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
            },
            billing_address: None,
            totals: OrderTotals::from_subtotal(Money::from_cents(1300)),
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            payment_reference: None,
            fulfillment_type: FulfillmentType::Delivery,
            requested_date: NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date"),
            requested_time_slot: None,
            contact_email: "june@example.com".to_owned(),
            contact_phone: None,
            customer_notes: None,
            internal_notes: None,
            confirmed_at: None,
            preparing_at: None,
            ready_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        }
    }

    fn timestamps(order: &Order) -> [Option<DateTime<Utc>>; 5] {
        [
            order.confirmed_at,
            order.preparing_at,
            order.ready_at,
            order.completed_at,
            order.cancelled_at,
        ]
    }

    #[test]
    fn test_each_transition_stamps_exactly_one_timestamp() {
        for from in OrderStatus::ALL {
            for &to in from.successors() {
                let order = sample_order(from);
                let now = Utc::now();
                let updated = order.apply_transition(to, None, now).expect("valid transition");

                assert_eq!(updated.status, to);
                let before = timestamps(&order);
                let after = timestamps(&updated);
                let newly_set = before
                    .iter()
                    .zip(after.iter())
                    .filter(|(b, a)| b.is_none() && a.is_some())
                    .count();
                let expected = usize::from(to != OrderStatus::OutForDelivery);
                assert_eq!(
                    newly_set, expected,
                    "{from} -> {to} stamped {newly_set} timestamps"
                );
            }
        }
    }

    #[test]
    fn test_invalid_transitions_leave_order_unchanged() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if from.can_transition_to(to) {
                    continue;
                }
                let order = sample_order(from);
                let before = order.clone();
                let result = order.apply_transition(to, None, Utc::now());

                assert_eq!(
                    result,
                    Err(TransitionError { from, to }),
                    "{from} -> {to} must be rejected"
                );
                assert_eq!(order, before, "{from} -> {to} must not mutate the order");
            }
        }
    }

    #[test]
    fn test_cancellation_stores_reason() {
        let order = sample_order(OrderStatus::Pending);
        let cancelled = order
            .apply_transition(OrderStatus::Cancelled, Some("changed mind"), Utc::now())
            .expect("cancellable");

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("changed mind"));
    }

    #[test]
    fn test_completed_at_for_both_terminal_fulfillments() {
        let delivered = sample_order(OrderStatus::OutForDelivery)
            .apply_transition(OrderStatus::Delivered, None, Utc::now())
            .expect("deliverable");
        assert!(delivered.completed_at.is_some());

        let picked_up = sample_order(OrderStatus::Ready)
            .apply_transition(OrderStatus::PickedUp, None, Utc::now())
            .expect("collectable");
        assert!(picked_up.completed_at.is_some());
    }

    #[test]
    fn test_totals_from_subtotal() {
        let totals = OrderTotals::from_subtotal(Money::from_cents(1300));
        assert_eq!(totals.subtotal, Money::from_cents(1300));
        assert_eq!(totals.shipping_cost, Money::ZERO);
        assert_eq!(totals.tax_amount, Money::ZERO);
        assert_eq!(totals.discount_amount, Money::ZERO);
        assert_eq!(totals.total, Money::from_cents(1300));
    }

    #[test]
    fn test_billing_falls_back_to_shipping() {
        let order = sample_order(OrderStatus::Pending);
        assert_eq!(order.billing_address(), &order.shipping_address);
    }

    #[test]
    fn test_snapshot_prefers_short_description() {
        let mut product = crate::models::product::tests::sample_product();
        product.short_description = Some("Tangy and chewy.".to_owned());
        let snapshot = ProductSnapshot::of(&product);
        assert_eq!(snapshot.description.as_deref(), Some("Tangy and chewy."));
        assert_eq!(snapshot.sku, product.sku);
        assert_eq!(snapshot.price, product.price);
    }

    #[test]
    fn test_snapshot_truncates_long_description() {
        let mut product = crate::models::product::tests::sample_product();
        product.short_description = None;
        product.description = "x".repeat(500);
        let snapshot = ProductSnapshot::of(&product);
        assert_eq!(
            snapshot.description.map(|d| d.len()),
            Some(SNAPSHOT_DESCRIPTION_LIMIT)
        );
    }
}
