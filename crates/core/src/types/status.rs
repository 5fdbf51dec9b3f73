//! Status enums for orders, payments, fulfillment, and discounts.
//!
//! Statuses are closed enums rather than free-form strings: each variant
//! carries its own set of valid successor states, so an illegal transition
//! is unrepresentable at the call site instead of being a runtime string
//! comparison.

use serde::{Deserialize, Serialize};

/// Order fulfillment lifecycle status.
///
/// The transition graph is one-directional:
///
/// ```text
/// pending          -> {confirmed, cancelled}
/// confirmed        -> {preparing, cancelled}
/// preparing        -> {ready}
/// ready            -> {out_for_delivery, picked_up}
/// out_for_delivery -> {delivered}
/// picked_up        -> {}   terminal
/// delivered        -> {}   terminal
/// cancelled        -> {}   terminal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    PickedUp,
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::Ready,
        Self::OutForDelivery,
        Self::Delivered,
        Self::PickedUp,
        Self::Cancelled,
    ];

    /// The set of statuses this status may transition into.
    #[must_use]
    pub const fn successors(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::Preparing, Self::Cancelled],
            Self::Preparing => &[Self::Ready],
            Self::Ready => &[Self::OutForDelivery, Self::PickedUp],
            Self::OutForDelivery => &[Self::Delivered],
            Self::Delivered | Self::PickedUp | Self::Cancelled => &[],
        }
    }

    /// Whether a transition from `self` into `target` is allowed.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        self.successors().contains(&target)
    }

    /// Whether this status has no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Whether an order in this status may still be cancelled.
    ///
    /// Equivalent to having `Cancelled` among the successors; only
    /// `pending` and `confirmed` orders qualify.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(Self::Cancelled)
    }

    /// Whether an order in this status may still be modified by the customer.
    #[must_use]
    pub fn is_modifiable(&self) -> bool {
        *self == Self::Pending
    }

    /// Whether this status marks the order as fulfilled.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Delivered | Self::PickedUp)
    }

    /// Canonical snake_case name, matching the database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::PickedUp => "picked_up",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "preparing" => Ok(Self::Preparing),
            "ready" => Ok(Self::Ready),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "picked_up" => Ok(Self::PickedUp),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Payment status, toggled by an external collaborator once a payment
/// provider confirms funds. Independent of the fulfillment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    /// Canonical snake_case name, matching the database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "refunded" => Ok(Self::Refunded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid payment status: {s}")),
        }
    }
}

/// How an order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    #[default]
    Delivery,
    Pickup,
}

impl FulfillmentType {
    /// Canonical snake_case name, matching the database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delivery => "delivery",
            Self::Pickup => "pickup",
        }
    }
}

impl std::fmt::Display for FulfillmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FulfillmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(Self::Delivery),
            "pickup" => Ok(Self::Pickup),
            _ => Err(format!("invalid fulfillment type: {s}")),
        }
    }
}

/// How a promo code's value is applied to an order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

impl DiscountType {
    /// Canonical snake_case name, matching the database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::FixedAmount => "fixed_amount",
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed_amount" => Ok(Self::FixedAmount),
            _ => Err(format!("invalid discount type: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_transition_graph() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Preparing));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Preparing.can_transition_to(Ready));
        assert!(Ready.can_transition_to(OutForDelivery));
        assert!(Ready.can_transition_to(PickedUp));
        assert!(OutForDelivery.can_transition_to(Delivered));

        // Skipping states or moving backwards is never allowed
        assert!(!Pending.can_transition_to(Preparing));
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Preparing.can_transition_to(Cancelled));
        assert!(!Ready.can_transition_to(Confirmed));
        assert!(!Delivered.can_transition_to(Cancelled));
    }

    #[test]
    fn test_no_self_transitions() {
        for status in OrderStatus::ALL {
            assert!(
                !status.can_transition_to(status),
                "{status} must not be its own successor"
            );
        }
    }

    #[test]
    fn test_terminal_states() {
        use OrderStatus::*;

        for status in [Delivered, PickedUp, Cancelled] {
            assert!(status.is_terminal());
        }
        for status in [Pending, Confirmed, Preparing, Ready, OutForDelivery] {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn test_is_cancellable_matches_graph() {
        use OrderStatus::*;

        assert!(Pending.is_cancellable());
        assert!(Confirmed.is_cancellable());
        for status in [Preparing, Ready, OutForDelivery, Delivered, PickedUp, Cancelled] {
            assert!(!status.is_cancellable(), "{status} must not be cancellable");
        }
    }

    #[test]
    fn test_str_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(
                OrderStatus::from_str(status.as_str()),
                Ok(status),
                "{status} must survive a string round trip"
            );
        }
        assert!(OrderStatus::from_str("shipped").is_err());
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).expect("serialize");
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_discount_type_roundtrip() {
        assert_eq!(
            DiscountType::from_str("percentage"),
            Ok(DiscountType::Percentage)
        );
        assert_eq!(
            DiscountType::from_str("fixed_amount"),
            Ok(DiscountType::FixedAmount)
        );
        assert!(DiscountType::from_str("bogo").is_err());
    }
}
