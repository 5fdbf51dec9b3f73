//! Property tests for the order status state machine.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Utc};

use butter_crumb_core::OrderStatus;

// =============================================================================
// Graph shape
// =============================================================================

#[test]
fn test_graph_matches_workflow() {
    use OrderStatus::*;

    let expected: &[(OrderStatus, &[OrderStatus])] = &[
        (Pending, &[Confirmed, Cancelled]),
        (Confirmed, &[Preparing, Cancelled]),
        (Preparing, &[Ready]),
        (Ready, &[OutForDelivery, PickedUp]),
        (OutForDelivery, &[Delivered]),
        (Delivered, &[]),
        (PickedUp, &[]),
        (Cancelled, &[]),
    ];

    for (status, successors) in expected {
        assert_eq!(
            status.successors(),
            *successors,
            "successors of {status} changed"
        );
    }
}

#[test]
fn test_every_status_reachable_from_pending() {
    // Walk the graph breadth-first from pending
    let mut reachable = vec![OrderStatus::Pending];
    let mut frontier = vec![OrderStatus::Pending];
    while let Some(status) = frontier.pop() {
        for &next in status.successors() {
            if !reachable.contains(&next) {
                reachable.push(next);
                frontier.push(next);
            }
        }
    }

    for status in OrderStatus::ALL {
        assert!(reachable.contains(&status), "{status} is unreachable");
    }
}

#[test]
fn test_terminal_iff_no_successors() {
    for status in OrderStatus::ALL {
        assert_eq!(status.is_terminal(), status.successors().is_empty());
    }
}

#[test]
fn test_cancellable_iff_pending_or_confirmed() {
    for status in OrderStatus::ALL {
        let expected = matches!(status, OrderStatus::Pending | OrderStatus::Confirmed);
        assert_eq!(status.is_cancellable(), expected, "{status}");
    }
}

// =============================================================================
// Transition bookkeeping on orders
// =============================================================================

mod transitions {
    use butter_crumb_backend::models::{AddressSnapshot, Order, OrderTotals, TransitionError};
    use butter_crumb_core::{
        FulfillmentType, Money, OrderId, OrderNumber, PaymentStatus, UserId,
    };

    use super::*;

    fn order_in(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(1),
            order_number: OrderNumber::parse("BC-260301-A1B2").unwrap(),
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
            requested_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
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

    fn lifecycle_stamps(order: &Order) -> [Option<DateTime<Utc>>; 5] {
        [
            order.confirmed_at,
            order.preparing_at,
            order.ready_at,
            order.completed_at,
            order.cancelled_at,
        ]
    }

    #[test]
    fn test_valid_transitions_stamp_exactly_one_new_timestamp() {
        for from in OrderStatus::ALL {
            for &to in from.successors() {
                let order = order_in(from);
                let updated = order.apply_transition(to, None, Utc::now()).unwrap();

                let newly_stamped = lifecycle_stamps(&order)
                    .iter()
                    .zip(lifecycle_stamps(&updated).iter())
                    .filter(|(before, after)| before.is_none() && after.is_some())
                    .count();

                // out_for_delivery is the only state without its own stamp
                let expected = usize::from(to != OrderStatus::OutForDelivery);
                assert_eq!(newly_stamped, expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_invalid_transitions_error_and_leave_order_untouched() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if from.can_transition_to(to) {
                    continue;
                }
                let order = order_in(from);
                let before = order.clone();

                let result = order.apply_transition(to, Some("nope"), Utc::now());
                assert_eq!(result, Err(TransitionError { from, to }), "{from} -> {to}");
                assert_eq!(order, before, "{from} -> {to} mutated the order");
            }
        }
    }

    #[test]
    fn test_cancellation_reason_is_optional() {
        let with_reason = order_in(OrderStatus::Pending)
            .apply_transition(OrderStatus::Cancelled, Some("changed mind"), Utc::now())
            .unwrap();
        assert_eq!(with_reason.cancellation_reason.as_deref(), Some("changed mind"));

        let without_reason = order_in(OrderStatus::Confirmed)
            .apply_transition(OrderStatus::Cancelled, None, Utc::now())
            .unwrap();
        assert!(without_reason.cancellation_reason.is_none());
        assert!(without_reason.cancelled_at.is_some());
    }

    #[test]
    fn test_pickup_and_delivery_both_complete_the_order() {
        let delivered = order_in(OrderStatus::OutForDelivery)
            .apply_transition(OrderStatus::Delivered, None, Utc::now())
            .unwrap();
        let picked_up = order_in(OrderStatus::Ready)
            .apply_transition(OrderStatus::PickedUp, None, Utc::now())
            .unwrap();

        assert!(delivered.completed_at.is_some());
        assert!(picked_up.completed_at.is_some());
        assert!(delivered.status.is_completed());
        assert!(picked_up.status.is_completed());
    }
}
