//! Integration tests for the Order aggregate.
//!
//! These tests drive orders through the public command/apply API and check
//! the lifecycle table and aggregate reconstruction from events.

use common::{ProductId, UserId};
use domain::{
    Aggregate, DomainEvent, Money, Order, OrderDetails, OrderError, OrderEvent, OrderItem,
    OrderNumber, OrderNumberGenerator, OrderStatus, PaymentStatus, ProductSnapshot, Transition,
};

const TRANSITIONS: [Transition; 5] = [
    Transition::Confirm,
    Transition::StartProcessing,
    Transition::Ship,
    Transition::Deliver,
    Transition::Cancel,
];

fn line(product_id: i64, quantity: u32, cents: i64) -> OrderItem {
    OrderItem::new(
        ProductSnapshot::new(ProductId::new(product_id), format!("Product {product_id}")),
        quantity,
        Money::from_cents(cents),
    )
}

fn place(items: Vec<OrderItem>) -> (Order, Vec<OrderEvent>) {
    let mut order = Order::default();
    let events = order
        .place(
            OrderNumberGenerator::new().generate(),
            UserId::new(1),
            OrderDetails::new("1 Main Street"),
            items,
        )
        .unwrap();
    order.apply_events(events.clone());
    (order, events)
}

fn apply(order: &mut Order, history: &mut Vec<OrderEvent>, events: Vec<OrderEvent>) {
    history.extend(events.iter().cloned());
    order.apply_events(events);
}

mod order_lifecycle {
    use super::*;

    #[test]
    fn complete_order_lifecycle() {
        let (mut order, mut history) = place(vec![line(10, 2, 1999), line(11, 1, 500)]);
        assert_eq!(order.total_amount(), Money::from_cents(4498));

        let events = order.confirm().unwrap();
        apply(&mut order, &mut history, events);
        let events = order.start_processing().unwrap();
        apply(&mut order, &mut history, events);
        let events = order.ship().unwrap();
        apply(&mut order, &mut history, events);
        let events = order.deliver().unwrap();
        apply(&mut order, &mut history, events);

        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.shipped_at().is_some());
        assert!(order.delivered_at().is_some());

        let types: Vec<_> = history.iter().map(DomainEvent::event_type).collect();
        assert_eq!(
            types,
            vec![
                "OrderPlaced",
                "OrderConfirmed",
                "ProcessingStarted",
                "OrderShipped",
                "OrderDelivered"
            ]
        );
    }

    #[test]
    fn cancel_order_at_various_stages() {
        let cases: &[&[Transition]] = &[
            &[],
            &[Transition::Confirm],
            &[Transition::Confirm, Transition::StartProcessing],
        ];

        for path in cases {
            let (mut order, _) = place(vec![line(1, 1, 100)]);
            for transition in *path {
                let events = order.transition(*transition, None).unwrap();
                order.apply_events(events);
            }

            let events = order.cancel(Some("customer request".to_string())).unwrap();
            order.apply_events(events);
            assert_eq!(order.status(), OrderStatus::Cancelled);
            assert_eq!(order.cancellation_reason(), Some("customer request"));
        }
    }

    #[test]
    fn aggregate_reconstruction_from_events() {
        let (mut order, mut history) = place(vec![line(10, 2, 1999), line(11, 1, 500)]);
        let events = order.update_payment_status(PaymentStatus::Paid).unwrap();
        apply(&mut order, &mut history, events);
        let events = order.amend_notes("leave at the door").unwrap();
        apply(&mut order, &mut history, events);

        let serialized: Vec<String> = history
            .iter()
            .map(|event| serde_json::to_string(event).unwrap())
            .collect();
        let replayed: Vec<OrderEvent> = serialized
            .iter()
            .map(|json| serde_json::from_str(json).unwrap())
            .collect();

        let mut rebuilt = Order::default();
        rebuilt.apply_events(replayed);

        assert_eq!(rebuilt.status(), OrderStatus::Confirmed);
        assert_eq!(rebuilt.payment_status(), PaymentStatus::Paid);
        assert_eq!(rebuilt.notes(), Some("leave at the door"));
        assert_eq!(rebuilt.order_number(), order.order_number());
        assert_eq!(rebuilt.total_amount(), order.total_amount());
        assert_eq!(rebuilt.items(), order.items());
    }
}

mod transition_table {
    use super::*;

    fn reach(status: OrderStatus) -> Order {
        let path: &[Transition] = match status {
            OrderStatus::Pending => &[],
            OrderStatus::Confirmed => &[Transition::Confirm],
            OrderStatus::Processing => &[Transition::Confirm, Transition::StartProcessing],
            OrderStatus::Shipped => &[
                Transition::Confirm,
                Transition::StartProcessing,
                Transition::Ship,
            ],
            OrderStatus::Delivered => &[
                Transition::Confirm,
                Transition::StartProcessing,
                Transition::Ship,
                Transition::Deliver,
            ],
            OrderStatus::Cancelled => &[Transition::Cancel],
            OrderStatus::Returned => panic!("no lifecycle operation reaches RETURNED"),
        };

        let (mut order, _) = place(vec![line(1, 1, 100)]);
        for transition in path {
            let events = order.transition(*transition, None).unwrap();
            order.apply_events(events);
        }
        assert_eq!(order.status(), status);
        order
    }

    #[test]
    fn aggregate_follows_status_table() {
        let reachable = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ];

        for status in reachable {
            for transition in TRANSITIONS {
                let order = reach(status);
                match (status.transition(transition), order.transition(transition, None)) {
                    (Some(expected), Ok(events)) => {
                        let mut order = order;
                        order.apply_events(events);
                        assert_eq!(order.status(), expected, "{status} --{transition}-->");
                    }
                    (None, Err(OrderError::InvalidStateTransition { current_state, .. })) => {
                        assert_eq!(current_state, status);
                    }
                    (expected, actual) => {
                        panic!("{status} --{transition}--> expected {expected:?}, got {actual:?}")
                    }
                }
            }
        }
    }

    #[test]
    fn terminal_statuses_reject_everything() {
        for status in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            let order = reach(status);
            for transition in TRANSITIONS {
                assert!(order.transition(transition, None).is_err());
            }
            assert!(order.update_payment_status(PaymentStatus::Refunded).is_err());
        }
        for transition in TRANSITIONS {
            assert!(!OrderStatus::Returned.allows(transition));
        }
    }

    #[test]
    fn error_message_names_action_and_state() {
        let order = reach(OrderStatus::Pending);
        let err = order.ship().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state transition: cannot ship from PENDING state"
        );
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn cannot_place_without_lines() {
        let result = Order::default().place(
            OrderNumber::new("ORD202610191432ABCDE"),
            UserId::new(1),
            OrderDetails::new("1 Main Street"),
            Vec::new(),
        );
        assert_eq!(result.unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn cannot_place_twice() {
        let (order, _) = place(vec![line(1, 1, 100)]);
        let result = order.place(
            OrderNumber::new("ORD202610191432ABCDE"),
            UserId::new(1),
            OrderDetails::new("1 Main Street"),
            vec![line(1, 1, 100)],
        );
        assert_eq!(result.unwrap_err(), OrderError::AlreadyPlaced);
    }

    #[test]
    fn rejects_non_positive_price() {
        let result = Order::default().place(
            OrderNumber::new("ORD202610191432ABCDE"),
            UserId::new(1),
            OrderDetails::new("1 Main Street"),
            vec![line(1, 1, 100), line(2, 1, -5)],
        );
        assert!(matches!(
            result,
            Err(OrderError::InvalidPrice { product_id, .. }) if product_id == ProductId::new(2)
        ));
    }
}
