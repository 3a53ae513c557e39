use common::{ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, Money, Order, OrderDetails, OrderEvent, OrderItem, OrderNumberGenerator,
    ProductSnapshot,
};

fn make_items(count: i64) -> Vec<OrderItem> {
    (1..=count)
        .map(|v| {
            OrderItem::new(
                ProductSnapshot::new(ProductId::new(v), format!("Product {v}")),
                1,
                Money::from_cents(100 * v),
            )
        })
        .collect()
}

fn placed_events(count: i64) -> Vec<OrderEvent> {
    Order::default()
        .place(
            OrderNumberGenerator::new().generate(),
            UserId::new(1),
            OrderDetails::new("1 Main Street"),
            make_items(count),
        )
        .unwrap()
}

fn bench_generate_order_number(c: &mut Criterion) {
    let generator = OrderNumberGenerator::new();

    c.bench_function("domain/generate_order_number", |b| {
        b.iter(|| generator.generate());
    });
}

fn bench_place_order(c: &mut Criterion) {
    c.bench_function("domain/place_order_10_items", |b| {
        b.iter(|| {
            let mut order = Order::default();
            order.apply_events(placed_events(10));
            order.total_amount()
        });
    });
}

fn bench_full_lifecycle(c: &mut Criterion) {
    c.bench_function("domain/full_lifecycle", |b| {
        b.iter(|| {
            let mut order = Order::default();
            order.apply_events(placed_events(3));
            order.apply_events(order.confirm().unwrap());
            order.apply_events(order.start_processing().unwrap());
            order.apply_events(order.ship().unwrap());
            order.apply_events(order.deliver().unwrap());
        });
    });
}

fn bench_reconstruction_from_json(c: &mut Criterion) {
    let mut order = Order::default();
    let mut history = placed_events(50);
    order.apply_events(history.clone());
    let confirmed = order.confirm().unwrap();
    order.apply_events(confirmed.clone());
    history.extend(confirmed);
    let payloads: Vec<serde_json::Value> = history
        .iter()
        .map(|event| serde_json::to_value(event).unwrap())
        .collect();

    c.bench_function("domain/reconstruct_50_lines", |b| {
        b.iter(|| {
            let mut order = Order::default();
            for payload in &payloads {
                let event: OrderEvent = serde_json::from_value(payload.clone()).unwrap();
                order.apply(event);
            }
        });
    });
}

criterion_group!(
    benches,
    bench_generate_order_number,
    bench_place_order,
    bench_full_lifecycle,
    bench_reconstruction_from_json,
);
criterion_main!(benches);
