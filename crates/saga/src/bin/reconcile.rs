//! Lists orders flagged for reconciliation after a failed stock reservation.
//!
//! Reads `DATABASE_URL`, applies pending migrations and prints one line per
//! flagged order, oldest first.

use order_store::{OrderStore, PostgresOrderStore};
use saga::config::Config;
use saga::telemetry::init_tracing;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    init_tracing(&config)?;

    let database_url = config
        .database_url
        .as_deref()
        .ok_or("DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await?;
    let store = PostgresOrderStore::new(pool);
    store.run_migrations().await?;

    let orders = store.find_needing_reconciliation().await?;
    tracing::info!(count = orders.len(), "orders needing reconciliation");

    for order in &orders {
        let Some(note) = order.reconciliation() else {
            continue;
        };
        let number = order.order_number().map_or("-", |n| n.as_str());
        let unreleased: Vec<String> = note.unreleased.iter().map(ToString::to_string).collect();

        println!(
            "{number}\tstatus={}\tfailed_product={}\tunreleased=[{}]\tflagged_at={}\treason={}",
            order.status(),
            note.failed_product,
            unreleased.join(","),
            note.flagged_at.to_rfc3339(),
            note.reason,
        );
    }

    Ok(())
}
