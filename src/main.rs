use catalog_cart::{
    config::{database, store},
    core::{discount, report},
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load store settings
    let store_config = store::load_default_config()
        .inspect_err(|e| error!("Failed to load store configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed the subscriber discount so the first subscribe finds it
    let subscriber_discount = &store_config.subscriber_discount;
    discount::ensure_discount(&db, &subscriber_discount.name, subscriber_discount.percentage)
        .await
        .inspect(|d| info!("Subscriber discount '{}' at {}%", d.name, d.percentage))
        .inspect_err(|e| error!("Failed to seed subscriber discount: {}", e))?;

    // 6. Report the store state
    let stats = report::store_stats(&db, &store_config.catalog).await?;
    info!(
        "Store ready: {} products in {} categories, {} promotions, {} subscribers, {} active carts ({} today), {} new arrivals in {} days",
        stats.active_products,
        stats.active_categories,
        stats.active_promotions,
        stats.active_subscribers,
        stats.active_carts,
        stats.carts_today,
        stats.new_arrivals,
        store_config.catalog.new_arrivals_days
    );
    for summary in &stats.top_categories {
        info!(
            "  {} ({}): {} products",
            summary.category.name, summary.category.slug, summary.product_count
        );
    }

    Ok(())
}
