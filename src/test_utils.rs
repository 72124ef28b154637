//! Shared test utilities for the catalog and cart engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{cart, catalog},
    entities,
    errors::Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Builds a money amount from cents, e.g. `money(1050)` is 10.50.
pub fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates an active test category named `name` with a derived slug.
pub async fn create_test_category(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::category::Model> {
    catalog::create_category(db, name, None, 0).await
}

/// Creates a test product with sensible defaults.
///
/// # Defaults
/// * slug: derived from the name
/// * no description, SKU or subcategory
/// * `is_featured`: false
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    category_id: i64,
    price: Decimal,
    stock: i32,
) -> Result<entities::product::Model> {
    catalog::create_product(db, catalog::NewProduct::new(name, price, stock, category_id)).await
}

/// Creates an active, unlinked cart for `session_id`.
pub async fn create_test_cart(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<entities::cart::Model> {
    let (cart, _) = cart::get_or_create_cart(db, Some(session_id)).await?;
    Ok(cart)
}

/// Creates an active subscriber without a discount.
///
/// # Defaults
/// * email: "test@example.com"
pub async fn create_test_subscriber(
    db: &DatabaseConnection,
    phone: &str,
) -> Result<entities::subscriber::Model> {
    let now = Utc::now();
    let subscriber = entities::subscriber::ActiveModel {
        phone: Set(phone.to_string()),
        email: Set("test@example.com".to_string()),
        is_active: Set(true),
        discount_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(subscriber)
}

/// Sets up a test database with a single category.
/// Returns (db, category) tuple.
///
/// # Defaults
/// * name: "Test Category" (slug "test-category")
pub async fn setup_with_category() -> Result<(DatabaseConnection, entities::category::Model)> {
    let db = setup_test_db().await?;
    let category = create_test_category(&db, "Test Category").await?;
    Ok((db, category))
}

/// Sets up a test database with a category and a product in it.
/// Returns (db, product) tuple.
///
/// # Defaults
/// * name: "Test Product"
/// * price: 10.00
/// * stock: 10
pub async fn setup_with_product() -> Result<(DatabaseConnection, entities::product::Model)> {
    let (db, category) = setup_with_category().await?;
    let product = create_test_product(&db, "Test Product", category.id, money(1000), 10).await?;
    Ok((db, product))
}
