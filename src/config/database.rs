//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. Composite unique keys that the entity
//! derive cannot express are added as explicit unique indexes afterwards.

use crate::entities::{
    Cart, CartItem, Category, Discount, Product, ProductImage, Promotion, Subcategory,
    Subscriber, UsedPromotion, cart_item, used_promotion,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://catalog_cart.sqlite?mode=rwc";

/// Name of the unique index guarding one row per product in a cart.
pub const CART_ITEM_UNIQUE_INDEX: &str = "idx_cart_items_cart_product";

/// Name of the unique index making promotions single-use per subscriber.
pub const USED_PROMOTION_UNIQUE_INDEX: &str = "idx_used_promotions_subscriber_promotion";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    info!("Connecting to database at {database_url}");
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    debug!("Ensured table {}", entity.table_name());
    Ok(())
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name(CART_ITEM_UNIQUE_INDEX)
            .table(CartItem)
            .col(cart_item::Column::CartId)
            .col(cart_item::Column::ProductId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name(USED_PROMOTION_UNIQUE_INDEX)
            .table(UsedPromotion)
            .col(used_promotion::Column::SubscriberId)
            .col(used_promotion::Column::PromotionId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

/// Creates all tables and unique indexes, skipping any that already exist.
///
/// Parents are created before children so foreign keys always point at an
/// existing table.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Category).await?;
    create_table(db, &schema, Subcategory).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, ProductImage).await?;
    create_table(db, &schema, Discount).await?;
    create_table(db, &schema, Subscriber).await?;
    create_table(db, &schema, Promotion).await?;
    create_table(db, &schema, Cart).await?;
    create_table(db, &schema, CartItem).await?;
    create_table(db, &schema, UsedPromotion).await?;

    for index in unique_indexes() {
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}
