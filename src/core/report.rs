//! Store report business logic.
//!
//! Produces the dashboard counters an operator sees: catalog size, active
//! promotions, subscribers and carts. All functions are framework-agnostic and
//! return structured data for the caller to format.

use crate::{
    config::store::CatalogConfig,
    core::catalog,
    entities::{
        Cart, Category, Product, Promotion, Subscriber, cart, category, product, promotion,
        subscriber,
    },
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{PaginatorTrait, QueryOrder, prelude::*};
use serde::Serialize;

/// How many categories [`store_stats`] ranks.
pub const TOP_CATEGORY_LIMIT: usize = 5;

/// An active category with its number of active products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    /// The category
    pub category: category::Model,
    /// Active products in the category
    pub product_count: u64,
}

/// Store-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Active products
    pub active_products: u64,
    /// Active categories
    pub active_categories: u64,
    /// Active promotions
    pub active_promotions: u64,
    /// Active subscribers
    pub active_subscribers: u64,
    /// Active carts
    pub active_carts: u64,
    /// Carts created since midnight UTC
    pub carts_today: u64,
    /// Active products inside the configured new-arrivals window
    pub new_arrivals: u64,
    /// Categories with the most active products, largest first
    pub top_categories: Vec<CategorySummary>,
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| midnight.and_utc())
}

/// Collects the store-wide counters.
///
/// `catalog_config` supplies the new-arrivals window.
pub async fn store_stats(
    db: &DatabaseConnection,
    catalog_config: &CatalogConfig,
) -> Result<StoreStats> {
    let active_products = Product::find()
        .filter(product::Column::IsActive.eq(true))
        .count(db)
        .await?;
    let active_promotions = Promotion::find()
        .filter(promotion::Column::IsActive.eq(true))
        .count(db)
        .await?;
    let active_subscribers = Subscriber::find()
        .filter(subscriber::Column::IsActive.eq(true))
        .count(db)
        .await?;
    let active_carts = Cart::find()
        .filter(cart::Column::IsActive.eq(true))
        .count(db)
        .await?;
    let carts_today = Cart::find()
        .filter(cart::Column::CreatedAt.gte(start_of_day(Utc::now())))
        .count(db)
        .await?;
    let new_arrivals = catalog::new_arrivals(db, catalog_config.new_arrivals_days)
        .await?
        .len() as u64;

    let categories = Category::find()
        .filter(category::Column::IsActive.eq(true))
        .order_by_asc(category::Column::SortOrder)
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?;
    let active_categories = categories.len() as u64;

    let mut top_categories = Vec::with_capacity(categories.len());
    for category in categories {
        let product_count = Product::find()
            .filter(product::Column::CategoryId.eq(category.id))
            .filter(product::Column::IsActive.eq(true))
            .count(db)
            .await?;
        top_categories.push(CategorySummary {
            category,
            product_count,
        });
    }
    // stable sort keeps the sort_order tie-break
    top_categories.sort_by(|a, b| b.product_count.cmp(&a.product_count));
    top_categories.truncate(TOP_CATEGORY_LIMIT);

    Ok(StoreStats {
        active_products,
        active_categories,
        active_promotions,
        active_subscribers,
        active_carts,
        carts_today,
        new_arrivals,
        top_categories,
    })
}
