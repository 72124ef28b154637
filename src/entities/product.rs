//! Product entity - Sellable items with a price and a stock count.
//!
//! Prices are fixed-point decimals with two places. Stock is a hard ceiling on
//! the quantity any cart item may hold for the product. The derived
//! [`StockStatus`] is what storefronts show next to the price.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stock at or below this level (and above zero) is reported as low.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// Product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// URL-friendly unique key
    #[sea_orm(unique)]
    pub slug: String,
    /// Optional long description
    pub description: Option<String>,
    /// Unit price
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    /// Units available to sell, never negative
    pub stock: i32,
    /// Optional unique stock keeping unit
    #[sea_orm(unique)]
    pub sku: Option<String>,
    /// Owning category
    pub category_id: i64,
    /// Optional subcategory
    pub subcategory_id: Option<i64>,
    /// Hidden from the storefront and not purchasable when false
    pub is_active: bool,
    /// Highlighted on the storefront
    pub is_featured: bool,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Coarse stock level shown to shoppers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    /// Stock is zero
    NoStock,
    /// Between 1 and [`LOW_STOCK_THRESHOLD`] units
    LowStock,
    /// More than [`LOW_STOCK_THRESHOLD`] units
    InStock,
}

impl StockStatus {
    /// Classifies a raw stock count.
    pub const fn from_stock(stock: i32) -> Self {
        if stock <= 0 {
            Self::NoStock
        } else if stock <= LOW_STOCK_THRESHOLD {
            Self::LowStock
        } else {
            Self::InStock
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoStock => "no stock",
            Self::LowStock => "low stock",
            Self::InStock => "in stock",
        };
        f.write_str(label)
    }
}

impl Model {
    /// Derived stock level for display.
    pub const fn stock_status(&self) -> StockStatus {
        StockStatus::from_stock(self.stock)
    }

    /// Whether at least one unit can be sold.
    pub const fn is_in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Cascade"
    )]
    Category,
    /// A product may belong to one subcategory
    #[sea_orm(
        belongs_to = "super::subcategory::Entity",
        from = "Column::SubcategoryId",
        to = "super::subcategory::Column::Id",
        on_delete = "Cascade"
    )]
    Subcategory,
    /// One product has many images
    #[sea_orm(has_many = "super::product_image::Entity")]
    Images,
    /// One product appears in many cart items
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::subcategory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subcategory.def()
    }
}

impl Related<super::product_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
