//! Product image entity - Image paths attached to a product.
//!
//! At most one image per product carries `is_main`; the catalog's
//! `set_main_image` operation keeps that invariant.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product image database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_images")]
pub struct Model {
    /// Unique identifier for the image
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Product this image belongs to
    pub product_id: i64,
    /// Storage path of the image (e.g. `products/mug.jpg`)
    pub image: String,
    /// Main image shown in listings
    pub is_main: bool,
    /// Display position
    pub sort_order: i32,
    /// When the image was added
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ProductImage` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each image belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
