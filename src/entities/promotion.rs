//! Promotion entity - One-time percentage discounts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Promotion database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promotions")]
pub struct Model {
    /// Unique identifier for the promotion
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// URL-friendly unique key
    #[sea_orm(unique)]
    pub slug: String,
    /// Percentage taken off the cart total
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub discount: Decimal,
    /// Inactive promotions cannot be applied
    pub is_active: bool,
}

/// Defines relationships between Promotion and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Records of this promotion being consumed
    #[sea_orm(has_many = "super::used_promotion::Entity")]
    UsedPromotions,
}

impl Related<super::used_promotion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsedPromotions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
