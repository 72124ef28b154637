//! Discount entity - Named standing percentage discounts.
//! Subscribers reference a discount; they do not own it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Discount database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discounts")]
pub struct Model {
    /// Unique identifier for the discount
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Registry key (e.g. "Descuento Suscriptor")
    #[sea_orm(unique)]
    pub name: String,
    /// Percentage taken off the cart total (5.00 means 5%)
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub percentage: Decimal,
    /// Inactive discounts are never applied
    pub is_active: bool,
    /// When the discount was created
    pub created_at: DateTimeUtc,
    /// When the discount was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Discount and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One discount is shared by many subscribers
    #[sea_orm(has_many = "super::subscriber::Entity")]
    Subscribers,
}

impl Related<super::subscriber::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscribers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
