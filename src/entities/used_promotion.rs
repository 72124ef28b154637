//! Used promotion entity - Records a subscriber consuming a promotion on a cart.
//!
//! The `(subscriber_id, promotion_id)` pair is covered by a unique index created
//! alongside the tables, which is what makes a promotion single-use.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Used promotion database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "used_promotions")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Subscriber who used the promotion
    pub subscriber_id: i64,
    /// Promotion that was used
    pub promotion_id: i64,
    /// Cart the promotion was applied to
    pub cart_id: i64,
    /// When the promotion was applied
    pub applied_at: DateTimeUtc,
}

/// Defines relationships between `UsedPromotion` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The consuming subscriber
    #[sea_orm(
        belongs_to = "super::subscriber::Entity",
        from = "Column::SubscriberId",
        to = "super::subscriber::Column::Id",
        on_delete = "Cascade"
    )]
    Subscriber,
    /// The consumed promotion
    #[sea_orm(
        belongs_to = "super::promotion::Entity",
        from = "Column::PromotionId",
        to = "super::promotion::Column::Id",
        on_delete = "Cascade"
    )]
    Promotion,
    /// The cart it was applied to
    #[sea_orm(
        belongs_to = "super::cart::Entity",
        from = "Column::CartId",
        to = "super::cart::Column::Id",
        on_delete = "Cascade"
    )]
    Cart,
}

impl Related<super::subscriber::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriber.def()
    }
}

impl Related<super::promotion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Promotion.def()
    }
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
