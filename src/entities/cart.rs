//! Cart entity - A session-scoped collection of cart items.
//!
//! A cart starts anonymous (no subscriber) and may be claimed by exactly one
//! subscriber later. Totals are never stored here; they are always derived
//! from the current items.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cart database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    /// Unique identifier for the cart
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique session token of the shopper
    #[sea_orm(unique)]
    pub session_id: String,
    /// Subscriber who claimed the cart, if any
    pub subscriber_id: Option<i64>,
    /// When the cart was created
    pub created_at: DateTimeUtc,
    /// Inactive carts are ignored by session lookups
    pub is_active: bool,
}

impl Model {
    /// True once a subscriber has claimed the cart.
    pub const fn is_linked(&self) -> bool {
        self.subscriber_id.is_some()
    }
}

/// Defines relationships between Cart and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A cart may belong to one subscriber
    #[sea_orm(
        belongs_to = "super::subscriber::Entity",
        from = "Column::SubscriberId",
        to = "super::subscriber::Column::Id",
        on_delete = "Cascade"
    )]
    Subscriber,
    /// One cart has many items
    #[sea_orm(has_many = "super::cart_item::Entity")]
    Items,
}

impl Related<super::subscriber::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriber.def()
    }
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
