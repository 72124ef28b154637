//! Subscriber entity - Customers identified by phone number.
//!
//! A subscriber may reference one standing [`discount`](super::discount). The
//! reference is weak: deleting the discount clears it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscriber database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscribers")]
pub struct Model {
    /// Unique identifier for the subscriber
    #[sea_orm(primary_key)]
    pub id: i64,
    /// `WhatsApp` phone number, the identity key
    #[sea_orm(unique)]
    pub phone: String,
    /// Contact email, overwritten on every subscribe
    pub email: String,
    /// Deactivated subscribers cannot claim carts
    pub is_active: bool,
    /// Standing discount, if any
    pub discount_id: Option<i64>,
    /// When the subscriber was created
    pub created_at: DateTimeUtc,
    /// When the subscriber was last modified
    pub updated_at: DateTimeUtc,
}

/// Whether a subscriber currently enjoys a standing discount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// A discount is attached
    Active,
    /// No discount attached
    Inactive,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Inactive => f.write_str("inactive"),
        }
    }
}

impl Model {
    /// "active" iff a discount is attached.
    pub const fn subscription_status(&self) -> SubscriptionStatus {
        if self.discount_id.is_some() {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::Inactive
        }
    }

    /// Click-to-chat link for the subscriber's phone.
    pub fn whatsapp_link(&self) -> String {
        format!("https://wa.me/{}", self.phone.replace('+', ""))
    }
}

/// Defines relationships between Subscriber and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A subscriber may reference one discount
    #[sea_orm(
        belongs_to = "super::discount::Entity",
        from = "Column::DiscountId",
        to = "super::discount::Column::Id",
        on_delete = "SetNull"
    )]
    Discount,
    /// One subscriber owns many carts
    #[sea_orm(has_many = "super::cart::Entity")]
    Carts,
    /// Promotions this subscriber has consumed
    #[sea_orm(has_many = "super::used_promotion::Entity")]
    UsedPromotions,
}

impl Related<super::discount::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Discount.def()
    }
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Carts.def()
    }
}

impl Related<super::used_promotion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsedPromotions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
