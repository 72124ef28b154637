//! Promotion business logic - Single-use percentage promotions.
//!
//! A subscriber may consume each promotion once. The consumption record and the
//! pricing are produced in one transaction; the unique index on
//! `(subscriber_id, promotion_id)` rejects a concurrent second use even when
//! both requests passed the "already used?" check.

use crate::{
    core::{
        cart::{active_cart, load_lines, sum_lines},
        catalog::slugify,
        discount::DiscountedTotal,
    },
    entities::{Promotion, Subscriber, UsedPromotion, promotion, subscriber, used_promotion},
    errors::{Error, Result, is_unique_violation},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

/// Result of a successful [`apply_promotion`].
#[derive(Debug, Clone)]
pub struct PromotionApplication {
    /// The consumption record
    pub used: used_promotion::Model,
    /// Cart pricing with the promotion's percentage taken off
    pub pricing: DiscountedTotal,
}

/// Creates an active promotion. The slug is derived from the name when absent.
///
/// # Errors
/// Returns `Validation` for an empty name or a percentage outside 0..=100, and
/// `AlreadyExists` for a taken slug.
pub async fn create_promotion(
    db: &DatabaseConnection,
    name: &str,
    slug: Option<&str>,
    discount: Decimal,
) -> Result<promotion::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("promotion name cannot be empty"));
    }
    if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
        return Err(Error::validation(format!(
            "promotion discount must be between 0 and 100, got {discount}"
        )));
    }
    let slug = slug.map_or_else(|| slugify(name), slugify);
    if slug.is_empty() {
        return Err(Error::validation(format!("cannot derive a slug from '{name}'")));
    }

    let model = promotion::ActiveModel {
        name: Set(name.to_string()),
        slug: Set(slug.clone()),
        discount: Set(discount),
        is_active: Set(true),
        ..Default::default()
    };
    let promotion = model.insert(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            Error::AlreadyExists {
                entity: "promotion",
                key: slug,
            }
        } else {
            e.into()
        }
    })?;
    info!("Created promotion '{}' ({}%)", promotion.slug, promotion.discount);
    Ok(promotion)
}

/// Finds an active promotion by slug.
///
/// # Errors
/// Returns `NotFound` for an unknown or inactive promotion.
pub async fn get_active_promotion_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<promotion::Model> {
    Promotion::find()
        .filter(promotion::Column::Slug.eq(slug))
        .filter(promotion::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("promotion", slug))
}

/// Active promotions by name.
pub async fn list_active_promotions(db: &DatabaseConnection) -> Result<Vec<promotion::Model>> {
    Promotion::find()
        .filter(promotion::Column::IsActive.eq(true))
        .order_by_asc(promotion::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Activates or deactivates a promotion.
pub async fn set_promotion_active(
    db: &DatabaseConnection,
    promotion_id: i64,
    is_active: bool,
) -> Result<promotion::Model> {
    let existing = Promotion::find_by_id(promotion_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("promotion", promotion_id))?;
    let mut model: promotion::ActiveModel = existing.into();
    model.is_active = Set(is_active);
    model.update(db).await.map_err(Into::into)
}

/// Whether the subscriber already consumed the promotion.
pub async fn has_used_promotion<C>(db: &C, subscriber_id: i64, promotion_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = UsedPromotion::find()
        .filter(used_promotion::Column::SubscriberId.eq(subscriber_id))
        .filter(used_promotion::Column::PromotionId.eq(promotion_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Consumes a promotion for a subscriber and prices the cart with it.
///
/// The cart's stored contents are unchanged; only the consumption is recorded.
///
/// # Errors
/// Returns an error if:
/// - The subscriber, promotion or cart is absent or inactive (`NotFound`)
/// - The subscriber already used the promotion (`DuplicatePromotionUse`)
#[instrument(skip(db))]
pub async fn apply_promotion(
    db: &DatabaseConnection,
    subscriber_id: i64,
    cart_id: i64,
    promotion_id: i64,
) -> Result<PromotionApplication> {
    let txn = db.begin().await?;

    let subscriber = Subscriber::find_by_id(subscriber_id)
        .filter(subscriber::Column::IsActive.eq(true))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("subscriber", subscriber_id))?;
    let promotion = Promotion::find_by_id(promotion_id)
        .filter(promotion::Column::IsActive.eq(true))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("promotion", promotion_id))?;
    let cart = active_cart(&txn, cart_id).await?;

    let duplicate = || Error::DuplicatePromotionUse {
        promotion: promotion.slug.clone(),
        phone: subscriber.phone.clone(),
    };

    if has_used_promotion(&txn, subscriber.id, promotion.id).await? {
        warn!(
            "Subscriber {} tried to reuse promotion '{}'",
            subscriber.phone, promotion.slug
        );
        return Err(duplicate());
    }

    let lines = load_lines(&txn, cart.id).await?;
    let pricing = DiscountedTotal::with_percentage(sum_lines(&lines), promotion.discount);

    let used = used_promotion::ActiveModel {
        subscriber_id: Set(subscriber.id),
        promotion_id: Set(promotion.id),
        cart_id: Set(cart.id),
        applied_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            duplicate()
        } else {
            e.into()
        }
    })?;

    txn.commit().await?;
    info!(
        "Promotion '{}' applied to cart {} for {}: {} -> {}",
        promotion.slug, cart.id, subscriber.phone, pricing.subtotal, pricing.total
    );

    Ok(PromotionApplication { used, pricing })
}
