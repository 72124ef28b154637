//! Discount business logic - The discount registry and subscriber pricing.
//!
//! Amounts are computed exactly with [`Decimal`]. Only the presented total is
//! rounded to cents (half away from zero); the presented discount amount is the
//! subtotal minus that rounded total, so the two always add back up to the
//! subtotal.

use crate::{
    core::cart,
    entities::{Discount, cart as cart_entity, discount, subscriber},
    errors::{Error, Result, is_unique_violation},
};
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// A cart subtotal with an optional percentage taken off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountedTotal {
    /// Exact sum of the cart lines
    pub subtotal: Decimal,
    /// Percentage that was applied, `None` when no discount applies
    pub percentage: Option<Decimal>,
    /// `subtotal - total`
    pub discount_amount: Decimal,
    /// Amount to pay, rounded to cents
    pub total: Decimal,
}

impl DiscountedTotal {
    /// Pricing without any discount.
    pub fn undiscounted(subtotal: Decimal) -> Self {
        Self {
            subtotal,
            percentage: None,
            discount_amount: Decimal::ZERO,
            total: subtotal,
        }
    }

    /// Pricing with `percentage` off the subtotal.
    pub fn with_percentage(subtotal: Decimal, percentage: Decimal) -> Self {
        let total = round_money(subtotal - compute_discount_amount(subtotal, percentage));
        Self {
            subtotal,
            percentage: Some(percentage),
            discount_amount: subtotal - total,
            total,
        }
    }

    /// Whether a discount was applied.
    pub const fn applied(&self) -> bool {
        self.percentage.is_some()
    }
}

/// Exact `total * percentage / 100`.
pub fn compute_discount_amount(total: Decimal, percentage: Decimal) -> Decimal {
    total * (percentage / Decimal::ONE_HUNDRED)
}

/// Rounds to cents, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn validate_percentage(percentage: Decimal) -> Result<()> {
    if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err(Error::validation(format!(
            "discount percentage must be between 0 and 100, got {percentage}"
        )));
    }
    Ok(())
}

/// Returns the discount registered under `name`, creating it when missing.
///
/// An existing discount keeps its stored percentage and active flag; the given
/// percentage is only used on creation. Generic over the connection so it can
/// run inside a caller's transaction.
pub async fn ensure_discount<C>(db: &C, name: &str, percentage: Decimal) -> Result<discount::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("discount name cannot be empty"));
    }
    validate_percentage(percentage)?;

    if let Some(existing) = find_by_name(db, name).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let model = discount::ActiveModel {
        name: Set(name.to_string()),
        percentage: Set(percentage),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    match model.insert(db).await {
        Ok(created) => {
            info!("Created discount '{}' at {}%", created.name, created.percentage);
            Ok(created)
        }
        Err(e) if is_unique_violation(&e) => find_by_name(db, name)
            .await?
            .ok_or_else(|| Error::not_found("discount", name)),
        Err(e) => Err(e.into()),
    }
}

async fn find_by_name<C>(db: &C, name: &str) -> Result<Option<discount::Model>>
where
    C: ConnectionTrait,
{
    Discount::find()
        .filter(discount::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a discount by id regardless of its active flag.
pub async fn get_discount_by_id(
    db: &DatabaseConnection,
    discount_id: i64,
) -> Result<Option<discount::Model>> {
    Discount::find_by_id(discount_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists active discounts by name.
pub async fn list_active_discounts(db: &DatabaseConnection) -> Result<Vec<discount::Model>> {
    Discount::find()
        .filter(discount::Column::IsActive.eq(true))
        .order_by_asc(discount::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Activates or deactivates a discount. Inactive discounts are never applied.
pub async fn set_discount_active(
    db: &DatabaseConnection,
    discount_id: i64,
    is_active: bool,
) -> Result<discount::Model> {
    let existing = get_discount_by_id(db, discount_id)
        .await?
        .ok_or_else(|| Error::not_found("discount", discount_id))?;

    let mut model: discount::ActiveModel = existing.into();
    model.is_active = Set(is_active);
    model.updated_at = Set(Utc::now());
    model.update(db).await.map_err(Into::into)
}

/// Prices a cart for a subscriber using their standing discount.
///
/// A subscriber without a discount, or whose discount is inactive, pays the
/// plain subtotal. Nothing is persisted.
#[instrument(skip(db, subscriber), fields(phone = %subscriber.phone))]
pub async fn apply_subscriber_discount(
    db: &DatabaseConnection,
    cart_id: i64,
    subscriber: &subscriber::Model,
) -> Result<DiscountedTotal> {
    let subtotal = cart::cart_total(db, cart_id).await?;

    let discount = match subscriber.discount_id {
        Some(discount_id) => get_discount_by_id(db, discount_id).await?,
        None => None,
    };

    let pricing = match discount {
        Some(discount) if discount.is_active => {
            DiscountedTotal::with_percentage(subtotal, discount.percentage)
        }
        _ => DiscountedTotal::undiscounted(subtotal),
    };
    debug!(
        "Cart {} priced at {} (subtotal {})",
        cart_id, pricing.total, pricing.subtotal
    );
    Ok(pricing)
}

/// Links a cart to a subscriber and prices it with their discount.
///
/// # Errors
/// Same as [`cart::link_cart`].
pub async fn link_cart_with_discount(
    db: &DatabaseConnection,
    cart_id: i64,
    subscriber: &subscriber::Model,
) -> Result<(cart_entity::Model, DiscountedTotal)> {
    let cart = cart::link_cart(db, cart_id, subscriber.id).await?;
    let pricing = apply_subscriber_discount(db, cart.id, subscriber).await?;
    Ok((cart, pricing))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::cart::add_item;
    use crate::test_utils::*;

    #[test]
    fn test_compute_discount_amount_is_exact() {
        assert_eq!(compute_discount_amount(money(2550), money(500)), money(1275) / Decimal::TEN);
        assert_eq!(compute_discount_amount(money(10000), money(1000)), money(1000));
        assert_eq!(compute_discount_amount(money(1999), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_rounding_of_example_total() {
        // 25.50 at 5%: exact total 24.225, shown as 24.23 with 1.27 off
        let pricing = DiscountedTotal::with_percentage(money(2550), money(500));
        assert_eq!(pricing.total, money(2423));
        assert_eq!(pricing.discount_amount, money(127));
        assert_eq!(pricing.subtotal, pricing.total + pricing.discount_amount);
        assert!(pricing.applied());

        let plain = DiscountedTotal::undiscounted(money(2550));
        assert_eq!(plain.total, money(2550));
        assert_eq!(plain.discount_amount, Decimal::ZERO);
        assert!(!plain.applied());
    }

    #[test]
    fn test_discount_bounds() {
        for percentage in [Decimal::ZERO, money(500), Decimal::ONE_HUNDRED] {
            let pricing = DiscountedTotal::with_percentage(money(4321), percentage);
            assert!(pricing.total >= Decimal::ZERO);
            assert!(pricing.total <= pricing.subtotal);
        }
        assert_eq!(
            DiscountedTotal::with_percentage(money(4321), Decimal::ONE_HUNDRED).total,
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn test_ensure_discount_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;

        let first = ensure_discount(&db, "Descuento Suscriptor", money(500)).await?;
        let second = ensure_discount(&db, "Descuento Suscriptor", money(1500)).await?;

        assert_eq!(first.id, second.id);
        assert_eq!(second.percentage, money(500));
        assert_eq!(list_active_discounts(&db).await?.len(), 1);

        let result = ensure_discount(&db, "Too much", money(10100)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        let result = ensure_discount(&db, " ", money(500)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_apply_subscriber_discount() -> Result<()> {
        let (db, category) = setup_with_category().await?;
        let a = create_test_product(&db, "A", category.id, money(1000), 10).await?;
        let b = create_test_product(&db, "B", category.id, money(550), 10).await?;
        let cart = create_test_cart(&db, "pricing").await?;
        add_item(&db, cart.id, a.id, 2).await?;
        add_item(&db, cart.id, b.id, 1).await?;

        let plain = create_test_subscriber(&db, "+15550010").await?;
        let pricing = apply_subscriber_discount(&db, cart.id, &plain).await?;
        assert!(!pricing.applied());
        assert_eq!(pricing.total, money(2550));

        let discount = ensure_discount(&db, "Descuento Suscriptor", money(500)).await?;
        let mut member: subscriber::ActiveModel =
            create_test_subscriber(&db, "+15550011").await?.into();
        member.discount_id = Set(Some(discount.id));
        let member = member.update(&db).await?;

        let pricing = apply_subscriber_discount(&db, cart.id, &member).await?;
        assert_eq!(pricing.percentage, Some(money(500)));
        assert_eq!(pricing.total, money(2423));
        assert_eq!(pricing.discount_amount, money(127));

        // Pricing never changes the stored cart
        assert_eq!(cart::cart_total(&db, cart.id).await?, money(2550));

        set_discount_active(&db, discount.id, false).await?;
        let pricing = apply_subscriber_discount(&db, cart.id, &member).await?;
        assert!(!pricing.applied());
        assert_eq!(pricing.total, money(2550));

        Ok(())
    }

    #[tokio::test]
    async fn test_link_cart_with_discount() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        let cart = create_test_cart(&db, "linked").await?;
        add_item(&db, cart.id, product.id, 1).await?;

        let discount = ensure_discount(&db, "Ten", money(1000)).await?;
        let mut subscriber: subscriber::ActiveModel =
            create_test_subscriber(&db, "+15550012").await?.into();
        subscriber.discount_id = Set(Some(discount.id));
        let subscriber = subscriber.update(&db).await?;

        let (linked, pricing) = link_cart_with_discount(&db, cart.id, &subscriber).await?;
        assert_eq!(linked.subscriber_id, Some(subscriber.id));
        assert_eq!(pricing.total, money(900));
        assert_eq!(pricing.discount_amount, money(100));

        Ok(())
    }
}
