//! Subscriber business logic - Subscribing by phone and the subscriber registry.
//!
//! Subscribing is an upsert keyed on the phone number: a second subscribe with
//! the same phone refreshes the email, reactivates the subscriber and attaches
//! the configured subscriber discount again.

use crate::{
    config::store::SubscriberDiscountConfig,
    core::discount::ensure_discount,
    entities::{Cart, Discount, Subscriber, cart, discount, subscriber},
    errors::{Error, Result, is_unique_violation},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Outcome of [`subscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    /// The stored subscriber
    pub subscriber: subscriber::Model,
    /// The discount now attached to the subscriber
    pub discount: discount::Model,
    /// True when the phone was seen for the first time
    pub created: bool,
    /// Confirmation message for the customer
    pub message: String,
}

fn subscription_message(discount: &discount::Model) -> String {
    format!(
        "Congratulations! You now get {}% off all your products.",
        discount.percentage.normalize()
    )
}

fn validate_contact(phone: &str, email: &str) -> Result<()> {
    if phone.is_empty() {
        return Err(Error::validation("phone cannot be empty"));
    }
    if email.is_empty() {
        return Err(Error::validation("email cannot be empty"));
    }
    if !email.contains('@') {
        return Err(Error::validation(format!("invalid email address: {email}")));
    }
    Ok(())
}

async fn refresh_subscriber<C>(
    db: &C,
    existing: subscriber::Model,
    email: &str,
    discount_id: i64,
) -> Result<subscriber::Model>
where
    C: ConnectionTrait,
{
    let mut model: subscriber::ActiveModel = existing.into();
    model.email = Set(email.to_string());
    model.is_active = Set(true);
    model.discount_id = Set(Some(discount_id));
    model.updated_at = Set(Utc::now());
    model.update(db).await.map_err(Into::into)
}

/// Writes the subscriber row for `phone`. The boolean is true when it was inserted.
///
/// A unique violation on insert means a concurrent subscribe created the row
/// after `existing` was read; that row is refreshed instead.
async fn upsert_subscriber<C>(
    db: &C,
    existing: Option<subscriber::Model>,
    phone: &str,
    email: &str,
    discount_id: i64,
) -> Result<(subscriber::Model, bool)>
where
    C: ConnectionTrait,
{
    if let Some(existing) = existing {
        let subscriber = refresh_subscriber(db, existing, email, discount_id).await?;
        return Ok((subscriber, false));
    }

    let now = Utc::now();
    let inserted = subscriber::ActiveModel {
        phone: Set(phone.to_string()),
        email: Set(email.to_string()),
        is_active: Set(true),
        discount_id: Set(Some(discount_id)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(subscriber) => Ok((subscriber, true)),
        Err(e) if is_unique_violation(&e) => {
            let existing = Subscriber::find()
                .filter(subscriber::Column::Phone.eq(phone))
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found("subscriber", phone))?;
            let subscriber = refresh_subscriber(db, existing, email, discount_id).await?;
            Ok((subscriber, false))
        }
        Err(e) => Err(e.into()),
    }
}

/// Subscribes a phone number, creating or refreshing the subscriber.
///
/// The subscriber discount named in `config` is created on first use and
/// attached on every call. All writes happen in one transaction.
///
/// # Errors
/// Returns `Validation` for an empty phone or a malformed email.
#[instrument(skip(db, config))]
pub async fn subscribe(
    db: &DatabaseConnection,
    phone: &str,
    email: &str,
    config: &SubscriberDiscountConfig,
) -> Result<Subscription> {
    let phone = phone.trim();
    let email = email.trim();
    validate_contact(phone, email)?;

    let txn = db.begin().await?;

    let discount = ensure_discount(&txn, &config.name, config.percentage).await?;

    let existing = Subscriber::find()
        .filter(subscriber::Column::Phone.eq(phone))
        .one(&txn)
        .await?;
    let (subscriber, created) =
        upsert_subscriber(&txn, existing, phone, email, discount.id).await?;

    txn.commit().await?;

    if created {
        info!("New subscriber {}", subscriber.phone);
    } else {
        info!("Subscriber {} refreshed", subscriber.phone);
    }

    let message = subscription_message(&discount);
    Ok(Subscription {
        subscriber,
        discount,
        created,
        message,
    })
}

/// Finds a subscriber by phone regardless of the active flag.
pub async fn get_subscriber_by_phone(
    db: &DatabaseConnection,
    phone: &str,
) -> Result<Option<subscriber::Model>> {
    Subscriber::find()
        .filter(subscriber::Column::Phone.eq(phone.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an active subscriber by phone.
///
/// # Errors
/// Returns `NotFound` when the phone is unknown or the subscriber is inactive.
pub async fn get_active_subscriber_by_phone(
    db: &DatabaseConnection,
    phone: &str,
) -> Result<subscriber::Model> {
    get_subscriber_by_phone(db, phone)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| Error::not_found("subscriber", phone))
}

/// Finds a subscriber by id.
pub async fn get_subscriber_by_id(
    db: &DatabaseConnection,
    subscriber_id: i64,
) -> Result<Option<subscriber::Model>> {
    Subscriber::find_by_id(subscriber_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Active subscribers, newest first, optionally only those holding a discount.
pub async fn list_active_subscribers(
    db: &DatabaseConnection,
    discount_id: Option<i64>,
) -> Result<Vec<subscriber::Model>> {
    let mut query = Subscriber::find().filter(subscriber::Column::IsActive.eq(true));
    if let Some(discount_id) = discount_id {
        query = query.filter(subscriber::Column::DiscountId.eq(discount_id));
    }
    query
        .order_by_desc(subscriber::Column::CreatedAt)
        .order_by_desc(subscriber::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Replaces a subscriber's standing discount.
pub async fn attach_discount(
    db: &DatabaseConnection,
    subscriber_id: i64,
    discount_id: Option<i64>,
) -> Result<subscriber::Model> {
    let existing = get_subscriber_by_id(db, subscriber_id)
        .await?
        .ok_or_else(|| Error::not_found("subscriber", subscriber_id))?;

    if let Some(discount_id) = discount_id {
        Discount::find_by_id(discount_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("discount", discount_id))?;
    }

    let mut model: subscriber::ActiveModel = existing.into();
    model.discount_id = Set(discount_id);
    model.updated_at = Set(Utc::now());
    model.update(db).await.map_err(Into::into)
}

/// Deactivates a subscriber. Their carts are kept.
pub async fn deactivate_subscriber(
    db: &DatabaseConnection,
    subscriber_id: i64,
) -> Result<subscriber::Model> {
    let existing = get_subscriber_by_id(db, subscriber_id)
        .await?
        .ok_or_else(|| Error::not_found("subscriber", subscriber_id))?;

    let mut model: subscriber::ActiveModel = existing.into();
    model.is_active = Set(false);
    model.updated_at = Set(Utc::now());
    let subscriber = model.update(db).await?;
    info!("Deactivated subscriber {}", subscriber.phone);
    Ok(subscriber)
}

/// Number of carts ever linked to a subscriber.
pub async fn total_carts(db: &DatabaseConnection, subscriber_id: i64) -> Result<u64> {
    Cart::find()
        .filter(cart::Column::SubscriberId.eq(subscriber_id))
        .count(db)
        .await
        .map_err(Into::into)
}
