//! Cart business logic - Carts, cart items, totals and subscriber linking.
//!
//! Every mutation runs in its own database transaction so a concurrent reader
//! never sees an item half-updated. Totals are never stored: [`cart_total`]
//! recomputes `price * quantity` from the current rows on every call, using the
//! products' current prices.
//!
//! Quantity rules:
//! - adding merges into the existing (cart, product) row
//! - the resulting quantity is checked against the product's current stock
//! - updating to zero or below removes the row

use crate::{
    entities::{Cart, CartItem, Product, Subscriber, cart, cart_item, product, subscriber},
    errors::{Error, Result, is_unique_violation},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// One line of a cart with the product it references.
#[derive(Debug, Clone)]
pub struct CartLine {
    /// The stored cart item
    pub item: cart_item::Model,
    /// Current state of the referenced product
    pub product: product::Model,
    /// `product.price * item.quantity`
    pub subtotal: Decimal,
}

/// Result of [`update_item_quantity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemUpdate {
    /// Quantity was stored
    Updated(cart_item::Model),
    /// Quantity was zero or negative and the item was deleted
    Removed,
}

pub(crate) async fn active_cart<C>(db: &C, cart_id: i64) -> Result<cart::Model>
where
    C: ConnectionTrait,
{
    Cart::find_by_id(cart_id)
        .filter(cart::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("cart", cart_id))
}

async fn active_product<C>(db: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .filter(product::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))
}

fn ensure_stock(product: &product::Model, quantity: i32) -> Result<()> {
    if quantity > product.stock {
        warn!(
            "Rejected quantity {} for '{}' with stock {}",
            quantity, product.name, product.stock
        );
        return Err(Error::StockExceeded {
            product: product.name.clone(),
            available: product.stock,
            requested: quantity,
        });
    }
    Ok(())
}

/// Returns the active cart of a session, creating it when there is none.
///
/// A missing or blank `session_id` gets a fresh UUID v4 token. The boolean is
/// true when the cart was created by this call.
///
/// # Errors
/// Returns `AlreadyExists` when the session token belongs to a deactivated cart.
pub async fn get_or_create_cart(
    db: &DatabaseConnection,
    session_id: Option<&str>,
) -> Result<(cart::Model, bool)> {
    find_or_create_cart(db, session_token(session_id)).await
}

fn session_token(session_id: Option<&str>) -> String {
    match session_id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(existing) => existing.to_string(),
        None => Uuid::new_v4().to_string(),
    }
}

async fn find_by_session<C>(db: &C, session_id: &str) -> Result<Option<cart::Model>>
where
    C: ConnectionTrait,
{
    Cart::find()
        .filter(cart::Column::SessionId.eq(session_id))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn find_or_create_cart<C>(db: &C, session_id: String) -> Result<(cart::Model, bool)>
where
    C: ConnectionTrait,
{
    if let Some(cart) = find_by_session(db, &session_id).await? {
        if cart.is_active {
            return Ok((cart, false));
        }
        return Err(Error::AlreadyExists {
            entity: "cart",
            key: session_id,
        });
    }

    let model = cart::ActiveModel {
        session_id: Set(session_id.clone()),
        subscriber_id: Set(None),
        created_at: Set(Utc::now()),
        is_active: Set(true),
        ..Default::default()
    };
    match model.insert(db).await {
        Ok(cart) => {
            info!("Created cart {} for session {}", cart.id, cart.session_id);
            Ok((cart, true))
        }
        // Another request created the same session's cart first
        Err(e) if is_unique_violation(&e) => find_by_session(db, &session_id)
            .await?
            .filter(|cart| cart.is_active)
            .map(|cart| (cart, false))
            .ok_or_else(|| Error::not_found("cart", session_id)),
        Err(e) => Err(e.into()),
    }
}

/// Finds the active cart of a session.
pub async fn get_active_cart_by_session(
    db: &DatabaseConnection,
    session_id: &str,
) -> Result<cart::Model> {
    Cart::find()
        .filter(cart::Column::SessionId.eq(session_id))
        .filter(cart::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("cart", session_id))
}

/// Finds an active cart by id.
pub async fn get_cart_by_id(db: &DatabaseConnection, cart_id: i64) -> Result<cart::Model> {
    active_cart(db, cart_id).await
}

async fn put_item<C>(
    db: &C,
    cart_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<(cart_item::Model, product::Model)>
where
    C: ConnectionTrait,
{
    let cart = active_cart(db, cart_id).await?;
    let product = active_product(db, product_id).await?;

    let existing = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .filter(cart_item::Column::ProductId.eq(product.id))
        .one(db)
        .await?;

    let item = match existing {
        Some(item) => {
            // An overflowing sum is above any stock
            let new_quantity = item.quantity.checked_add(quantity).ok_or_else(|| {
                Error::StockExceeded {
                    product: product.name.clone(),
                    available: product.stock,
                    requested: i32::MAX,
                }
            })?;
            ensure_stock(&product, new_quantity)?;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(new_quantity);
            item.update(db).await?
        }
        None => {
            ensure_stock(&product, quantity)?;
            cart_item::ActiveModel {
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                quantity: Set(quantity),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };
    Ok((item, product))
}

/// Adds `quantity` units of a product to a cart.
///
/// Merges into the existing row for the product when there is one. The stock
/// check applies to the final quantity, not just the added amount.
///
/// # Errors
/// Returns an error if:
/// - `quantity` is below 1 (`InvalidQuantity`)
/// - The cart or product is absent or inactive (`NotFound`)
/// - The resulting quantity exceeds the product's stock (`StockExceeded`)
#[instrument(skip(db))]
pub async fn add_item(
    db: &DatabaseConnection,
    cart_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<cart_item::Model> {
    if quantity < 1 {
        return Err(Error::InvalidQuantity { quantity });
    }

    let txn = db.begin().await?;
    let (item, product) = put_item(&txn, cart_id, product_id, quantity).await?;
    txn.commit().await?;

    info!(
        "Cart {} now holds {}x '{}'",
        item.cart_id, item.quantity, product.name
    );
    Ok(item)
}

/// Adds a product to the session's cart, creating the cart on first use.
///
/// The cart is created in the same transaction as the item, so a rejected
/// request never leaves an empty cart behind.
#[instrument(skip(db))]
pub async fn add_item_to_session(
    db: &DatabaseConnection,
    session_id: Option<&str>,
    product_id: i64,
    quantity: i32,
) -> Result<(cart::Model, cart_item::Model)> {
    if quantity < 1 {
        return Err(Error::InvalidQuantity { quantity });
    }

    let txn = db.begin().await?;
    let (cart, _) = find_or_create_cart(&txn, session_token(session_id)).await?;
    let (item, product) = put_item(&txn, cart.id, product_id, quantity).await?;
    txn.commit().await?;

    info!(
        "Cart {} now holds {}x '{}'",
        cart.id, item.quantity, product.name
    );
    Ok((cart, item))
}

/// Sets the quantity of an item. Zero or a negative value deletes the item.
///
/// Items of a deactivated product can still be removed but not changed.
///
/// # Errors
/// Returns `NotFound` when the cart is inactive, the item is not in it or its
/// product is inactive, and `StockExceeded` when the new quantity is above the
/// product's stock.
#[instrument(skip(db))]
pub async fn update_item_quantity(
    db: &DatabaseConnection,
    cart_id: i64,
    item_id: i64,
    quantity: i32,
) -> Result<ItemUpdate> {
    let txn = db.begin().await?;

    let cart = active_cart(&txn, cart_id).await?;
    let item = CartItem::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("cart item", item_id))?;

    if quantity <= 0 {
        item.delete(&txn).await?;
        txn.commit().await?;
        info!("Removed item {} from cart {}", item_id, cart.id);
        return Ok(ItemUpdate::Removed);
    }

    let product = active_product(&txn, item.product_id).await?;
    ensure_stock(&product, quantity)?;

    let mut item: cart_item::ActiveModel = item.into();
    item.quantity = Set(quantity);
    let item = item.update(&txn).await?;

    txn.commit().await?;
    debug!("Item {} in cart {} set to {}", item.id, cart.id, item.quantity);
    Ok(ItemUpdate::Updated(item))
}

/// Deletes an item from a cart.
///
/// # Errors
/// Returns `NotFound` when the cart is inactive or the item is not in it.
#[instrument(skip(db))]
pub async fn remove_item(db: &DatabaseConnection, cart_id: i64, item_id: i64) -> Result<()> {
    let cart = active_cart(db, cart_id).await?;
    let result = CartItem::delete_many()
        .filter(cart_item::Column::Id.eq(item_id))
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("cart item", item_id));
    }
    info!("Removed item {} from cart {}", item_id, cart.id);
    Ok(())
}

/// Deletes every item of a cart. The cart stays active.
///
/// Returns the number of items removed.
#[instrument(skip(db))]
pub async fn clear_cart(db: &DatabaseConnection, cart_id: i64) -> Result<u64> {
    let cart = active_cart(db, cart_id).await?;
    let result = CartItem::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(db)
        .await?;
    info!("Cleared {} items from cart {}", result.rows_affected, cart.id);
    Ok(result.rows_affected)
}

pub(crate) async fn load_lines<C>(db: &C, cart_id: i64) -> Result<Vec<CartLine>>
where
    C: ConnectionTrait,
{
    let rows = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .order_by_asc(cart_item::Column::Id)
        .find_also_related(Product)
        .all(db)
        .await?;

    rows.into_iter()
        .map(|(item, product)| {
            let product = product.ok_or_else(|| Error::not_found("product", item.product_id))?;
            let subtotal = product.price * Decimal::from(item.quantity);
            Ok(CartLine {
                item,
                product,
                subtotal,
            })
        })
        .collect()
}

pub(crate) fn sum_lines(lines: &[CartLine]) -> Decimal {
    lines.iter().map(|line| line.subtotal).sum()
}

async fn existing_cart(db: &DatabaseConnection, cart_id: i64) -> Result<cart::Model> {
    Cart::find_by_id(cart_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("cart", cart_id))
}

/// Lines of a cart in the order they were added.
pub async fn cart_lines(db: &DatabaseConnection, cart_id: i64) -> Result<Vec<CartLine>> {
    existing_cart(db, cart_id).await?;
    load_lines(db, cart_id).await
}

/// Exact sum of `price * quantity` over the cart's current items.
pub async fn cart_total(db: &DatabaseConnection, cart_id: i64) -> Result<Decimal> {
    let lines = cart_lines(db, cart_id).await?;
    Ok(sum_lines(&lines))
}

/// Number of item rows in a cart.
pub async fn item_count(db: &DatabaseConnection, cart_id: i64) -> Result<u64> {
    existing_cart(db, cart_id).await?;
    CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Whether a cart has no items.
pub async fn is_cart_empty(db: &DatabaseConnection, cart_id: i64) -> Result<bool> {
    Ok(item_count(db, cart_id).await? == 0)
}

/// Claims an anonymous cart for a subscriber.
///
/// Linking is one-way. Re-linking the same subscriber is a no-op; the link is
/// written with a conditional update that only matches carts without a
/// subscriber, so two concurrent claims cannot both succeed.
///
/// # Errors
/// Returns `NotFound` for an inactive cart or subscriber and `AlreadyLinked`
/// when another subscriber owns the cart.
#[instrument(skip(db))]
pub async fn link_cart(
    db: &DatabaseConnection,
    cart_id: i64,
    subscriber_id: i64,
) -> Result<cart::Model> {
    let cart = active_cart(db, cart_id).await?;
    let subscriber = Subscriber::find_by_id(subscriber_id)
        .filter(subscriber::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("subscriber", subscriber_id))?;

    match cart.subscriber_id {
        Some(current) if current == subscriber.id => return Ok(cart),
        Some(current) => {
            return Err(Error::AlreadyLinked {
                session_id: cart.session_id,
                subscriber_id: current,
            });
        }
        None => {}
    }

    Cart::update_many()
        .col_expr(cart::Column::SubscriberId, Expr::value(subscriber.id))
        .filter(cart::Column::Id.eq(cart.id))
        .filter(cart::Column::SubscriberId.is_null())
        .exec(db)
        .await?;

    let cart = existing_cart(db, cart.id).await?;
    match cart.subscriber_id {
        Some(current) if current == subscriber.id => {
            info!("Linked cart {} to subscriber {}", cart.id, subscriber.phone);
            Ok(cart)
        }
        Some(current) => Err(Error::AlreadyLinked {
            session_id: cart.session_id,
            subscriber_id: current,
        }),
        None => Err(Error::not_found("cart", cart.id)),
    }
}

/// Marks a cart inactive. Session lookups stop returning it.
pub async fn deactivate_cart(db: &DatabaseConnection, cart_id: i64) -> Result<cart::Model> {
    let mut cart: cart::ActiveModel = active_cart(db, cart_id).await?.into();
    cart.is_active = Set(false);
    let cart = cart.update(db).await?;
    info!("Deactivated cart {}", cart.id);
    Ok(cart)
}

/// All carts of a subscriber, newest first.
pub async fn carts_for_subscriber(
    db: &DatabaseConnection,
    subscriber_id: i64,
) -> Result<Vec<cart::Model>> {
    Cart::find()
        .filter(cart::Column::SubscriberId.eq(subscriber_id))
        .order_by_desc(cart::Column::CreatedAt)
        .order_by_desc(cart::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The most recent active cart of a subscriber.
pub async fn active_cart_for_subscriber(
    db: &DatabaseConnection,
    subscriber_id: i64,
) -> Result<Option<cart::Model>> {
    Cart::find()
        .filter(cart::Column::SubscriberId.eq(subscriber_id))
        .filter(cart::Column::IsActive.eq(true))
        .order_by_desc(cart::Column::CreatedAt)
        .order_by_desc(cart::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::catalog;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_add_item_rejects_non_positive_quantity() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = add_item(&db, 1, 1, 0).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidQuantity { quantity: 0 }
        ));

        let result = add_item(&db, 1, 1, -4).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidQuantity { quantity: -4 }
        ));

        let result = add_item_to_session(&db, None, 1, 0).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidQuantity { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_get_or_create_cart() -> Result<()> {
        let db = setup_test_db().await?;

        let (cart, created) = get_or_create_cart(&db, Some("session-1")).await?;
        assert!(created);
        assert_eq!(cart.session_id, "session-1");
        assert!(!cart.is_linked());

        let (again, created) = get_or_create_cart(&db, Some("session-1")).await?;
        assert!(!created);
        assert_eq!(again.id, cart.id);

        let (generated, created) = get_or_create_cart(&db, None).await?;
        assert!(created);
        assert!(Uuid::parse_str(&generated.session_id).is_ok());

        let (blank, created) = get_or_create_cart(&db, Some("  ")).await?;
        assert!(created);
        assert_ne!(blank.session_id, generated.session_id);

        deactivate_cart(&db, cart.id).await?;
        let result = get_or_create_cart(&db, Some("session-1")).await;
        assert!(matches!(result.unwrap_err(), Error::AlreadyExists { .. }));
        let result = get_active_cart_by_session(&db, "session-1").await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_total_of_example_cart() -> Result<()> {
        let (db, category) = setup_with_category().await?;
        let a = create_test_product(&db, "Product A", category.id, money(1000), 10).await?;
        let b = create_test_product(&db, "Product B", category.id, money(550), 10).await?;
        let cart = create_test_cart(&db, "example").await?;

        add_item(&db, cart.id, a.id, 2).await?;
        add_item(&db, cart.id, b.id, 1).await?;

        assert_eq!(cart_total(&db, cart.id).await?, money(2550));
        let lines = cart_lines(&db, cart.id).await?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product.id, a.id);
        assert_eq!(lines[0].subtotal, money(2000));
        assert_eq!(lines[1].subtotal, money(550));

        Ok(())
    }

    #[tokio::test]
    async fn test_re_adding_merges_into_one_row() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        let cart = create_test_cart(&db, "merge").await?;

        let first = add_item(&db, cart.id, product.id, 2).await?;
        let second = add_item(&db, cart.id, product.id, 3).await?;

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(item_count(&db, cart.id).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_stock_checked_against_final_quantity() -> Result<()> {
        init_test_tracing();
        let (db, category) = setup_with_category().await?;
        let product = create_test_product(&db, "Limited", category.id, money(300), 4).await?;
        let cart = create_test_cart(&db, "stock").await?;

        // exactly the stock is fine
        let item = add_item(&db, cart.id, product.id, 4).await?;
        assert_eq!(item.quantity, 4);

        // 4 + 1 > 4
        let result = add_item(&db, cart.id, product.id, 1).await;
        match result.unwrap_err() {
            Error::StockExceeded {
                product: name,
                available,
                requested,
            } => {
                assert_eq!(name, "Limited");
                assert_eq!(available, 4);
                assert_eq!(requested, 5);
            }
            other => panic!("Expected StockExceeded, got {other:?}"),
        }

        // failed add leaves the row untouched
        let lines = cart_lines(&db, cart.id).await?;
        assert_eq!(lines[0].item.quantity, 4);

        let result = add_item(&db, cart.id, product.id + 100, 1).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_product_cannot_be_added() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        catalog::set_product_active(&db, product.id, false).await?;

        let result = add_item_to_session(&db, Some("s"), product.id, 1).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::NotFound {
                entity: "product",
                ..
            }
        ));
        // No cart was created for the rejected request
        let result = get_active_cart_by_session(&db, "s").await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_add_item_to_session_creates_cart_once() -> Result<()> {
        let (db, product) = setup_with_product().await?;

        let (cart, item) = add_item_to_session(&db, None, product.id, 1).await?;
        assert_eq!(item.quantity, 1);

        let (same, item) =
            add_item_to_session(&db, Some(&cart.session_id), product.id, 2).await?;
        assert_eq!(same.id, cart.id);
        assert_eq!(item.quantity, 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_session_add_leaves_no_cart() -> Result<()> {
        let (db, category) = setup_with_category().await?;
        let product = create_test_product(&db, "Scarce", category.id, money(400), 2).await?;

        let result = add_item_to_session(&db, Some("too-many"), product.id, 5).await;
        match result.unwrap_err() {
            Error::StockExceeded {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 2);
                assert_eq!(requested, 5);
            }
            other => panic!("Expected StockExceeded, got {other:?}"),
        }

        let result = get_active_cart_by_session(&db, "too-many").await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        assert_eq!(Cart::find().count(&db).await?, 0);

        // The same token works once the request fits the stock
        let (cart, item) = add_item_to_session(&db, Some("too-many"), product.id, 2).await?;
        assert_eq!(cart.session_id, "too-many");
        assert_eq!(item.quantity, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_quantity_overflow_is_stock_exceeded() -> Result<()> {
        let (db, category) = setup_with_category().await?;
        let product = create_test_product(&db, "Bulk", category.id, money(100), i32::MAX).await?;
        let cart = create_test_cart(&db, "overflow").await?;
        add_item(&db, cart.id, product.id, i32::MAX).await?;

        let result = add_item(&db, cart.id, product.id, 1).await;
        match result.unwrap_err() {
            Error::StockExceeded { available, .. } => assert_eq!(available, i32::MAX),
            other => panic!("Expected StockExceeded, got {other:?}"),
        }
        assert_eq!(cart_lines(&db, cart.id).await?[0].item.quantity, i32::MAX);

        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_product_quantity_is_frozen() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        let cart = create_test_cart(&db, "frozen").await?;
        let item = add_item(&db, cart.id, product.id, 1).await?;
        catalog::set_product_active(&db, product.id, false).await?;

        let result = update_item_quantity(&db, cart.id, item.id, 3).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::NotFound {
                entity: "product",
                ..
            }
        ));
        assert_eq!(cart_lines(&db, cart.id).await?[0].item.quantity, 1);

        let removed = update_item_quantity(&db, cart.id, item.id, 0).await?;
        assert_eq!(removed, ItemUpdate::Removed);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_quantity() -> Result<()> {
        let (db, category) = setup_with_category().await?;
        let product = create_test_product(&db, "Pen", category.id, money(125), 6).await?;
        let other = create_test_product(&db, "Pad", category.id, money(300), 6).await?;
        let cart = create_test_cart(&db, "update").await?;
        let item = add_item(&db, cart.id, product.id, 1).await?;
        add_item(&db, cart.id, other.id, 1).await?;

        let updated = update_item_quantity(&db, cart.id, item.id, 6).await?;
        match updated {
            ItemUpdate::Updated(item) => assert_eq!(item.quantity, 6),
            ItemUpdate::Removed => panic!("Expected the item to be kept"),
        }
        assert_eq!(cart_total(&db, cart.id).await?, money(1050));

        let result = update_item_quantity(&db, cart.id, item.id, 7).await;
        assert!(matches!(result.unwrap_err(), Error::StockExceeded { .. }));

        let removed = update_item_quantity(&db, cart.id, item.id, 0).await?;
        assert_eq!(removed, ItemUpdate::Removed);
        assert_eq!(cart_total(&db, cart.id).await?, money(300));

        let result = update_item_quantity(&db, cart.id, item.id, 1).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_negative_quantity_removes_item() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        let cart = create_test_cart(&db, "negative").await?;
        let item = add_item(&db, cart.id, product.id, 2).await?;

        let removed = update_item_quantity(&db, cart.id, item.id, -3).await?;
        assert_eq!(removed, ItemUpdate::Removed);
        assert!(is_cart_empty(&db, cart.id).await?);
        assert_eq!(cart_total(&db, cart.id).await?, Decimal::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn test_item_must_belong_to_cart() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        let mine = create_test_cart(&db, "mine").await?;
        let theirs = create_test_cart(&db, "theirs").await?;
        let item = add_item(&db, theirs.id, product.id, 1).await?;

        let result = update_item_quantity(&db, mine.id, item.id, 2).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        let result = remove_item(&db, mine.id, item.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        assert_eq!(item_count(&db, theirs.id).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_total() -> Result<()> {
        let (db, category) = setup_with_category().await?;
        let kept = create_test_product(&db, "Kept", category.id, money(775), 10).await?;
        let temp = create_test_product(&db, "Temp", category.id, money(1225), 10).await?;
        let cart = create_test_cart(&db, "roundtrip").await?;
        add_item(&db, cart.id, kept.id, 3).await?;

        let before = cart_total(&db, cart.id).await?;
        let item = add_item(&db, cart.id, temp.id, 2).await?;
        assert_eq!(cart_total(&db, cart.id).await?, before + money(2450));
        remove_item(&db, cart.id, item.id).await?;
        assert_eq!(cart_total(&db, cart.id).await?, before);

        let result = remove_item(&db, cart.id, item.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_total_follows_current_price() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        let cart = create_test_cart(&db, "price").await?;
        add_item(&db, cart.id, product.id, 2).await?;
        assert_eq!(cart_total(&db, cart.id).await?, money(2000));

        let mut changed: product::ActiveModel = product.into();
        changed.price = Set(money(750));
        changed.update(&db).await?;

        assert_eq!(cart_total(&db, cart.id).await?, money(1500));
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_cart() -> Result<()> {
        let (db, category) = setup_with_category().await?;
        let a = create_test_product(&db, "A", category.id, money(100), 5).await?;
        let b = create_test_product(&db, "B", category.id, money(200), 5).await?;
        let cart = create_test_cart(&db, "clear").await?;
        add_item(&db, cart.id, a.id, 1).await?;
        add_item(&db, cart.id, b.id, 1).await?;

        assert_eq!(clear_cart(&db, cart.id).await?, 2);
        assert!(is_cart_empty(&db, cart.id).await?);
        assert_eq!(cart_total(&db, cart.id).await?, Decimal::ZERO);
        assert!(get_cart_by_id(&db, cart.id).await?.is_active);

        Ok(())
    }

    #[tokio::test]
    async fn test_link_cart() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;
        let cart = create_test_cart(&db, "link").await?;
        let alice = create_test_subscriber(&db, "+15550001").await?;
        let bob = create_test_subscriber(&db, "+15550002").await?;

        let linked = link_cart(&db, cart.id, alice.id).await?;
        assert_eq!(linked.subscriber_id, Some(alice.id));

        let again = link_cart(&db, cart.id, alice.id).await?;
        assert_eq!(again, linked);

        let result = link_cart(&db, cart.id, bob.id).await;
        match result.unwrap_err() {
            Error::AlreadyLinked { subscriber_id, .. } => assert_eq!(subscriber_id, alice.id),
            other => panic!("Expected AlreadyLinked, got {other:?}"),
        }

        let result = link_cart(&db, cart.id, 999).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        let carts = carts_for_subscriber(&db, alice.id).await?;
        assert_eq!(carts.len(), 1);
        let active = active_cart_for_subscriber(&db, alice.id).await?.unwrap();
        assert_eq!(active.id, cart.id);
        assert!(active_cart_for_subscriber(&db, bob.id).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_cart_rejects_mutations() -> Result<()> {
        let (db, product) = setup_with_product().await?;
        let cart = create_test_cart(&db, "closed").await?;
        let item = add_item(&db, cart.id, product.id, 1).await?;
        deactivate_cart(&db, cart.id).await?;

        let result = add_item(&db, cart.id, product.id, 1).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        let result = update_item_quantity(&db, cart.id, item.id, 2).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));
        let result = clear_cart(&db, cart.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        // totals of closed carts stay readable
        assert_eq!(cart_total(&db, cart.id).await?, money(1000));

        Ok(())
    }
}
