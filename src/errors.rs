//! Unified error type for the catalog and cart engine.
//!
//! Every operation reports failures through [`Error`] so that a caller can render
//! the specific reason (which product ran out of stock, which promotion was
//! already used) instead of a generic failure.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying `SeaORM` / database failure
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// I/O failure while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity is absent or filtered out by its active flag
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of entity that was looked up (e.g. `"product"`)
        entity: &'static str,
        /// Identifier used for the lookup
        key: String,
    },

    /// Requested quantity is larger than the product's stock
    #[error("Not enough stock for '{product}': available {available}, requested {requested}")]
    StockExceeded {
        /// Product name
        product: String,
        /// Units currently in stock
        available: i32,
        /// Quantity the cart item would end up with
        requested: i32,
    },

    /// Non-positive quantity supplied where a positive one is required
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: i32,
    },

    /// Promotion was already consumed by this subscriber
    #[error("Promotion '{promotion}' has already been used by subscriber {phone}")]
    DuplicatePromotionUse {
        /// Promotion slug
        promotion: String,
        /// Subscriber phone
        phone: String,
    },

    /// Cart already belongs to a different subscriber
    #[error("Cart '{session_id}' is already linked to subscriber {subscriber_id}")]
    AlreadyLinked {
        /// Session token of the cart
        session_id: String,
        /// Subscriber the cart is linked to
        subscriber_id: i64,
    },

    /// Unique key collision (slug, SKU, ...)
    #[error("{entity} already exists: {key}")]
    AlreadyExists {
        /// Kind of entity being written
        entity: &'static str,
        /// Colliding key
        key: String,
    },

    /// Input failed validation
    #[error("Invalid input: {message}")]
    Validation {
        /// Human-readable description of the problem
        message: String,
    },
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Returns true when a database error is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
