//! Core business logic, independent of any transport layer.
//!
//! Every operation takes a `DatabaseConnection` and returns structured data or
//! an [`Error`](crate::errors::Error) for the caller to present.

/// Cart lifecycle, items, totals and subscriber linking
pub mod cart;
/// Categories, subcategories, products and product images
pub mod catalog;
/// Discount registry and subscriber pricing
pub mod discount;
/// Single-use promotions
pub mod promotion;
/// Store-wide counters
pub mod report;
/// Subscribing and the subscriber registry
pub mod subscriber;
