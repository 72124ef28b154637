/// Database configuration and connection management
pub mod database;

/// Store settings loaded from store.toml
pub mod store;
