//! Store configuration loading from store.toml
//!
//! Holds the settings the engine needs at runtime: which standing discount new
//! subscribers receive and how far back "new arrivals" reach. Every field has a
//! default, so a missing file or a partial file is valid.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Default location of the store configuration file
pub const DEFAULT_CONFIG_PATH: &str = "store.toml";

/// Configuration structure representing the entire store.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Discount attached on every subscribe
    pub subscriber_discount: SubscriberDiscountConfig,
    /// Catalog listing settings
    pub catalog: CatalogConfig,
}

/// The standing discount granted to subscribers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubscriberDiscountConfig {
    /// Registry name of the discount
    pub name: String,
    /// Percentage, written as a string in TOML (e.g. `"5.00"`)
    pub percentage: Decimal,
}

impl Default for SubscriberDiscountConfig {
    fn default() -> Self {
        Self {
            name: "Descuento Suscriptor".to_string(),
            percentage: Decimal::new(500, 2),
        }
    }
}

/// Catalog listing settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Products created within this many days count as new arrivals
    pub new_arrivals_days: i64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            new_arrivals_days: 30,
        }
    }
}

impl StoreConfig {
    fn validate(self) -> Result<Self> {
        let percentage = self.subscriber_discount.percentage;
        if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
            return Err(Error::Config {
                message: format!("Subscriber discount must be between 0 and 100, got {percentage}"),
            });
        }
        if self.subscriber_discount.name.trim().is_empty() {
            return Err(Error::Config {
                message: "Subscriber discount name cannot be empty".to_string(),
            });
        }
        if self.catalog.new_arrivals_days < 0 {
            return Err(Error::Config {
                message: "new_arrivals_days cannot be negative".to_string(),
            });
        }
        Ok(self)
    }
}

/// Parses and validates a store configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<StoreConfig> {
    let config: StoreConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse store.toml: {e}"),
    })?;
    config.validate()
}

/// Loads store configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
    debug!("Loading store configuration from {:?}", path.as_ref());
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads the configuration named by `STORE_CONFIG` (or `./store.toml`),
/// falling back to defaults when the file does not exist.
pub fn load_default_config() -> Result<StoreConfig> {
    let path = std::env::var("STORE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if Path::new(&path).exists() {
        load_config(&path)
    } else {
        info!("No store configuration at {path}, using defaults");
        Ok(StoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_store_config() {
        let toml_str = r#"
            [subscriber_discount]
            name = "Club"
            percentage = "7.50"

            [catalog]
            new_arrivals_days = 14
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.subscriber_discount.name, "Club");
        assert_eq!(config.subscriber_discount.percentage, Decimal::new(750, 2));
        assert_eq!(config.catalog.new_arrivals_days, 14);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.subscriber_discount.name, "Descuento Suscriptor");
        assert_eq!(config.subscriber_discount.percentage, Decimal::new(5, 0));
        assert_eq!(config.catalog.new_arrivals_days, 30);
    }

    #[test]
    fn test_out_of_range_percentage_rejected() {
        let toml_str = r#"
            [subscriber_discount]
            percentage = "150"
        "#;
        let result = parse_config(toml_str);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = parse_config("[catalog\nnew_arrivals_days = ");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
