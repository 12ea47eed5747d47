//! Order metadata loader from a TOML file

use parcel_domain::model::OrderSummary;
use parcel_types::{ConfigError, Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Container for parsing orders.toml
#[derive(Debug, Deserialize)]
struct OrderBookFile {
    #[serde(default)]
    orders: Vec<OrderSummary>,
}

/// Orders keyed by order id
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: HashMap<String, OrderSummary>,
}

impl OrderBook {
    /// Load orders from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(ConfigError::ParseError(format!(
                "Failed to read order file {}: {}",
                path.display(),
                e
            )))
        })?;

        Self::load_from_str(&content)
    }

    /// Load orders from a TOML string
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let file: OrderBookFile = toml::from_str(toml_content).map_err(|e| {
            Error::Config(ConfigError::ParseError(format!(
                "Failed to parse order TOML: {}",
                e
            )))
        })?;

        let orders = file
            .orders
            .into_iter()
            .map(|o| (o.order_id.clone(), o))
            .collect();

        Ok(Self { orders })
    }

    pub fn get(&self, order_id: &str) -> Option<&OrderSummary> {
        self.orders.get(order_id)
    }

    pub fn count(&self) -> usize {
        self.orders.len()
    }
}
