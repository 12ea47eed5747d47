//! Order metadata as provided by the order service (read-only)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: String,
    /// Weight declared by the merchant (kg)
    #[serde(default)]
    pub declared_weight_kg: Option<f64>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub assigned_courier: Option<String>,
}

impl OrderSummary {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            declared_weight_kg: None,
            customer: None,
            merchant: None,
            assigned_courier: None,
        }
    }

    pub fn with_courier(mut self, courier: impl Into<String>) -> Self {
        self.assigned_courier = Some(courier.into());
        self
    }

    pub fn with_declared_weight(mut self, weight_kg: f64) -> Self {
        self.declared_weight_kg = Some(weight_kg);
        self
    }
}
