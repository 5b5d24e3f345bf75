//! Shipping rate card

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{CountryCode, Money};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    pub id: i64,
    pub name: String,
    pub cost: Money,
    /// Orders whose items total reaches this amount ship for free.
    pub free_shipping_threshold: Option<Decimal>,
    pub supports_domestic: bool,
    pub supports_international: bool,
    pub is_pickup: bool,
    pub is_active: bool,
    pub estimated_delivery: Option<String>,
}

/// Shipping method as it stood when the order was placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingSnapshot { pub name: String, pub cost: Money, pub is_pickup: bool, pub estimated_delivery: Option<String> }

impl ShippingOption {
    pub fn quote(&self, items_total: &Money, destination: &CountryCode, home: &CountryCode) -> Result<ShippingSnapshot, ShippingError> {
        if !self.is_active { return Err(ShippingError::Inactive(self.name.clone())); }
        let cost = if self.is_pickup {
            Money::zero(self.cost.currency())
        } else {
            let domestic = destination == home;
            if (domestic && !self.supports_domestic) || (!domestic && !self.supports_international) {
                return Err(ShippingError::Unsupported { option: self.name.clone(), country: destination.clone() });
            }
            match self.free_shipping_threshold {
                Some(threshold) if items_total.amount() >= threshold => Money::zero(self.cost.currency()),
                _ => self.cost.clone(),
            }
        };
        Ok(ShippingSnapshot { name: self.name.clone(), cost, is_pickup: self.is_pickup, estimated_delivery: self.estimated_delivery.clone() })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ShippingError {
    #[error("Shipping option '{0}' is not available")]
    Inactive(String),
    #[error("Shipping option '{option}' does not deliver to {country}")]
    Unsupported { option: String, country: CountryCode },
}
