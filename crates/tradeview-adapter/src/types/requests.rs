/*
[INPUT]:  Backend JSON schema and serde requirements
[OUTPUT]: Typed Rust request structs with serialization support
[POS]:    Data layer - type definitions for REST and WebSocket payloads
[UPDATE]: When the backend schema changes or new types are added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{OrderType, Side};
use crate::http::{Result, SyncError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "Username")]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone: String,
    pub birthday: String,
    #[serde(rename = "passkey", skip_serializing_if = "Option::is_none")]
    pub passkey: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistRequest {
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    pub amount: Decimal,
}

impl PlaceOrderRequest {
    pub fn market(symbol: impl Into<String>, side: Side, amount: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            price: None,
            amount,
        }
    }

    pub fn limit(symbol: impl Into<String>, side: Side, price: Decimal, amount: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            price: Some(price),
            amount,
        }
    }

    /// Reject parameters the backend would refuse, before any network call
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(SyncError::Validation("symbol must not be empty".to_string()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(SyncError::Validation("amount must be positive".to_string()));
        }
        match (self.order_type, self.price) {
            (OrderType::Limit, None) => Err(SyncError::Validation(
                "limit order requires a price".to_string(),
            )),
            (OrderType::Limit, Some(price)) if price <= Decimal::ZERO => Err(
                SyncError::Validation("price must be positive".to_string()),
            ),
            (OrderType::Market, Some(_)) => Err(SyncError::Validation(
                "market order must not carry a price".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
