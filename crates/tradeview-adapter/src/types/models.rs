/*
[INPUT]:  Backend JSON schema and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for REST and WebSocket payloads
[UPDATE]: When the backend schema changes or new types are added
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub username_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// 24h summary returned by `GET /market/prices`, keyed by symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTicker {
    #[serde(default)]
    pub price: Decimal,
    #[serde(default, rename = "change24h")]
    pub change_24h: Decimal,
    #[serde(default, rename = "high24h")]
    pub high_24h: Decimal,
    #[serde(default, rename = "low24h")]
    pub low_24h: Decimal,
    #[serde(default, rename = "volume24h")]
    pub volume_24h: Decimal,
}

/// Historical candle as served by the candles endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

/// One price level of an order book side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub amount: Decimal,
}

/// Full order book for one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    #[serde(default)]
    pub market_id: String,
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
    #[serde(default)]
    pub timestamp: String,
}

/// Aggregate price row pushed by the price channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    #[serde(default)]
    pub open_time: String,
    #[serde(default)]
    pub close_time: String,
}
