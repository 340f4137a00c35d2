/*
[INPUT]:  Symbol identifiers and query parameters
[OUTPUT]: Market data (prices, candles, order book, recent trades, market list)
[POS]:    HTTP layer - public market data endpoints (anonymous credential)
[UPDATE]: When adding new public endpoints or changing response format
*/

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashMap;

use crate::http::client::Credential;
use crate::http::{ApiClient, Result};
use crate::types::{Candle, CandlesResponse, MarketTicker, OrderBookSnapshot};

impl ApiClient {
    /// Latest 24h summary for every listed symbol
    ///
    /// GET /market/prices
    pub async fn get_market_prices(&self) -> Result<HashMap<String, MarketTicker>> {
        self.get("/market/prices", &[], Credential::Public).await
    }

    /// Candle history ending at `end_time` (inclusive on the server), newest first
    ///
    /// GET /market/candles/{symbol}/{interval}?limit={limit}&endTime={iso8601}
    pub async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>> {
        let endpoint = format!("/market/candles/{symbol}/{interval}");
        let mut query = vec![("limit", limit.to_string())];
        if let Some(end_time) = end_time {
            query.push(("endTime", end_time.to_rfc3339_opts(SecondsFormat::Millis, true)));
        }

        let response: CandlesResponse = self.get(&endpoint, &query, Credential::Public).await?;
        Ok(response.into_candles())
    }

    /// GET /market/orderbook/{symbol}
    pub async fn get_order_book(&self, symbol: &str) -> Result<OrderBookSnapshot> {
        let endpoint = format!("/market/orderbook/{symbol}");
        self.get(&endpoint, &[], Credential::Public).await
    }

    /// GET /market/trades/{symbol}
    pub async fn get_recent_trades(&self, symbol: &str) -> Result<Value> {
        let endpoint = format!("/market/trades/{symbol}");
        self.get(&endpoint, &[], Credential::Public).await
    }

    /// GET /market/list
    pub async fn get_markets(&self) -> Result<Value> {
        self.get("/market/list", &[], Credential::Public).await
    }
}
