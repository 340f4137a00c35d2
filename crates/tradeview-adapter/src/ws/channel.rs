/*
[INPUT]:  Channel kind (price table, order book, candle feed)
[OUTPUT]: Endpoint path, subscription keys field and inbound frame type per channel
[POS]:    WebSocket layer - channel descriptors consumed by ChannelConnection
[UPDATE]: When adding channels or changing their wire contract
*/

use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::types::{OrderBookSnapshot, PriceEntry};
use crate::ws::message::CandleFrame;

/// Static description of one push channel
pub trait ChannelSpec: Send + Sync + 'static {
    type Frame: DeserializeOwned + Send + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Path (and query) appended to the WebSocket base URL
    fn path(&self) -> String;

    /// Field carrying keys in subscribe frames; `None` for channels scoped by URL
    fn keys_field(&self) -> Option<&'static str>;

    fn decode(&self, text: &str) -> serde_json::Result<Self::Frame> {
        serde_json::from_str(text)
    }
}

/// Aggregate price table: array of price entries per frame
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceChannel;

impl ChannelSpec for PriceChannel {
    type Frame = Vec<PriceEntry>;

    fn name(&self) -> &'static str {
        "prices"
    }

    fn path(&self) -> String {
        "/ws/market-prices".to_string()
    }

    fn keys_field(&self) -> Option<&'static str> {
        Some("symbols")
    }
}

/// Order books: full snapshots keyed by market id
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderBookChannel;

impl ChannelSpec for OrderBookChannel {
    type Frame = HashMap<String, OrderBookSnapshot>;

    fn name(&self) -> &'static str {
        "orderbook"
    }

    fn path(&self) -> String {
        "/ws/orderbook".to_string()
    }

    fn keys_field(&self) -> Option<&'static str> {
        Some("market_ids")
    }
}

/// Live candle ticks for one (symbol, interval) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleChannel {
    pub symbol: String,
    pub interval: String,
}

impl CandleChannel {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
        }
    }
}

impl ChannelSpec for CandleChannel {
    type Frame = CandleFrame;

    fn name(&self) -> &'static str {
        "candles"
    }

    fn path(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("symbol", &self.symbol)
            .append_pair("interval", &self.interval)
            .finish();
        format!("/ws/market?{query}")
    }

    fn keys_field(&self) -> Option<&'static str> {
        None
    }
}
