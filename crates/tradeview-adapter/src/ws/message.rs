/*
[INPUT]:  Subscription keys, raw inbound text frames
[OUTPUT]: Outbound subscribe/unsubscribe frames, typed inbound candle frames
[POS]:    WebSocket layer - frame encoding and decoding
[UPDATE]: When adding new message types or changing format
*/

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::series::Bar;

/// Outbound control action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

impl SubscriptionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionAction::Subscribe => "subscribe",
            SubscriptionAction::Unsubscribe => "unsubscribe",
        }
    }
}

/// `{"type": "subscribe"|"unsubscribe", <keys_field>: [...]}`
pub fn subscription_frame(action: SubscriptionAction, keys_field: &str, keys: &[String]) -> Value {
    let mut frame = Map::new();
    frame.insert("type".to_string(), Value::String(action.as_str().to_string()));
    frame.insert(
        keys_field.to_string(),
        Value::Array(keys.iter().cloned().map(Value::String).collect()),
    );
    Value::Object(frame)
}

/// Frames pushed on a candle feed
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CandleFrame {
    Candle { candle: Bar },
    #[serde(other)]
    Other,
}
