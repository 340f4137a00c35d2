/*
[INPUT]:  Backend JSON schema and serde requirements
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for REST and WebSocket payloads
[UPDATE]: When the backend schema changes or new types are added
*/

use serde::{Deserialize, Serialize};

use super::models::Candle;

/// Lifetime used when the server omits `expiresIn`
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

/// Candle history, newest first as delivered by the backend.
///
/// Older deployments return a bare array instead of the wrapped object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandlesResponse {
    Wrapped {
        #[serde(default)]
        candles: Vec<Candle>,
    },
    Bare(Vec<Candle>),
}

impl CandlesResponse {
    pub fn into_candles(self) -> Vec<Candle> {
        match self {
            CandlesResponse::Wrapped { candles } => candles,
            CandlesResponse::Bare(candles) => candles,
        }
    }
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message)
    }
}
