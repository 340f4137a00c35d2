/*
[INPUT]:  Historical candles and live candle ticks
[OUTPUT]: Bar values keyed by aligned interval start, Interval parsing
[POS]:    Series layer - bar and interval primitives
[UPDATE]: When adding intervals or changing bar fields
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::http::SyncError;
use crate::types::Candle;

/// One OHLCV interval; `time` is the interval start in unix seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

impl From<Candle> for Bar {
    fn from(candle: Candle) -> Self {
        Self {
            time: candle.open_time.timestamp(),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    FourHours,
    OneDay,
}

impl Interval {
    pub const ALL: [Interval; 6] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::OneHour,
        Interval::FourHours,
        Interval::OneDay,
    ];

    /// Wire name used in candle URLs
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1D",
        }
    }

    pub fn seconds(self) -> i64 {
        match self {
            Interval::OneMinute => 60,
            Interval::FiveMinutes => 300,
            Interval::FifteenMinutes => 900,
            Interval::OneHour => 3_600,
            Interval::FourHours => 14_400,
            Interval::OneDay => 86_400,
        }
    }

    /// Start of the interval containing `time`
    pub fn align(self, time: i64) -> i64 {
        time - time.rem_euclid(self.seconds())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "1m" => Ok(Interval::OneMinute),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            "1h" | "1H" => Ok(Interval::OneHour),
            "4h" | "4H" => Ok(Interval::FourHours),
            "1D" | "1d" => Ok(Interval::OneDay),
            other => Err(SyncError::Validation(format!("unsupported interval: {other}"))),
        }
    }
}
