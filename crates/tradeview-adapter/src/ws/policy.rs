/*
[INPUT]:  Reconnect attempt number
[OUTPUT]: Delay before the next attempt, or give-up
[POS]:    WebSocket layer - configurable reconnect policy
[UPDATE]: When adding retry strategies
*/

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay of the original client between reconnects
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;

/// How a channel connection retries after a drop or a failed connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Same delay every time
    Fixed {
        delay_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
    /// Doubling delay starting at `base_ms`, clamped at `max_ms`
    Exponential {
        base_ms: u64,
        max_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed {
            delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        ReconnectPolicy::Fixed {
            delay_ms: duration_ms(delay),
            max_attempts: None,
        }
    }

    pub fn exponential(base: Duration, max: Duration) -> Self {
        ReconnectPolicy::Exponential {
            base_ms: duration_ms(base),
            max_ms: duration_ms(max),
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(self, limit: u32) -> Self {
        match self {
            ReconnectPolicy::Fixed { delay_ms, .. } => ReconnectPolicy::Fixed {
                delay_ms,
                max_attempts: Some(limit),
            },
            ReconnectPolicy::Exponential { base_ms, max_ms, .. } => {
                ReconnectPolicy::Exponential {
                    base_ms,
                    max_ms,
                    max_attempts: Some(limit),
                }
            }
        }
    }

    /// Delay before retry number `attempt` (1-based); `None` means stop retrying
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            ReconnectPolicy::Fixed {
                delay_ms,
                max_attempts,
            } => {
                if exceeded(attempt, max_attempts) {
                    return None;
                }
                Some(Duration::from_millis(delay_ms))
            }
            ReconnectPolicy::Exponential {
                base_ms,
                max_ms,
                max_attempts,
            } => {
                if exceeded(attempt, max_attempts) {
                    return None;
                }
                let exp = attempt.saturating_sub(1).min(32);
                let millis = base_ms.saturating_mul(1u64 << exp);
                Some(Duration::from_millis(millis.min(max_ms)))
            }
        }
    }
}

fn exceeded(attempt: u32, max_attempts: Option<u32>) -> bool {
    matches!(max_attempts, Some(limit) if attempt > limit)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
