//! Retry strategy for batch delivery.
//!
//! The default matches the connector's historical policy: 20 total attempts
//! with a fixed 3 second pause between them, retrying on any network error
//! or non-success HTTP status. `Immediate` retries without pausing and is
//! meant for tests and latency-sensitive hosts.
//!
//! Configured as a string: `"fixed,20,3"` or `"immediate,5"`. Invalid input
//! falls back to the default with a debug log rather than failing startup.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::debug;

const DEFAULT_ATTEMPTS: usize = 20;
const DEFAULT_DELAY_SECS: u64 = 3;

/// How delivery attempts are spaced and bounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Up to `.0` total attempts, pausing `.1` seconds between them.
    FixedInterval(usize, u64),
    /// Up to `.0` total attempts with no pause.
    Immediate(usize),
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::FixedInterval(DEFAULT_ATTEMPTS, DEFAULT_DELAY_SECS)
    }
}

impl RetryStrategy {
    /// Total attempt budget, never less than one.
    #[must_use]
    pub fn attempts(&self) -> usize {
        match self {
            RetryStrategy::FixedInterval(attempts, _) | RetryStrategy::Immediate(attempts) => {
                (*attempts).max(1)
            }
        }
    }

    /// Pause between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        match self {
            RetryStrategy::FixedInterval(_, delay_secs) => Duration::from_secs(*delay_secs),
            RetryStrategy::Immediate(_) => Duration::ZERO,
        }
    }
}

impl<'de> Deserialize<'de> for RetryStrategy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        let mut parts = value.split(',').map(str::trim);

        let strategy = parts.next();
        let attempts: Option<usize> = parts.next().and_then(|v| v.parse().ok());
        let delay: Option<u64> = parts.next().and_then(|v| v.parse().ok());

        match (strategy, attempts) {
            (Some("immediate"), Some(attempts)) => Ok(RetryStrategy::Immediate(attempts)),
            (Some("fixed"), Some(attempts)) => Ok(RetryStrategy::FixedInterval(
                attempts,
                delay.unwrap_or(DEFAULT_DELAY_SECS),
            )),
            _ => {
                debug!("OUTPUT | Invalid retry strategy `{value}`, using default");
                Ok(RetryStrategy::default())
            }
        }
    }
}
