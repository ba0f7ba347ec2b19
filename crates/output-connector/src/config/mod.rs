//! Configuration surface consumed by the connector.
//!
//! The host owns where configuration comes from (file, environment, API);
//! this module owns defaults, normalization, and validation. Out-of-range
//! numeric values are silently normalized, never rejected:
//!
//! - `max_buffer_size <= 0` becomes 100
//! - `flush_interval` of 0 (or unset) becomes 10 seconds; anything below
//!   0.5 becomes 1 second, capping the flush rate at 2 per second
//! - `flush_timeout` of 0 becomes 30 seconds
//!
//! Normalization happens once, at connector construction, on the
//! connector's own copy; a caller-supplied `Config` is never mutated in
//! place. `validate` only rejects what cannot be defaulted: a missing
//! delivery target or credential.
//!
//! Field names accept both snake_case and the camelCase spelling used by
//! host pipelines (`licenseKey`, `maxBufferSize`, ...).

pub mod filter_rule;
pub mod retry;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConnectorError;

pub use filter_rule::FilterRule;
pub use retry::RetryStrategy;

const NORMALIZED_BUFFER_SIZE: i64 = 100;
const DEFAULT_FLUSH_INTERVAL_SECS: f64 = 10.0;
const MIN_FLUSH_INTERVAL_SECS: f64 = 0.5;
const DEFAULT_FLUSH_TIMEOUT_SECS: u64 = 30;

/// Connector configuration.
///
/// Immutable after construction apart from the one-time defaulting applied
/// by [`Config::normalize`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delivery endpoint, e.g. `https://log-api.newrelic.com/log/v1`.
    pub url: String,

    /// Credential sent in the `X-License-Key` header.
    #[serde(alias = "licenseKey")]
    pub license_key: String,

    /// Buffered events that trigger a size-based flush.
    #[serde(alias = "maxBufferSize")]
    pub max_buffer_size: i64,

    /// Seconds between timer-based flushes.
    #[serde(alias = "flushInterval")]
    pub flush_interval: f64,

    /// Tags assigned verbatim to every event's `tags` field (overwrite,
    /// not merge).
    pub tags: Option<Map<String, Value>>,

    /// Field allow-list applied to delivered records; empty keeps all
    /// fields.
    pub fields: Vec<String>,

    /// Filter groups; see [`filter_rule`]. Empty accepts every event.
    #[serde(deserialize_with = "filter_rule::deserialize_filter_groups")]
    pub filters: Vec<Vec<FilterRule>>,

    /// Drop events carrying a truthy `ttlactive` field before filtering.
    #[serde(alias = "dropEventTTL")]
    pub drop_event_ttl: bool,

    /// Enables per-event diagnostic logging. No other behavioral effect.
    pub debug: bool,

    /// Per-request HTTP timeout in seconds.
    #[serde(alias = "flushTimeout")]
    pub flush_timeout: u64,

    /// Delivery retry strategy.
    pub retry: RetryStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            license_key: String::new(),
            max_buffer_size: 1,
            flush_interval: DEFAULT_FLUSH_INTERVAL_SECS,
            tags: None,
            fields: Vec::new(),
            filters: Vec::new(),
            drop_event_ttl: false,
            debug: false,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT_SECS,
            retry: RetryStrategy::default(),
        }
    }
}

impl Config {
    /// Applies one-time defaulting of out-of-range values.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.max_buffer_size <= 0 {
            self.max_buffer_size = NORMALIZED_BUFFER_SIZE;
        }
        if !self.flush_interval.is_finite() || self.flush_interval == 0.0 {
            self.flush_interval = DEFAULT_FLUSH_INTERVAL_SECS;
        }
        if self.flush_interval < MIN_FLUSH_INTERVAL_SECS {
            self.flush_interval = 1.0;
        }
        if self.flush_timeout == 0 {
            self.flush_timeout = DEFAULT_FLUSH_TIMEOUT_SECS;
        }
        self
    }

    /// Rejects configurations that cannot be defaulted into shape.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.url.trim().is_empty() {
            return Err(ConnectorError::InvalidConfig(
                "delivery url must be set".to_string(),
            ));
        }
        if self.license_key.trim().is_empty() {
            return Err(ConnectorError::InvalidConfig(
                "license key must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// Buffer capacity as a usize; call after [`Config::normalize`].
    #[must_use]
    pub fn capacity(&self) -> usize {
        usize::try_from(self.max_buffer_size).unwrap_or(NORMALIZED_BUFFER_SIZE as usize)
    }

    /// Timer-flush period; call after [`Config::normalize`].
    #[must_use]
    pub fn flush_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.flush_interval)
    }
}
