//! Batch delivery over HTTP with compression and retry.
//!
//! A batch is serialized to a single JSON array, gzip-compressed, and
//! POSTed with the license-key header. Any network error or non-success
//! status is retried with the configured strategy; no distinction is made
//! between 4xx and 5xx. After the attempt budget is exhausted the batch is
//! dropped and a [`ConnectorEvent::DeliveryFailed`] is published; there is
//! no re-queue and no persistence.
//!
//! The connector dispatches `send` as a spawned task and never joins it, so
//! several deliveries can be in flight at once and delivery order across
//! batches is not guaranteed.

use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use tokio::sync::mpsc::Sender;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::config::{Config, RetryStrategy};
use crate::error::ConnectorError;
use crate::event_bus::{publish, ConnectorEvent, EventRecord};

const LICENSE_KEY_HEADER: &str = "x-license-key";

/// Ships batches to the configured endpoint.
///
/// Cheap to clone; every spawned delivery task gets its own copy.
#[derive(Clone, Debug)]
pub struct Flusher {
    client: reqwest::Client,
    url: String,
    retry: RetryStrategy,
    debug_diagnostics: bool,
    headers: HeaderMap,
    bus: Sender<ConnectorEvent>,
}

impl Flusher {
    pub fn new(config: &Config, bus: Sender<ConnectorEvent>) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.flush_timeout))
            .build()?;
        let headers = build_headers(&config.license_key)?;

        Ok(Flusher {
            client,
            url: config.url.clone(),
            retry: config.retry,
            debug_diagnostics: config.debug,
            headers,
            bus,
        })
    }

    /// Delivers one batch, retrying per the configured strategy.
    ///
    /// Never returns an error: terminal outcomes are reported on the event
    /// bus because callers have already let go of the batch.
    pub async fn send(&self, batch: Vec<EventRecord>) {
        let count = batch.len();
        let body = match encode_payload(&batch) {
            Ok(body) => body,
            Err(e) => {
                error!("OUTPUT | Dropping batch of {count} events, could not encode: {e}");
                publish(
                    &self.bus,
                    ConnectorEvent::DeliveryFailed {
                        attempts: 0,
                        message: e.to_string(),
                    },
                );
                return;
            }
        };

        let max_attempts = self.retry.attempts();
        let delay = self.retry.delay();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let last_failure = match self
                .client
                .post(&self.url)
                .headers(self.headers.clone())
                .body(body.clone())
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    if self.debug_diagnostics {
                        debug!(
                            "OUTPUT | {} attempt(s) {} {}",
                            attempts,
                            self.url,
                            response.status()
                        );
                    }
                    publish(&self.bus, ConnectorEvent::BatchDelivered { count, attempts });
                    return;
                }
                Ok(response) => format!("unexpected status {}", response.status()),
                Err(e) => e.to_string(),
            };

            if attempts >= max_attempts {
                error!(
                    "OUTPUT | Failed to deliver batch of {count} events after {attempts} attempts: {last_failure}"
                );
                publish(
                    &self.bus,
                    ConnectorEvent::DeliveryFailed {
                        attempts,
                        message: last_failure,
                    },
                );
                return;
            }

            if self.debug_diagnostics {
                debug!("OUTPUT | Attempt {attempts} failed ({last_failure}), retrying");
            }
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }
}

fn build_headers(license_key: &str) -> Result<HeaderMap, ConnectorError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    headers.insert(
        HeaderName::from_static(LICENSE_KEY_HEADER),
        HeaderValue::from_str(license_key).map_err(|e| {
            ConnectorError::InvalidConfig(format!("license key is not a valid header value: {e}"))
        })?,
    );
    Ok(headers)
}

/// Serializes the batch to a JSON array and gzip-compresses it.
fn encode_payload(batch: &[EventRecord]) -> Result<Vec<u8>, ConnectorError> {
    let json = serde_json::to_vec(batch)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}
