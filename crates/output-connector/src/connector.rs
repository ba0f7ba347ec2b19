//! Composition root wiring filters, buffer, and flusher to the host.
//!
//! The connector runs as a single task: event handling, filter evaluation,
//! and buffer mutation all happen on the loop that receives host
//! notifications and timer ticks, so no locking is needed. The only
//! concurrent boundary is outbound delivery, which is spawned and never
//! joined.
//!
//! # Lifecycle
//!
//! ```rust,ignore
//! let (bus, bus_tx) = EventBus::channel();
//! let (mut connector, tx) = Connector::new(config, bus_tx)?;
//! let cancel = connector.cancel_token();
//!
//! let task = tokio::spawn(async move { connector.spin().await });
//! // ... host sends ParsedEvents through tx ...
//! cancel.cancel();
//! task.await?;
//! ```
//!
//! Stopping cancels the timer and the event subscription only: buffered
//! but undelivered lines are discarded and in-flight deliveries are not
//! awaited.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, Sender};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::buffer::Buffer;
use crate::config::Config;
use crate::error::ConnectorError;
use crate::event_bus::{ConnectorEvent, EventRecord, ParsedEvent};
use crate::filter::{FilterDecision, FilterSet};
use crate::flusher::Flusher;
use crate::transform;

/// Field marking an event as subject to time-to-live suppression.
const TTL_FIELD: &str = "ttlactive";

/// Capacity of the inbound event channel. Hosts block (apply backpressure)
/// when the connector falls this far behind.
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// The output connector: receives parsed events, filters and buffers them,
/// and ships batches on size or timer triggers.
pub struct Connector {
    config: Arc<Config>,
    filters: FilterSet,
    buffer: Buffer,
    flusher: Flusher,
    rx: mpsc::Receiver<ParsedEvent>,
    cancel_token: CancellationToken,
}

impl Connector {
    /// Builds the connector from host configuration.
    ///
    /// Normalizes and validates its own copy of the configuration and
    /// compiles the filter patterns once. Returns the sender the host uses
    /// to submit parsed events.
    pub fn new(
        config: Config,
        bus: Sender<ConnectorEvent>,
    ) -> Result<(Self, Sender<ParsedEvent>), ConnectorError> {
        let config = config.normalize();
        config.validate()?;
        let filters = FilterSet::compile(&config.filters)?;
        let flusher = Flusher::new(&config, bus)?;
        let buffer = Buffer::new(config.capacity());
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let connector = Self {
            config: Arc::new(config),
            filters,
            buffer,
            flusher,
            rx,
            cancel_token: CancellationToken::new(),
        };

        Ok((connector, tx))
    }

    /// Handles one parsed event: TTL drop, tagging, serialization, filter
    /// evaluation, and buffering with a size-triggered flush.
    pub fn handle_event(&mut self, mut record: EventRecord) {
        if self.config.drop_event_ttl && record.get(TTL_FIELD).is_some_and(is_truthy) {
            if self.config.debug {
                debug!("OUTPUT | Dropped event due to active TTL");
            }
            return;
        }

        transform::apply_tags(&mut record, self.config.tags.as_ref());

        let line = match transform::serialize_line(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("OUTPUT | Dropping event that failed to serialize: {e}");
                return;
            }
        };

        match self.filters.evaluate(&record) {
            FilterDecision::Accept => {
                if self.buffer.append(line) {
                    self.flush();
                }
            }
            FilterDecision::Reject(misses) => {
                if self.config.debug {
                    for miss in misses {
                        debug!(
                            "OUTPUT | Filter expression `{}` did not match `{}` (group {})",
                            miss.pattern, miss.value, miss.group
                        );
                    }
                }
            }
        }
    }

    /// Drains the buffer and dispatches the batch without waiting for the
    /// delivery to complete. An empty drain is a no-op.
    pub fn flush(&mut self) {
        let batch = self
            .buffer
            .drain(&self.config.fields, transform::unix_timestamp());
        if batch.is_empty() {
            return;
        }

        let flusher = self.flusher.clone();
        tokio::spawn(async move {
            flusher.send(batch).await;
        });
    }

    /// Event loop: handles host events and timer flushes until cancelled.
    ///
    /// Cancellation breaks the loop without a final drain; whatever is
    /// buffered is lost with the connector.
    pub async fn spin(&mut self) {
        let mut ticker = interval(self.config.flush_period());
        ticker.tick().await; // discard the immediate first tick

        loop {
            tokio::select! {
                Some(event) = self.rx.recv() => {
                    self.handle_event(event.record);
                }
                _ = ticker.tick() => {
                    self.flush();
                }
                () = self.cancel_token.cancelled() => {
                    debug!(
                        "OUTPUT | Shutting down, discarding {} buffered line(s)",
                        self.buffer.len()
                    );
                    break;
                }
            }
        }
    }

    /// Token for shutdown coordination; cancelling it stops [`Self::spin`].
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Number of currently buffered lines.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Host truthiness for marker fields: false, 0, empty string, and null are
/// falsy; everything else is truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
