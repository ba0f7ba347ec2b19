//! Narrow event seam between the host pipeline and the connector.
//!
//! The host and the connector never call into each other directly. Inbound,
//! the host pushes [`ParsedEvent`]s into the sender returned by
//! [`Connector::new`](crate::connector::Connector::new). Outbound, the
//! connector publishes [`ConnectorEvent`]s on the channel created by
//! [`EventBus::channel`]; the host decides what to do with delivery reports.
//!
//! Outbound publishing never blocks event handling: if the host is not
//! draining the bus, reports are dropped with a warning.

use serde_json::Value;
use tokio::sync::mpsc::{self, Sender};
use tracing::warn;

/// A parsed log event: an arbitrary mapping from field names to values.
///
/// Owned by the host; the connector mutates it in place when applying tags
/// and timestamps.
pub type EventRecord = serde_json::Map<String, Value>;

/// Maximum capacity of the outbound event channel.
pub(crate) const MAX_EVENTS: usize = 100;

/// Inbound notification payload emitted by the host for every parsed event.
#[derive(Clone, Debug)]
pub struct ParsedEvent {
    /// The parsed log record.
    pub record: EventRecord,
    /// Opaque host context. Carried for host compatibility, never read.
    pub context: Option<Value>,
}

impl ParsedEvent {
    #[must_use]
    pub fn new(record: EventRecord) -> Self {
        Self {
            record,
            context: None,
        }
    }
}

/// Events published by the connector for the host to consume.
#[derive(Clone, Debug)]
pub enum ConnectorEvent {
    /// A batch was accepted by the remote endpoint.
    BatchDelivered {
        /// Number of records in the batch.
        count: usize,
        /// Total attempts spent, including the successful one.
        attempts: usize,
    },
    /// A batch was dropped after exhausting the retry budget.
    DeliveryFailed {
        /// Attempts spent before giving up.
        attempts: usize,
        /// Description of the last transport or HTTP failure.
        message: String,
    },
}

/// Outbound event bus owned by the host.
///
/// The consumer polls `rx` in a loop to observe delivery reports.
pub struct EventBus {
    pub rx: mpsc::Receiver<ConnectorEvent>,
}

impl EventBus {
    /// Creates the outbound bus and the sender handed to the connector.
    #[must_use]
    pub fn channel() -> (EventBus, Sender<ConnectorEvent>) {
        let (tx, rx) = mpsc::channel(MAX_EVENTS);
        (EventBus { rx }, tx)
    }
}

/// Publishes an event without blocking; a full or closed bus drops it.
pub(crate) fn publish(bus: &Sender<ConnectorEvent>, event: ConnectorEvent) {
    if let Err(e) = bus.try_send(event) {
        warn!("OUTPUT | Dropping connector event, bus unavailable: {e}");
    }
}
