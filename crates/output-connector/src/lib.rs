//! # Output Connector
//!
//! This crate implements an output connector for a log-processing pipeline:
//! it receives already-parsed log events from a host, decides which of them
//! should be forwarded, accumulates accepted events into batches, and ships
//! each batch to a telemetry-ingestion HTTP endpoint with gzip compression
//! and bounded retry.
//!
//! ## Architecture
//!
//! ```text
//!   Host pipeline
//!       │  ParsedEvent (mpsc)
//!       v
//!   ┌─────────────┐
//!   │  Connector  │ (event loop: TTL drop, tagging, filtering)
//!   └──────┬──────┘
//!          │ accepted lines
//!          v
//!   ┌─────────────┐
//!   │   Buffer    │ (size- or timer-triggered drain)
//!   └──────┬──────┘
//!          │ batch
//!          v
//!   ┌─────────────┐
//!   │   Flusher   │ (gzip + HTTP POST + retry, fire-and-forget)
//!   └──────┬──────┘
//!          │ ConnectorEvent (mpsc)
//!          v
//!   Host pipeline (delivery reports)
//! ```
//!
//! The host owns event sourcing, parsing, and process lifecycle; this crate
//! only exposes the narrow seam in [`event_bus`] plus the
//! [`Connector`](connector::Connector) start/stop contract.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

/// In-memory buffering of accepted events and batch drain
pub mod buffer;

/// Configuration surface - defaults, normalization, and validation
pub mod config;

/// Composition root wiring filters, buffer, and flusher to the host
pub mod connector;

/// Domain error type
pub mod error;

/// Narrow event seam between the host pipeline and the connector
pub mod event_bus;

/// Filter-matching engine over compiled field/pattern rules
pub mod filter;

/// Batch delivery over HTTP with compression and retry
pub mod flusher;

/// Per-event and per-batch record transformations
pub mod transform;

pub use config::Config;
pub use connector::Connector;
pub use error::ConnectorError;
pub use event_bus::{ConnectorEvent, EventBus, EventRecord, ParsedEvent};
