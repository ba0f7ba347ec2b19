//! In-memory buffering of accepted events and batch drain.
//!
//! Accepted events are held as serialized, newline-terminated lines in
//! arrival order. The buffer reports when the size threshold is reached;
//! the caller owns the drain decision, so the buffer can momentarily exceed
//! its bound by one element between an append and the triggered drain.

use std::collections::VecDeque;

use tracing::warn;

use crate::event_bus::EventRecord;
use crate::transform;

/// FIFO accumulator of serialized accepted events.
#[derive(Debug)]
pub struct Buffer {
    lines: VecDeque<String>,
    capacity: usize,
    total_received: u64,
    parse_failures: u64,
}

impl Buffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
            total_received: 0,
            parse_failures: 0,
        }
    }

    /// Appends a serialized event and reports whether the buffer has reached
    /// its size threshold and should be drained.
    pub fn append(&mut self, line: String) -> bool {
        self.total_received += 1;
        self.lines.push_back(line + "\n");
        self.lines.len() >= self.capacity
    }

    /// Drains every buffered line into a delivery batch.
    ///
    /// Each line is parsed back to a record, projected through the field
    /// allow-list, and stamped with `sendtime`. A line that no longer parses
    /// is counted and skipped rather than aborting the drain.
    pub fn drain(&mut self, fields: &[String], now: u64) -> Vec<EventRecord> {
        let mut batch = Vec::with_capacity(self.lines.len());
        for line in self.lines.drain(..) {
            match serde_json::from_str::<EventRecord>(&line) {
                Ok(mut record) => {
                    transform::project_fields(&mut record, fields);
                    transform::stamp_sendtime(&mut record, now);
                    batch.push(record);
                }
                Err(e) => {
                    self.parse_failures += 1;
                    warn!("OUTPUT | Dropping unparseable buffered line: {e}");
                }
            }
        }
        batch
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total lines appended over the buffer's lifetime.
    #[must_use]
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// Lines dropped at drain time because they no longer parsed.
    #[must_use]
    pub fn parse_failures(&self) -> u64 {
        self.parse_failures
    }
}
