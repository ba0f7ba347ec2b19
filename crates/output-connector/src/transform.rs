//! Per-event and per-batch record transformations.
//!
//! Tag assignment and line serialization happen at ingestion time; field
//! projection and `sendtime` stamping happen at drain time so they apply to
//! the batch as a whole.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};

use crate::error::ConnectorError;
use crate::event_bus::EventRecord;

/// Field carrying the configured tags on every delivered record.
pub(crate) const TAGS_FIELD: &str = "tags";

/// Field stamped with the delivery timestamp at drain time.
pub(crate) const SENDTIME_FIELD: &str = "sendtime";

/// Assigns the configured tags to the record, replacing any existing value.
pub fn apply_tags(record: &mut EventRecord, tags: Option<&Map<String, Value>>) {
    if let Some(tags) = tags {
        record.insert(TAGS_FIELD.to_string(), Value::Object(tags.clone()));
    }
}

/// Serializes a record to its buffered line form.
pub fn serialize_line(record: &EventRecord) -> Result<String, ConnectorError> {
    serde_json::to_string(record).map_err(ConnectorError::from)
}

/// Applies the field allow-list to a record.
///
/// An empty allow-list leaves the record untouched. `tags` always survives
/// projection so configured tags are never stripped from delivered records;
/// `sendtime` is stamped after projection and needs no exemption.
pub fn project_fields(record: &mut EventRecord, fields: &[String]) {
    if fields.is_empty() {
        return;
    }
    let dropped: Vec<String> = record
        .keys()
        .filter(|key| key.as_str() != TAGS_FIELD && !fields.iter().any(|field| field == *key))
        .cloned()
        .collect();
    for key in dropped {
        record.remove(&key);
    }
}

/// Stamps the record with the delivery timestamp in integer Unix seconds.
pub fn stamp_sendtime(record: &mut EventRecord, now: u64) {
    record.insert(SENDTIME_FIELD.to_string(), Value::from(now));
}

/// Current Unix time in seconds.
#[must_use]
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
