//! Reference host for the output connector.
//!
//! Reads newline-delimited JSON log events from stdin, submits them to the
//! connector, and logs delivery reports. Connector settings come from
//! `OUTPUT_*` environment variables:
//!
//! ```text
//! OUTPUT_URL=https://log-api.newrelic.com/log/v1 \
//! OUTPUT_LICENSE_KEY=... \
//! OUTPUT_MAX_BUFFER_SIZE=100 \
//! OUTPUT_FLUSH_INTERVAL=5 \
//! OUTPUT_FIELDS=msg,severity \
//! OUTPUT_TAGS='{"host":"web-01"}' \
//! OUTPUT_FILTERS='[[{"field":"logSource","match":"hostname.*"}]]' \
//! log-forwarder < events.ndjson
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use output_connector::{Config, Connector, ConnectorEvent, EventBus, ParsedEvent};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = config_from_env();
    let flush_period = config.clone().normalize().flush_period();

    let (mut bus, bus_tx) = EventBus::channel();
    let (mut connector, tx) = match Connector::new(config, bus_tx) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Unable to start output connector: {e}");
            return;
        }
    };
    let cancel_token = connector.cancel_token();

    info!("log-forwarder started");

    let connector_task = tokio::spawn(async move { connector.spin().await });

    // Surface delivery reports to the operator.
    tokio::spawn(async move {
        while let Some(event) = bus.rx.recv().await {
            match event {
                ConnectorEvent::BatchDelivered { count, attempts } => {
                    debug!("Delivered batch of {count} event(s) in {attempts} attempt(s)");
                }
                ConnectorEvent::DeliveryFailed { attempts, message } => {
                    error!("Dropped batch after {attempts} attempt(s): {message}");
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let record = match serde_json::from_str::<Value>(line) {
                    Ok(Value::Object(record)) => record,
                    // Stand-in for the host's parser: wrap plain text.
                    _ => {
                        let mut record = serde_json::Map::new();
                        record.insert("message".to_string(), Value::from(line));
                        record
                    }
                };
                if tx.send(ParsedEvent::new(record)).await.is_err() {
                    warn!("Connector stopped, no longer accepting events");
                    break;
                }
            }
            Ok(None) => {
                debug!("stdin closed");
                break;
            }
            Err(e) => {
                error!("Failed to read stdin: {e}");
                break;
            }
        }
    }

    // Let the flush timer pick up the tail, then a grace period for
    // in-flight deliveries the connector itself does not await.
    tokio::time::sleep(flush_period + std::time::Duration::from_secs(1)).await;
    cancel_token.cancel();
    if let Err(e) = connector_task.await {
        error!("Connector task failed: {e}");
    }

    info!("log-forwarder stopped");
}

/// Builds the connector configuration from `OUTPUT_*` environment
/// variables. Missing or malformed values fall back to defaults; the
/// connector's own normalization and validation have the final say.
fn config_from_env() -> Config {
    let defaults = Config::default();

    let tags = env::var("OUTPUT_TAGS")
        .ok()
        .and_then(|raw| match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(tags)) => Some(tags),
            _ => {
                error!("OUTPUT_TAGS is not a JSON object, ignoring");
                None
            }
        });

    let filters = env::var("OUTPUT_FILTERS")
        .ok()
        .and_then(|raw| {
            match serde_json::from_str::<Vec<Vec<output_connector::config::FilterRule>>>(&raw) {
                Ok(filters) => Some(filters),
                Err(e) => {
                    error!("OUTPUT_FILTERS is not a list of rule groups ({e}), ignoring");
                    None
                }
            }
        })
        .unwrap_or_default();

    let fields = env::var("OUTPUT_FIELDS")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default();

    let retry = env::var("OUTPUT_RETRY")
        .ok()
        .and_then(|raw| serde_json::from_value(Value::String(raw)).ok())
        .unwrap_or(defaults.retry);

    Config {
        url: env::var("OUTPUT_URL").unwrap_or_default(),
        license_key: env::var("OUTPUT_LICENSE_KEY").unwrap_or_default(),
        max_buffer_size: env::var("OUTPUT_MAX_BUFFER_SIZE")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(defaults.max_buffer_size),
        flush_interval: env::var("OUTPUT_FLUSH_INTERVAL")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(defaults.flush_interval),
        tags,
        fields,
        filters,
        drop_event_ttl: env::var("OUTPUT_DROP_EVENT_TTL")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false),
        debug: env::var("OUTPUT_DEBUG")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false),
        flush_timeout: env::var("OUTPUT_FLUSH_TIMEOUT")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(defaults.flush_timeout),
        retry,
    }
}
