mod common;

use std::io::Read;
use std::time::Duration;

use serde_json::json;
use tokio::time::{sleep, timeout};

use output_connector::config::RetryStrategy;
use output_connector::{Config, Connector, ConnectorEvent, EventBus, EventRecord, ParsedEvent};

use common::mock_server::MockServer;

fn record(value: serde_json::Value) -> EventRecord {
    value
        .as_object()
        .expect("test event must be an object")
        .clone()
}

fn base_config(server: &MockServer) -> Config {
    Config {
        url: format!("{}/log/v1", server.url()),
        license_key: "integration-license-key".to_string(),
        retry: RetryStrategy::Immediate(3),
        ..Default::default()
    }
}

async fn wait_for_requests(server: &MockServer, count: usize) {
    let poll = async {
        while server.request_count() < count {
            sleep(Duration::from_millis(25)).await;
        }
    };
    timeout(Duration::from_secs(5), poll)
        .await
        .unwrap_or_else(|_| {
            panic!(
                "timed out waiting for {count} request(s), saw {}",
                server.request_count()
            )
        });
}

fn decode_batch(body: &[u8]) -> Vec<EventRecord> {
    let mut decoder = flate2::read::GzDecoder::new(body);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .expect("body should be valid gzip");
    serde_json::from_slice(&decompressed).expect("payload should be a JSON array of records")
}

#[tokio::test]
async fn connector_ships_projected_batch_when_buffer_fills() {
    let server = MockServer::start(202, vec![]).await;

    let config = Config {
        max_buffer_size: 2,
        flush_interval: 100.0,
        fields: vec!["msg".to_string()],
        ..base_config(&server)
    };

    let (mut bus, bus_tx) = EventBus::channel();
    let (mut connector, tx) = Connector::new(config, bus_tx).expect("connector should build");
    let cancel = connector.cancel_token();
    let task = tokio::spawn(async move { connector.spin().await });

    tx.send(ParsedEvent::new(record(json!({"msg": "a", "extra": 1}))))
        .await
        .expect("send should succeed");
    tx.send(ParsedEvent::new(record(json!({"msg": "b", "extra": 2}))))
        .await
        .expect("send should succeed");

    wait_for_requests(&server, 1).await;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/log/v1");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("content-encoding"), Some("gzip"));
    assert_eq!(
        request.header("x-license-key"),
        Some("integration-license-key")
    );

    let batch = decode_batch(&request.body);
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0]["msg"], "a");
    assert_eq!(batch[1]["msg"], "b");
    for entry in &batch {
        assert!(entry.contains_key("sendtime"));
        assert!(!entry.contains_key("extra"));
        assert_eq!(entry.len(), 2);
    }

    let report = timeout(Duration::from_secs(5), bus.rx.recv())
        .await
        .expect("should receive a delivery report");
    assert!(matches!(
        report,
        Some(ConnectorEvent::BatchDelivered {
            count: 2,
            attempts: 1
        })
    ));

    cancel.cancel();
    task.await.expect("connector task should stop");
}

#[tokio::test]
async fn connector_flushes_on_timer() {
    let server = MockServer::start(202, vec![]).await;

    let config = Config {
        max_buffer_size: 100,
        flush_interval: 0.5,
        ..base_config(&server)
    };

    let (_bus, bus_tx) = EventBus::channel();
    let (mut connector, tx) = Connector::new(config, bus_tx).expect("connector should build");
    let cancel = connector.cancel_token();
    let task = tokio::spawn(async move { connector.spin().await });

    tx.send(ParsedEvent::new(record(json!({"msg": "timed"}))))
        .await
        .expect("send should succeed");

    // Far below the size threshold, so only the timer can ship this.
    wait_for_requests(&server, 1).await;

    let batch = decode_batch(&server.requests()[0].body);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0]["msg"], "timed");

    cancel.cancel();
    task.await.expect("connector task should stop");
}

#[tokio::test]
async fn delivery_retries_through_transient_failures() {
    // First 19 attempts fail, the 20th succeeds.
    let server = MockServer::start(202, vec![500; 19]).await;

    let config = Config {
        max_buffer_size: 1,
        flush_interval: 100.0,
        retry: RetryStrategy::Immediate(20),
        ..base_config(&server)
    };

    let (mut bus, bus_tx) = EventBus::channel();
    let (mut connector, tx) = Connector::new(config, bus_tx).expect("connector should build");
    let cancel = connector.cancel_token();
    let task = tokio::spawn(async move { connector.spin().await });

    tx.send(ParsedEvent::new(record(json!({"msg": "persistent"}))))
        .await
        .expect("send should succeed");

    wait_for_requests(&server, 20).await;

    let report = timeout(Duration::from_secs(5), bus.rx.recv())
        .await
        .expect("should receive a delivery report");
    assert!(matches!(
        report,
        Some(ConnectorEvent::BatchDelivered {
            count: 1,
            attempts: 20
        })
    ));

    // Exactly one report: success after retries is not also a failure.
    assert!(bus.rx.try_recv().is_err());
    assert_eq!(server.request_count(), 20);

    cancel.cancel();
    task.await.expect("connector task should stop");
}

#[tokio::test]
async fn delivery_gives_up_after_retry_budget_and_drops_batch() {
    let server = MockServer::start(500, vec![]).await;

    let config = Config {
        max_buffer_size: 1,
        flush_interval: 100.0,
        retry: RetryStrategy::Immediate(20),
        ..base_config(&server)
    };

    let (mut bus, bus_tx) = EventBus::channel();
    let (mut connector, tx) = Connector::new(config, bus_tx).expect("connector should build");
    let cancel = connector.cancel_token();
    let task = tokio::spawn(async move { connector.spin().await });

    tx.send(ParsedEvent::new(record(json!({"msg": "doomed"}))))
        .await
        .expect("send should succeed");

    wait_for_requests(&server, 20).await;

    let report = timeout(Duration::from_secs(5), bus.rx.recv())
        .await
        .expect("should receive a delivery report");
    match report {
        Some(ConnectorEvent::DeliveryFailed { attempts, message }) => {
            assert_eq!(attempts, 20);
            assert!(message.contains("500"), "message: {message}");
        }
        other => panic!("expected DeliveryFailed, got {other:?}"),
    }

    // The batch is dropped, not re-queued: no further requests show up.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(server.request_count(), 20);
    assert!(bus.rx.try_recv().is_err());

    cancel.cancel();
    task.await.expect("connector task should stop");
}

#[tokio::test]
async fn filtered_events_never_reach_the_wire() {
    let server = MockServer::start(202, vec![]).await;

    let config: Config = serde_json::from_value(json!({
        "url": format!("{}/log/v1", server.url()),
        "licenseKey": "integration-license-key",
        "maxBufferSize": 1,
        "flushInterval": 100.0,
        "retry": "immediate,3",
        "filters": [[{"field": "meta.host", "match": "^web-"}]]
    }))
    .expect("config should deserialize");

    let (_bus, bus_tx) = EventBus::channel();
    let (mut connector, tx) = Connector::new(config, bus_tx).expect("connector should build");
    let cancel = connector.cancel_token();
    let task = tokio::spawn(async move { connector.spin().await });

    tx.send(ParsedEvent::new(record(
        json!({"msg": "drop me", "meta": {"host": "db-01"}}),
    )))
    .await
    .expect("send should succeed");
    tx.send(ParsedEvent::new(record(
        json!({"msg": "keep me", "meta": {"host": "web-01"}}),
    )))
    .await
    .expect("send should succeed");

    wait_for_requests(&server, 1).await;
    // Give a second request a moment to show up if one were coming.
    sleep(Duration::from_millis(200)).await;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let batch = decode_batch(&requests[0].body);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0]["msg"], "keep me");

    cancel.cancel();
    task.await.expect("connector task should stop");
}
