mod common;

use futures::stream;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use webpush_relay::{
    notifications::{
        DispatchFailure, DispatchOutcome, NotificationDispatcher, NotificationPayload,
        TransportError,
    },
    storage::{DeviceStore, FileDeviceStore, InMemoryDeviceStore, StorageError},
};

#[tokio::test]
async fn test_send_one_passes_record_through_to_transport() {
    let store = Arc::new(InMemoryDeviceStore::new());
    let transport = common::RecordingTransport::new();
    let dispatcher = NotificationDispatcher::new(store, transport.clone());
    let record = common::record("phone", &common::identity());

    let result = dispatcher
        .send_one(&record, &NotificationPayload::new("T", "B").with_tag("x"))
        .await;

    assert!(result.is_delivered());
    assert_eq!(result.device_name, "phone");
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].endpoint, common::endpoint_for("phone"));
    assert_eq!(sent[0].subject, "mailto:ops@example.com");
    assert_eq!(sent[0].payload, json!({ "title": "T", "body": "B", "tag": "x" }));
}

#[tokio::test]
async fn test_send_one_captures_transport_failure() {
    let store = Arc::new(InMemoryDeviceStore::new());
    let transport = common::RecordingTransport::new();
    transport.fail_for("phone");
    let dispatcher = NotificationDispatcher::new(store, transport);

    let result = dispatcher
        .send_one(
            &common::record("phone", &common::identity()),
            &NotificationPayload::new("T", "B"),
        )
        .await;

    assert!(!result.is_delivered());
    match result.outcome {
        DispatchOutcome::Failed(DispatchFailure::Transport(TransportError::Rejected {
            status_code,
            response_body,
        })) => {
            assert_eq!(status_code, 410);
            assert!(response_body.contains("expired"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_an_ordinary_failure() {
    let store = Arc::new(InMemoryDeviceStore::new());
    let dispatcher = NotificationDispatcher::new(store, Arc::new(common::TimeoutTransport));

    let result = dispatcher
        .send_one(
            &common::record("phone", &common::identity()),
            &NotificationPayload::new("T", "B"),
        )
        .await;

    assert_eq!(
        result.failure(),
        Some(&DispatchFailure::Transport(TransportError::Timeout))
    );
}

#[tokio::test]
async fn test_one_failing_device_does_not_stop_the_rest() {
    let store = Arc::new(InMemoryDeviceStore::new());
    let identity = common::identity();
    for name in ["alpha", "bravo", "charlie"] {
        store.save(&common::record(name, &identity)).await.unwrap();
    }
    let transport = common::RecordingTransport::new();
    transport.fail_for("bravo");
    let dispatcher = NotificationDispatcher::new(store, transport.clone());

    let report = dispatcher.send_simple("T", "B").await.unwrap();

    assert_eq!(report.len(), 3);
    assert_eq!(report.delivered().count(), 2);
    let failed: Vec<_> = report.failed().map(|r| r.device_name.as_str()).collect();
    assert_eq!(failed, vec!["bravo"]);
    assert!(report.any_delivered());
    assert!(report.is_success());
    assert_eq!(transport.sent().len(), 3);
}

#[tokio::test]
async fn test_results_follow_enumeration_order() {
    let store = Arc::new(InMemoryDeviceStore::new());
    let identity = common::identity();
    let records = vec![
        Ok(common::record("zulu", &identity)),
        Ok(common::record("alpha", &identity)),
        Ok(common::record("mike", &identity)),
    ];
    let transport = common::RecordingTransport::new();
    let dispatcher = NotificationDispatcher::new(store, transport.clone());

    let report = dispatcher
        .send_to_all(stream::iter(records), &NotificationPayload::new("T", "B"))
        .await;

    let names: Vec<_> = report.results.iter().map(|r| r.device_name.as_str()).collect();
    assert_eq!(names, vec!["zulu", "alpha", "mike"]);
    let endpoints: Vec<_> = transport.sent().into_iter().map(|s| s.endpoint).collect();
    assert_eq!(
        endpoints,
        vec![
            common::endpoint_for("zulu"),
            common::endpoint_for("alpha"),
            common::endpoint_for("mike"),
        ]
    );
}

#[tokio::test]
async fn test_unreadable_record_is_reported_not_fatal() {
    let store = Arc::new(InMemoryDeviceStore::new());
    let identity = common::identity();
    let records = vec![
        Ok(common::record("first", &identity)),
        Err(StorageError::NotFound("vanished".to_string())),
        Ok(common::record("last", &identity)),
    ];
    let transport = common::RecordingTransport::new();
    let dispatcher = NotificationDispatcher::new(store, transport.clone());

    let report = dispatcher
        .send_to_all(stream::iter(records), &NotificationPayload::new("T", "B"))
        .await;

    assert_eq!(report.len(), 3);
    assert_eq!(report.delivered().count(), 2);
    assert!(matches!(
        report.results[1].failure(),
        Some(DispatchFailure::Storage(_))
    ));
    assert_eq!(report.results[1].device_name, "vanished");
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn test_broadcast_over_file_store_skips_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileDeviceStore::new(dir.path()));
    let identity = common::identity();
    store.save(&common::record("desk", &identity)).await.unwrap();
    store.save(&common::record("phone", &identity)).await.unwrap();
    std::fs::write(dir.path().join("corrupt.json"), "[]").unwrap();

    let transport = common::RecordingTransport::new();
    let dispatcher = NotificationDispatcher::new(store, transport.clone());

    let report = dispatcher
        .broadcast(&NotificationPayload::new("T", "B"))
        .await
        .unwrap();

    assert_eq!(report.len(), 3);
    assert_eq!(report.delivered().count(), 2);
    let failed: Vec<_> = report.failed().map(|r| r.device_name.as_str()).collect();
    assert_eq!(failed, vec!["corrupt"]);
}

#[tokio::test]
async fn test_broadcast_to_empty_store() {
    let store = Arc::new(InMemoryDeviceStore::new());
    let transport = common::RecordingTransport::new();
    let dispatcher = NotificationDispatcher::new(store, transport.clone());

    let report = dispatcher.send_simple("T", "B").await.unwrap();

    assert!(report.is_empty());
    assert!(!report.any_delivered());
    assert!(report.is_success());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_each_device_is_signed_with_its_own_identity() {
    let store = Arc::new(InMemoryDeviceStore::new());
    let old = webpush_relay::notifications::VapidIdentity::generate("old@example.com").unwrap();
    let new = common::identity();
    store.save(&common::record("legacy", &old)).await.unwrap();
    store.save(&common::record("modern", &new)).await.unwrap();

    let transport = common::RecordingTransport::new();
    let dispatcher = NotificationDispatcher::new(store, transport.clone());
    dispatcher.send_simple("T", "B").await.unwrap();

    let subjects: Vec<_> = transport.sent().into_iter().map(|s| s.subject).collect();
    assert_eq!(
        subjects,
        vec!["mailto:old@example.com", "mailto:ops@example.com"]
    );
}

#[tokio::test]
async fn test_fan_out_with_no_delivery_is_not_a_success() {
    let store = Arc::new(InMemoryDeviceStore::new());
    store
        .save(&common::record("phone", &common::identity()))
        .await
        .unwrap();
    let transport = common::RecordingTransport::new();
    transport.fail_for("phone");
    let dispatcher = NotificationDispatcher::new(store, transport);

    let report = dispatcher.send_simple("T", "B").await.unwrap();

    assert_eq!(report.len(), 1);
    assert!(!report.is_success());
}
