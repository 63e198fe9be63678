//! Command routing: success, failure and malformed payloads.

mod common;

use std::sync::Arc;

use ninabridge_core::{InboundMessage, PublishPipeline, QoS, TopicConfig};
use ninabridge_devices::{CommandRouter, RouteOutcome};
use serde_json::json;
use tokio::sync::{mpsc, watch};

use common::{FakeApi, RecordingTransport};

const RESPONSE_TOPIC: &str = "nina/mount/command_response";
const ERROR_TOPIC: &str = "nina/mount/command/error";

fn setup() -> (Arc<FakeApi>, Arc<RecordingTransport>, PublishPipeline, CommandRouter) {
    let api = Arc::new(FakeApi::new());
    let transport = Arc::new(RecordingTransport::new());
    let pipeline = PublishPipeline::start(transport.clone());
    let router = CommandRouter::new(api.clone(), pipeline.sender(), TopicConfig::default());
    (api, transport, pipeline, router)
}

#[tokio::test]
async fn test_park_publishes_exactly_one_response() {
    let (api, transport, pipeline, router) = setup();
    api.set_command_result(json!({"Response": "Parking", "Success": true}));

    let outcome = router
        .handle(InboundMessage::new("nina/mount/command", r#"{"action": "park"}"#))
        .await;
    pipeline.shutdown().await.unwrap();

    assert_eq!(outcome, RouteOutcome::Responded);
    let responses = transport.on(RESPONSE_TOPIC);
    assert_eq!(responses.len(), 1);
    assert!(!responses[0].retain());
    assert_eq!(responses[0].qos(), QoS::AtMostOnce);
    let body: serde_json::Value = serde_json::from_slice(responses[0].payload().as_bytes()).unwrap();
    assert_eq!(body["Response"], "Parking");
    assert!(transport.on(ERROR_TOPIC).is_empty());

    let commands = api.commands.lock();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].0, "mount");
    assert_eq!(commands[0].1.action, "park");
}

#[tokio::test]
async fn test_unsupported_action_publishes_exactly_one_error() {
    let (api, transport, pipeline, router) = setup();
    api.set_command_result(json!({"Success": true}));

    let outcome = router
        .handle(InboundMessage::new("nina/mount/command", r#"{"action": "dance"}"#))
        .await;
    pipeline.shutdown().await.unwrap();

    assert_eq!(outcome, RouteOutcome::Failed);
    assert!(transport.on(RESPONSE_TOPIC).is_empty());
    let errors = transport.on(ERROR_TOPIC);
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].retain());
    assert_eq!(errors[0].payload().as_text(), Some("Unsupported mount action: dance"));
}

#[tokio::test]
async fn test_invalid_tracking_mode_reports_error() {
    let (_api, transport, pipeline, router) = setup();

    let outcome = router
        .handle(InboundMessage::new(
            "nina/mount/command",
            r#"{"action": "tracking", "mode": "warp"}"#,
        ))
        .await;
    pipeline.shutdown().await.unwrap();

    assert_eq!(outcome, RouteOutcome::Failed);
    let texts = transport.texts_on(ERROR_TOPIC);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Invalid tracking mode"));
}

#[tokio::test]
async fn test_unsupported_target_uses_its_own_error_topic() {
    let (_api, transport, pipeline, router) = setup();

    let outcome = router
        .handle(InboundMessage::new("nina/dome/command", r#"{"action": "open"}"#))
        .await;
    pipeline.shutdown().await.unwrap();

    assert_eq!(outcome, RouteOutcome::Failed);
    assert_eq!(
        transport.texts_on("nina/dome/command/error"),
        vec!["Unsupported command target: dome".to_string()]
    );
}

#[tokio::test]
async fn test_unparseable_payload_is_dropped_silently() {
    let (api, transport, pipeline, router) = setup();

    for payload in ["not json", "{\"action\": "] {
        let outcome = router
            .handle(InboundMessage::new("nina/mount/command", payload))
            .await;
        assert_eq!(outcome, RouteOutcome::Dropped);
    }
    pipeline.shutdown().await.unwrap();

    assert!(transport.messages().is_empty());
    assert!(api.commands.lock().is_empty());
}

#[tokio::test]
async fn test_bad_command_shapes_publish_one_error_each() {
    let (_api, transport, pipeline, router) = setup();

    for payload in [r#"{"mode": 1}"#, r#"{"action": 3}"#, "[]", ""] {
        let outcome = router
            .handle(InboundMessage::new("nina/mount/command", payload))
            .await;
        assert_eq!(outcome, RouteOutcome::Failed, "payload {:?}", payload);
    }
    pipeline.shutdown().await.unwrap();

    assert!(transport.on(RESPONSE_TOPIC).is_empty());
    let errors = transport.texts_on(ERROR_TOPIC);
    assert_eq!(errors.len(), 4);
    assert_eq!(errors[0], "Unsupported mount action: ");
    assert!(errors[1].contains("'action' must be a string"));
    assert!(errors[2].contains("must be a JSON object"));
    assert_eq!(errors[3], "Unsupported mount action: ");
}

#[tokio::test]
async fn test_empty_payload_reaches_screenshot_target() {
    let (api, transport, pipeline, router) = setup();
    api.set_command_result(json!({"image_base64": "aGk="}));

    let outcome = router
        .handle(InboundMessage::new("nina/application/command", ""))
        .await;
    pipeline.shutdown().await.unwrap();

    assert_eq!(outcome, RouteOutcome::Responded);
    assert_eq!(transport.on("nina/application/command_response").len(), 1);
}

#[tokio::test]
async fn test_empty_result_publishes_nothing() {
    let (api, transport, pipeline, router) = setup();
    api.set_command_result(json!({}));

    let outcome = router
        .handle(InboundMessage::new("nina/sequence/command", r#"{"action": "stop"}"#))
        .await;
    pipeline.shutdown().await.unwrap();

    assert_eq!(outcome, RouteOutcome::Silent);
    assert!(transport.messages().is_empty());
}

#[tokio::test]
async fn test_run_consumes_channel_until_closed() {
    let (api, transport, pipeline, router) = setup();
    api.set_command_result(json!({"Success": true}));

    let (tx, rx) = mpsc::channel(8);
    let (_stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(router.run(rx, stop_rx));
    tx.send(InboundMessage::new("nina/mount/command", r#"{"action": "home"}"#))
        .await
        .unwrap();
    tx.send(InboundMessage::new("nina/mount/command", r#"{"action": "UNPARK"}"#))
        .await
        .unwrap();
    drop(tx);
    handle.await.unwrap();
    pipeline.shutdown().await.unwrap();

    assert_eq!(transport.on(RESPONSE_TOPIC).len(), 2);
    let actions: Vec<String> = api.commands.lock().iter().map(|(_, r)| r.action.clone()).collect();
    assert_eq!(actions, vec!["home", "unpark"]);
}

#[tokio::test]
async fn test_run_exits_on_stop_signal() {
    let (_api, _transport, pipeline, router) = setup();

    let (_tx, rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(router.run(rx, stop_rx));
    stop_tx.send(true).unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("router should exit on stop")
        .unwrap();
    pipeline.shutdown().await.unwrap();
}
