//! Integration tests for the Slack webhook platform.
//!
//! A mock webhook server records the JSON bodies it receives so the tests can
//! check what was posted to each channel's URL.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use external_notify::{
    DeliveryError, Dispatcher, Message, MessageTemplate, NotifyConfig, Platform, PlatformConfig,
    SlackPlatform,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

// =============================================================================
// Mock webhook server
// =============================================================================

#[derive(Debug, Deserialize)]
struct WebhookBody {
    text: String,
}

#[derive(Default)]
struct MockSlackState {
    /// (hook id, text) in arrival order.
    received: RwLock<Vec<(String, String)>>,
    /// Answer every request with 500.
    fail: AtomicBool,
}

async fn mock_webhook(
    State(state): State<Arc<MockSlackState>>,
    Path(hook): Path<String>,
    Json(body): Json<WebhookBody>,
) -> impl IntoResponse {
    if state.fail.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "invalid_payload");
    }
    state.received.write().await.push((hook, body.text));
    (StatusCode::OK, "ok")
}

async fn start_mock_slack() -> (SocketAddr, Arc<MockSlackState>) {
    let state = Arc::new(MockSlackState::default());

    let app = Router::new()
        .route("/hooks/{hook}", post(mock_webhook))
        .with_state(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

fn options(addr: SocketAddr) -> PlatformConfig {
    let mut options = PlatformConfig::default();
    for (channel, hook) in [("#shared", "shared"), ("#export", "export")] {
        options
            .webhooks
            .insert(channel.to_string(), format!("http://{addr}/hooks/{hook}"));
    }
    options
}

fn channels(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| (*c).to_string()).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_posts_text_to_each_channel_in_order() {
    let (addr, state) = start_mock_slack().await;
    let message = Message::new("export", None, "Admin Person (admin) exported the page");

    SlackPlatform::new()
        .deliver(None, &options(addr), &channels(&["#shared", "#export"]), &message)
        .await
        .unwrap();

    let received = state.received.read().await;
    assert_eq!(
        *received,
        [
            ("shared".to_string(), message.formatted.clone()),
            ("export".to_string(), message.formatted.clone()),
        ]
    );
}

#[tokio::test]
async fn test_missing_webhook_aborts_remaining_channels() {
    let (addr, state) = start_mock_slack().await;
    let message = Message::new("export", None, "hello");

    let err = SlackPlatform::new()
        .deliver(
            None,
            &options(addr),
            &channels(&["#shared", "#nowhere", "#export"]),
            &message,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryError::MissingWebhook { ref channel } if channel == "#nowhere"));
    let received = state.received.read().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "shared");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (addr, state) = start_mock_slack().await;
    state.fail.store(true, Ordering::SeqCst);
    let message = Message::new("commit", None, "hello");

    let err = SlackPlatform::new()
        .deliver(None, &options(addr), &channels(&["#shared", "#export"]), &message)
        .await
        .unwrap_err();

    match err {
        DeliveryError::Status { status, body } => {
            assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "invalid_payload");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_webhook_is_http_error() {
    let mut options = PlatformConfig::default();
    options
        .webhooks
        .insert("#shared".to_string(), "http://127.0.0.1:1/hook".to_string());
    let message = Message::new("commit", None, "hello");

    let err = SlackPlatform::new()
        .deliver(None, &options, &channels(&["#shared"]), &message)
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Http(_)));
}

#[tokio::test]
async fn test_dispatcher_delivers_through_slack() {
    let (addr, state) = start_mock_slack().await;
    let config = NotifyConfig::from_yaml_str(&format!(
        r##"
platforms:
  slack:
    channel: "#shared"
    events:
      export: "#export"
    webhooks:
      "#shared": http://{addr}/hooks/shared
      "#export": http://{addr}/hooks/export
"##
    ))
    .unwrap();
    let dispatcher = Dispatcher::new(config);

    dispatcher.notify(
        "export",
        None,
        &MessageTemplate::new("{user} exported to {string}").arg(vec!["es", "us"]),
    );

    for _ in 0..200 {
        if state.received.read().await.len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let received = state.received.read().await;
    assert_eq!(
        *received,
        [
            ("shared".to_string(), "Anonymous exported to es, us".to_string()),
            ("export".to_string(), "Anonymous exported to es, us".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_send_and_wait_reports_failures() {
    let config = NotifyConfig::from_yaml_str(
        r##"
platforms:
  slack:
    channel: "#shared"
"##,
    )
    .unwrap();
    let dispatcher = Dispatcher::new(config);

    let results = dispatcher
        .send_and_wait("commit", None, &MessageTemplate::new("hello"))
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "slack");
    assert!(matches!(
        results[0].1,
        Err(DeliveryError::MissingWebhook { ref channel }) if channel == "#shared"
    ));
}
