//! HTTP contract of the bridge client.

use whatsapp_gateway::whatsapp::client::{BridgeClient, MessagingClient};
use whatsapp_gateway::whatsapp::WhatsAppError;

use crate::common::serve_once;

#[tokio::test]
async fn send_posts_chat_id_and_text() {
    let (url, request) = serve_once("200 OK", r#"{"success":true}"#).await;
    let client = BridgeClient::new(url);

    let result = client.send_message("551234567890@c.us", "Hello").await;
    assert!(result.is_ok(), "send failed: {result:?}");

    let request = request.await.expect("request captured");
    assert!(request.starts_with("POST /send "), "got {request}");
    assert!(request.contains(r#""chatId":"551234567890@c.us""#));
    assert!(request.contains(r#""text":"Hello""#));
}

#[tokio::test]
async fn response_without_envelope_counts_as_success() {
    let (url, _request) = serve_once("200 OK", "{}").await;
    let client = BridgeClient::new(url);

    assert!(client.send_message("551234567890@c.us", "Hi").await.is_ok());
}

#[tokio::test]
async fn envelope_error_is_reported() {
    let (url, _request) =
        serve_once("200 OK", r#"{"success":false,"error":"chat not found"}"#).await;
    let client = BridgeClient::new(url);

    let err = client
        .send_message("551234567890@c.us", "Hi")
        .await
        .expect_err("send should fail");

    match err {
        WhatsAppError::Bridge { status, message } => {
            assert_eq!(status, 200);
            assert_eq!(message, "chat not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn error_status_is_reported() {
    let (url, _request) = serve_once("503 Service Unavailable", "browser crashed").await;
    let client = BridgeClient::new(url);

    let err = client.destroy().await.expect_err("destroy should fail");

    assert!(matches!(err, WhatsAppError::Bridge { status: 503, .. }));
}

#[tokio::test]
async fn destroy_posts_session_destroy() {
    let (url, request) = serve_once("200 OK", r#"{"success":true}"#).await;
    let client = BridgeClient::new(format!("{url}/"));

    client.destroy().await.expect("destroy should succeed");

    let request = request.await.expect("request captured");
    assert!(request.starts_with("POST /session/destroy "), "got {request}");
}

#[tokio::test]
async fn health_check_reports_unreachable_bridge() {
    let client = BridgeClient::new("http://127.0.0.1:1");
    assert!(!client.health_check().await);
}

#[tokio::test]
async fn health_check_accepts_ok() {
    let (url, request) = serve_once("200 OK", r#"{"status":"ok"}"#).await;
    let client = BridgeClient::new(url);

    assert!(client.health_check().await);
    let request = request.await.expect("request captured");
    assert!(request.starts_with("GET /health "));
}
