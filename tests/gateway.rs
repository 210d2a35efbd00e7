//! Webhook gateway integration tests
//!
//! Runs the gateway against a local axum webhook

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio_test::assert_ok;

use openclaw_assistant::{
    AssistantGateway, AssistantReply, GatewayError, TurnRequest, WebhookGateway,
};

/// Requests the mock webhook received: (authorization header, body)
type Received = Arc<Mutex<Vec<(Option<String>, Value)>>>;

#[derive(Clone)]
struct Webhook {
    received: Received,
    status: StatusCode,
    body: &'static str,
    delay: Duration,
}

async fn handle(
    State(hook): State<Webhook>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    hook.received.lock().unwrap().push((auth, body));

    if !hook.delay.is_zero() {
        tokio::time::sleep(hook.delay).await;
    }

    (hook.status, hook.body)
}

/// Start a webhook that answers every request with `status` and `body`
async fn spawn_webhook(
    status: StatusCode,
    body: &'static str,
    delay: Duration,
) -> (String, Received) {
    let received = Received::default();
    let hook = Webhook {
        received: received.clone(),
        status,
        body,
        delay,
    };

    let app = Router::new()
        .route("/hooks/voice", post(handle))
        .with_state(hook);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/hooks/voice"), received)
}

fn gateway() -> WebhookGateway {
    WebhookGateway::new(Duration::from_secs(5)).unwrap()
}

fn token() -> SecretString {
    SecretString::from("test-token-123".to_string())
}

async fn dispatch(gateway: &WebhookGateway, url: &str) -> Result<AssistantReply, GatewayError> {
    let token = token();
    gateway
        .dispatch(TurnRequest {
            webhook_url: url,
            auth_token: Some(&token),
            transcript: "what's the weather",
            session_id: "session-1",
        })
        .await
}

#[tokio::test]
async fn test_dispatch_success() {
    let (url, received) = spawn_webhook(
        StatusCode::OK,
        r#"{"text": "Sunny, 72 degrees", "continue": false}"#,
        Duration::ZERO,
    )
    .await;

    let reply = assert_ok!(dispatch(&gateway(), &url).await);
    assert_eq!(reply.text, "Sunny, 72 degrees");
    assert!(!reply.should_continue_listening);

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (auth, body) = &received[0];
    assert_eq!(auth.as_deref(), Some("Bearer test-token-123"));
    assert_eq!(
        body,
        &json!({
            "transcript": "what's the weather",
            "authToken": "test-token-123",
            "sessionId": "session-1",
        })
    );
}

#[tokio::test]
async fn test_dispatch_without_token_sends_no_auth() {
    let (url, received) =
        spawn_webhook(StatusCode::OK, r#"{"text": "Hi"}"#, Duration::ZERO).await;

    let reply = assert_ok!(
        gateway()
            .dispatch(TurnRequest {
                webhook_url: &url,
                auth_token: None,
                transcript: "hello",
                session_id: "session-2",
            })
            .await
    );
    assert!(reply.should_continue_listening);

    let received = received.lock().unwrap();
    assert_eq!(received[0].0, None);
    assert!(received[0].1.get("authToken").is_none());
}

#[tokio::test]
async fn test_unauthorized_is_auth_error() {
    let (url, _) = spawn_webhook(StatusCode::UNAUTHORIZED, "bad token", Duration::ZERO).await;

    let err = dispatch(&gateway(), &url).await.unwrap_err();
    assert!(matches!(err, GatewayError::Authentication(_)));
}

#[tokio::test]
async fn test_forbidden_is_auth_error() {
    let (url, _) = spawn_webhook(StatusCode::FORBIDDEN, "", Duration::ZERO).await;

    let err = dispatch(&gateway(), &url).await.unwrap_err();
    assert!(matches!(err, GatewayError::Authentication(_)));
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let (url, _) = spawn_webhook(
        StatusCode::INTERNAL_SERVER_ERROR,
        "upstream model overloaded",
        Duration::ZERO,
    )
    .await;

    let err = dispatch(&gateway(), &url).await.unwrap_err();
    match err {
        GatewayError::Server(msg) => {
            assert!(msg.contains("500"));
            assert!(msg.contains("upstream model overloaded"));
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_reply_is_malformed() {
    let (url, _) = spawn_webhook(StatusCode::OK, "<html>hello</html>", Duration::ZERO).await;

    let err = dispatch(&gateway(), &url).await.unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(_)));
}

#[tokio::test]
async fn test_unreachable_webhook_is_network_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = dispatch(&gateway(), &format!("http://{addr}/hooks/voice"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)));
}

#[tokio::test]
async fn test_slow_webhook_times_out() {
    let (url, _) = spawn_webhook(
        StatusCode::OK,
        r#"{"text": "too late"}"#,
        Duration::from_secs(3),
    )
    .await;

    let gateway = WebhookGateway::new(Duration::from_millis(200)).unwrap();
    let err = dispatch(&gateway, &url).await.unwrap_err();
    match err {
        GatewayError::Network(msg) => assert!(msg.contains("timed out")),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_sends_ping() {
    let (url, received) = spawn_webhook(StatusCode::OK, "{}", Duration::ZERO).await;

    let token = token();
    let ack = assert_ok!(gateway().test_connection(&url, Some(&token)).await);
    assert_eq!(ack.status, 200);

    let received = received.lock().unwrap();
    assert_eq!(received[0].0.as_deref(), Some("Bearer test-token-123"));
    assert_eq!(
        received[0].1,
        json!({ "transcript": "ping", "authToken": "test-token-123", "test": true })
    );
}

#[tokio::test]
async fn test_connection_reports_rejection() {
    let (url, _) = spawn_webhook(StatusCode::FORBIDDEN, "nope", Duration::ZERO).await;

    let err = gateway().test_connection(&url, None).await.unwrap_err();
    assert!(matches!(err, GatewayError::Authentication(_)));
}
