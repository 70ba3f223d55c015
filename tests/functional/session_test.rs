//! Session acquisition against a mock backend

use gen_negotiator::backend::{HttpTransport, SessionAcquirer, Transport};
use gen_negotiator::AppError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROUTE: &str = "/API/GetNewSession";

fn acquirer() -> SessionAcquirer {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new().unwrap());
    SessionAcquirer::new(transport, ROUTE)
}

async fn server_answering(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ROUTE))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_acquire_posts_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ROUTE))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "0123456789abcdef0123"})))
        .expect(1)
        .mount(&server)
        .await;

    let session = acquirer()
        .acquire(&server.uri(), Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(session.token(), "0123456789abcdef0123");
    assert_eq!(format!("{:?}", session), "Session(\"0123456789abcdef...\")");
}

#[tokio::test]
async fn test_missing_session_id_is_protocol_error() {
    let server = server_answering(ResponseTemplate::new(200).set_body_json(json!({"error": "busy"}))).await;

    let err = acquirer()
        .acquire(&server.uri(), Duration::from_secs(30))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)));
}

#[tokio::test]
async fn test_error_status_is_protocol_error() {
    let server = server_answering(ResponseTemplate::new(503).set_body_string("starting up")).await;

    let err = acquirer()
        .acquire(&server.uri(), Duration::from_secs(30))
        .await
        .unwrap_err();
    match err {
        AppError::Protocol(message) => assert!(message.contains("503")),
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = server_answering(
        ResponseTemplate::new(200)
            .set_body_json(json!({"session_id": "late"}))
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let err = acquirer()
        .acquire(&server.uri(), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Timeout(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    // Bind and drop a listener so the port is known to be closed
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let err = acquirer()
        .acquire(&format!("http://127.0.0.1:{}", port), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Connection(_)));
}
