//! End-to-end negotiation against a mock backend

use gen_negotiator::config::GenerationConfig;
use gen_negotiator::payload::StyleRequest;
use gen_negotiator::response::base64::create_data_url;
use gen_negotiator::{AppError, ImageGenerator};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const GENERATE: &str = "/API/GenerateText2Image";
const FALLBACK: &str = "/Text2Image";

fn body_of(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

fn image_response(bytes: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"images": [create_data_url(bytes, "png")]}))
}

/// Accepts only one encoding of the adapter list
struct AcceptLoras(Value);

impl Respond for AcceptLoras {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if body_of(request).get("loras") == Some(&self.0) {
            image_response(b"adapter-image")
        } else {
            ResponseTemplate::new(400).set_body_string("Invalid value for parameter LoRAs")
        }
    }
}

/// Wants every field spelled out, including the seed
struct RequireSeed;

impl Respond for RequireSeed {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if body_of(request).get("seed").is_some() {
            image_response(b"full-image")
        } else {
            ResponseTemplate::new(400).set_body_string("No model input given. Did your UI load properly?")
        }
    }
}

async fn server_with_session() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/API/GetNewSession"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "mock-session"})))
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer) -> GenerationConfig {
    GenerationConfig {
        server_url: server.uri(),
        style_adapters: "A:0.9,B:0.6".to_string(),
        ..GenerationConfig::default()
    }
}

fn request_for(config: &GenerationConfig) -> StyleRequest {
    StyleRequest::new("The Quiet Compliance", "satire", config.style_adapters())
}

async fn generation_bodies(server: &MockServer) -> Vec<(String, Value)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| matches!(r.url.path(), GENERATE | FALLBACK))
        .map(|r| (r.url.path().to_string(), body_of(r)))
        .collect()
}

#[tokio::test]
async fn test_first_attempt_success() {
    let server = server_with_session().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .respond_with(image_response(b"first-try"))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let generator = ImageGenerator::connect(config.clone()).unwrap();
    let image = generator.generate(&request_for(&config)).await.unwrap();

    assert_eq!(image.bytes, b"first-try");
    assert!(image.origin_url.is_none());

    let sent = generation_bodies(&server).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1["session_id"], json!("mock-session"));
    assert_eq!(sent[0].1["loras"], json!(["A", "B"]));
}

#[tokio::test]
async fn test_adapter_encodings_negotiated_in_order() {
    let server = server_with_session().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .respond_with(AcceptLoras(json!("A:0.9 B:0.6")))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let generator = ImageGenerator::connect(config.clone()).unwrap();
    let image = generator.generate(&request_for(&config)).await.unwrap();
    assert_eq!(image.bytes, b"adapter-image");

    let loras: Vec<Value> = generation_bodies(&server)
        .await
        .into_iter()
        .map(|(_, body)| body["loras"].clone())
        .collect();
    assert_eq!(
        loras,
        vec![
            json!(["A", "B"]),
            json!(["A", "B"]),
            json!("A:0.9,B:0.6"),
            json!("A:0.9|||B:0.6"),
            json!("A:0.9|B:0.6"),
            json!("A:0.9 B:0.6"),
        ]
    );
}

#[tokio::test]
async fn test_model_rejection_then_full_payload() {
    let server = server_with_session().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .respond_with(RequireSeed)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let generator = ImageGenerator::connect(config.clone()).unwrap();
    let image = generator.generate(&request_for(&config)).await.unwrap();
    assert_eq!(image.bytes, b"full-image");

    let sent = generation_bodies(&server).await;
    assert_eq!(sent.len(), 2);
    let full = &sent[1].1;
    for key in ["model", "width", "height", "steps", "scheduler", "loras", "refiner_steps"] {
        assert_eq!(full[key], sent[0].1[key], "{}", key);
    }
    assert_eq!(full["cfg_scale"], json!(1.0));
    assert_eq!(full["seed"], json!(-1));
}

#[tokio::test]
async fn test_pointer_result_is_downloaded() {
    let server = server_with_session().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"images": ["View/local/raw/2024-05-19/out.png"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/View/local/raw/2024-05-19/out.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let generator = ImageGenerator::connect(config.clone()).unwrap();
    let image = generator.generate(&request_for(&config)).await.unwrap();

    assert_eq!(image.bytes, b"remote-bytes");
    assert_eq!(
        image.origin_url,
        Some(format!("{}/View/local/raw/2024-05-19/out.png", server.uri()))
    );
}

#[tokio::test]
async fn test_unclassified_rejection_falls_back_to_second_route() {
    let server = server_with_session().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FALLBACK))
        .respond_with(image_response(b"second-route"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let generator = ImageGenerator::connect(config.clone()).unwrap();
    let image = generator.generate(&request_for(&config)).await.unwrap();
    assert_eq!(image.bytes, b"second-route");

    let paths: Vec<String> = generation_bodies(&server).await.into_iter().map(|(p, _)| p).collect();
    assert_eq!(paths, vec![GENERATE.to_string(), FALLBACK.to_string()]);
}

#[tokio::test]
async fn test_exhaustion_is_reported() {
    let server = server_with_session().await;
    Mock::given(method("POST"))
        .and(path(GENERATE))
        .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FALLBACK))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"images": []})))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let generator = ImageGenerator::connect(config.clone()).unwrap();
    let err = generator.generate(&request_for(&config)).await.unwrap_err();

    match err {
        AppError::Exhausted {
            endpoints,
            attempts,
            last_error,
        } => {
            assert_eq!(endpoints, 2);
            assert_eq!(attempts, 2);
            assert_eq!(last_error.as_deref(), Some("Backend returned no images"));
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
}
