//! Provider adapters against a local HTTP endpoint standing in for the vendor.

use api_lib::adapters::{ElevenLabsAdapter, HuggingFaceImageAdapter, OpenAiImageAdapter};
use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use enablement_core::ports::{FailureKind, MediaProvider, MediaRequest};
use serde_json::json;
use std::time::Duration;

/// Serves `router` on an ephemeral port and returns its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn image_request() -> MediaRequest {
    MediaRequest::image("Discovery", "a whiteboard with open questions")
}

#[tokio::test]
async fn test_hugging_face_loading_model_is_service_loading() {
    let base = serve(Router::new().route(
        "/sdxl",
        post(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "Model sdxl is currently loading", "estimated_time": 20.0})),
            )
        }),
    ))
    .await;
    let adapter = HuggingFaceImageAdapter::new(
        reqwest::Client::new(),
        "hf-key".into(),
        "sdxl".into(),
        Duration::from_secs(5),
    )
    .with_base_url(base);

    let failure = adapter.invoke(&image_request()).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::ServiceLoading);
    assert_eq!(failure.provider_status, Some(503));
    assert_eq!(failure.estimated_wait_seconds, Some(20.0));
}

#[tokio::test]
async fn test_hugging_face_returns_image_blob() {
    let base = serve(Router::new().route(
        "/sdxl",
        post(|| async { ([(CONTENT_TYPE, "image/jpeg")], vec![0xFFu8, 0xD8, 0xFF]) }),
    ))
    .await;
    let adapter = HuggingFaceImageAdapter::new(
        reqwest::Client::new(),
        "hf-key".into(),
        "sdxl".into(),
        Duration::from_secs(5),
    )
    .with_base_url(base);

    let output = adapter.invoke(&image_request()).await.unwrap();

    assert_eq!(output.extension, "jpg");
    assert_eq!(output.bytes, vec![0xFF, 0xD8, 0xFF]);
    assert_eq!(output.model.as_deref(), Some("sdxl"));
}

#[tokio::test]
async fn test_openai_images_rejected_key_is_auth_error() {
    let base = serve(Router::new().route(
        "/images/generations",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}})),
            )
        }),
    ))
    .await;
    let adapter = OpenAiImageAdapter::new(
        reqwest::Client::new(),
        "sk-wrong".into(),
        "dall-e-3".into(),
        Duration::from_secs(5),
    )
    .with_base_url(base);

    let failure = adapter.invoke(&image_request()).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::AuthError);
    assert!(failure.message.contains("Incorrect API key"));
}

#[tokio::test]
async fn test_openai_images_decodes_payload() {
    let base = serve(Router::new().route(
        "/images/generations",
        post(|| async { Json(json!({"created": 1, "data": [{"b64_json": STANDARD.encode(b"\x89PNG")}]})) }),
    ))
    .await;
    let adapter = OpenAiImageAdapter::new(
        reqwest::Client::new(),
        "sk-test".into(),
        "dall-e-3".into(),
        Duration::from_secs(5),
    )
    .with_base_url(base);

    let output = adapter.invoke(&image_request()).await.unwrap();

    assert_eq!(output.bytes, b"\x89PNG".to_vec());
    assert_eq!(output.extension, "png");
}

#[tokio::test]
async fn test_elevenlabs_quota_exceeded_is_rate_limited() {
    let base = serve(Router::new().route(
        "/text-to-speech/{voice}",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exceeded") }),
    ))
    .await;
    let adapter = ElevenLabsAdapter::new(
        reqwest::Client::new(),
        "xi-key".into(),
        Some("narrator".into()),
        Duration::from_secs(5),
    )
    .with_base_url(base);

    let failure = adapter
        .invoke(&MediaRequest::speech("Discovery", "Ask before you pitch."))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::RateLimited);
    assert_eq!(failure.provider_status, Some(429));
}
