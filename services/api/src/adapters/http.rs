//! services/api/src/adapters/http.rs
//!
//! Shared translation of HTTP transport errors and error responses into the
//! provider failure taxonomy.

use enablement_core::ports::{FailureKind, ProviderFailure};
use serde::Deserialize;

/// Longest provider error body kept in a failure message.
const MAX_BODY_CHARS: usize = 300;

/// Classifies a `reqwest` transport error.
pub fn classify_transport(error: &reqwest::Error) -> ProviderFailure {
    let kind = if error.is_timeout() {
        FailureKind::Timeout
    } else if error.is_connect() {
        FailureKind::NetworkUnreachable
    } else if error.is_decode() || error.is_body() {
        FailureKind::MalformedResponse
    } else if let Some(status) = error.status() {
        FailureKind::from_http_status(status.as_u16())
    } else {
        FailureKind::Unknown
    };
    let mut failure = ProviderFailure::new(kind, error.to_string());
    failure.provider_status = error.status().map(|s| s.as_u16());
    failure
}

#[derive(Deserialize)]
struct LoadingBody {
    estimated_time: Option<f64>,
}

/// Classifies a non-success response from its status and body.
///
/// A 503 whose body carries an `estimated_time` (the inference-endpoint
/// cold-start signal) keeps that estimate on the failure.
pub fn classify_response(status: u16, body: &str) -> ProviderFailure {
    let failure = ProviderFailure::from_status(status, excerpt(body));
    if failure.kind != FailureKind::ServiceLoading {
        return failure;
    }
    let estimate = serde_json::from_str::<LoadingBody>(body)
        .ok()
        .and_then(|b| b.estimated_time);
    failure.with_estimated_wait(estimate)
}

/// Reads an error response to completion and classifies it.
pub async fn failure_from_response(response: reqwest::Response) -> ProviderFailure {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    classify_response(status, &body)
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty error body".to_string();
    }
    trimmed.chars().take(MAX_BODY_CHARS).collect()
}
