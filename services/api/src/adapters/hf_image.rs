//! services/api/src/adapters/hf_image.rs
//!
//! Image provider backed by a Hugging Face inference endpoint. The endpoint
//! answers with the raw image blob, or with a 503 while the model is loading.

use crate::adapters::http::{classify_transport, failure_from_response};
use async_trait::async_trait;
use enablement_core::ports::{
    FailureKind, MediaProvider, MediaRequest, ProviderFailure, ProviderOutput, ProviderResult,
};
use enablement_core::MediaKind;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models";

#[derive(Clone)]
pub struct HuggingFaceImageAdapter {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl HuggingFaceImageAdapter {
    pub fn new(http: reqwest::Client, api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct InferenceBody<'a> {
    inputs: &'a str,
}

/// Maps a blob content type to a file extension. JSON or text bodies on a
/// success status mean the endpoint did not return an image.
fn image_extension(content_type: Option<&str>) -> ProviderResult<&'static str> {
    match content_type.map(|c| c.split(';').next().unwrap_or(c).trim()) {
        Some("image/jpeg") | Some("image/jpg") => Ok("jpg"),
        Some("image/webp") => Ok("webp"),
        Some("image/png") | None => Ok("png"),
        Some(other) if other.starts_with("image/") => Ok("png"),
        Some(other) => Err(ProviderFailure::new(
            FailureKind::MalformedResponse,
            format!("expected an image, got {}", other),
        )),
    }
}

#[async_trait]
impl MediaProvider for HuggingFaceImageAdapter {
    fn id(&self) -> &str {
        "huggingface-image"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn invoke(&self, request: &MediaRequest) -> ProviderResult<ProviderOutput> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, self.model))
            .bearer_auth(&self.api_key)
            .json(&InferenceBody {
                inputs: &request.prompt,
            })
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let extension = image_extension(content_type.as_deref())?;
        let bytes = response.bytes().await.map_err(|e| classify_transport(&e))?;
        Ok(ProviderOutput::new(bytes.to_vec(), extension).with_model(self.model.clone()))
    }
}
