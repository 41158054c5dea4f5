//! services/api/src/adapters/openai_image.rs
//!
//! Image provider backed by the OpenAI images endpoint. Images come back as
//! base64 inside a JSON payload.

use crate::adapters::http::{classify_transport, failure_from_response};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use enablement_core::ports::{
    FailureKind, MediaProvider, MediaRequest, ProviderFailure, ProviderOutput, ProviderResult,
};
use enablement_core::MediaKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct OpenAiImageAdapter {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiImageAdapter {
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

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct ImageGenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

/// Pulls the first base64 image out of a response body.
fn decode_first_image(body: &[u8]) -> ProviderResult<Vec<u8>> {
    let parsed: ImageGenerationResponse = serde_json::from_slice(body).map_err(|e| {
        ProviderFailure::new(FailureKind::MalformedResponse, format!("invalid image payload: {}", e))
    })?;
    let encoded = parsed
        .data
        .into_iter()
        .find_map(|d| d.b64_json)
        .ok_or_else(|| ProviderFailure::new(FailureKind::MalformedResponse, "response contained no image"))?;
    STANDARD.decode(encoded.trim()).map_err(|e| {
        ProviderFailure::new(FailureKind::MalformedResponse, format!("image was not valid base64: {}", e))
    })
}

//=========================================================================================
// `MediaProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl MediaProvider for OpenAiImageAdapter {
    fn id(&self) -> &str {
        "openai-images"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn invoke(&self, request: &MediaRequest) -> ProviderResult<ProviderOutput> {
        let body = ImageGenerationBody {
            model: &self.model,
            prompt: &request.prompt,
            n: 1,
            size: "1024x1024",
            response_format: "b64_json",
        };

        let response = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let bytes = response.bytes().await.map_err(|e| classify_transport(&e))?;
        let image = decode_first_image(&bytes)?;
        Ok(ProviderOutput::new(image, "png").with_model(self.model.clone()))
    }
}
