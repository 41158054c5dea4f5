//! services/api/src/adapters/video.rs
//!
//! Video provider backed by an HTTP inference endpoint. Requests are either
//! image-conditioned (the lesson image travels as base64) or text-only, with
//! the generation parameters chosen by the core.

use crate::adapters::http::{classify_transport, failure_from_response};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use enablement_core::ports::{
    FailureKind, MediaProvider, MediaRequest, ProviderFailure, ProviderOutput, ProviderResult,
    VideoParams,
};
use enablement_core::MediaKind;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Frames per second assumed when converting a duration into a frame count.
const FRAMES_PER_SECOND: u32 = 6;

#[derive(Clone)]
pub struct HttpVideoAdapter {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpVideoAdapter {
    pub fn new(http: reqwest::Client, endpoint: String, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            http,
            endpoint,
            api_key,
            timeout,
        }
    }
}

/// Builds the inference payload. `image` is the conditioning image, if any.
fn request_body(prompt: &str, params: VideoParams, image: Option<&[u8]>) -> Value {
    let parameters = json!({
        "num_frames": params.duration_seconds * FRAMES_PER_SECOND,
        "fps": FRAMES_PER_SECOND,
        "motion_bucket_id": params.motion_bucket,
        "guidance_scale": params.guidance_scale,
    });
    match image {
        Some(bytes) => json!({
            "inputs": STANDARD.encode(bytes),
            "parameters": { "prompt": prompt, "image_conditioned": true, "generation": parameters },
        }),
        None => json!({
            "inputs": prompt,
            "parameters": { "image_conditioned": false, "generation": parameters },
        }),
    }
}

fn video_extension(content_type: Option<&str>) -> ProviderResult<&'static str> {
    match content_type.map(|c| c.split(';').next().unwrap_or(c).trim()) {
        Some("video/webm") => Ok("webm"),
        Some("image/gif") => Ok("gif"),
        Some("video/mp4") | Some("application/octet-stream") | None => Ok("mp4"),
        Some(other) if other.starts_with("video/") => Ok("mp4"),
        Some(other) => Err(ProviderFailure::new(
            FailureKind::MalformedResponse,
            format!("expected a video, got {}", other),
        )),
    }
}

#[async_trait]
impl MediaProvider for HttpVideoAdapter {
    fn id(&self) -> &str {
        "video-inference"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn invoke(&self, request: &MediaRequest) -> ProviderResult<ProviderOutput> {
        let params = request.video.unwrap_or_else(VideoParams::text_only);
        let image = match &request.conditioning_image {
            Some(path) => Some(tokio::fs::read(path).await.map_err(|e| {
                ProviderFailure::new(
                    FailureKind::Unknown,
                    format!("could not read conditioning image {}: {}", path.display(), e),
                )
            })?),
            None => None,
        };
        debug!(
            image_conditioned = image.is_some(),
            duration = params.duration_seconds,
            "Calling video endpoint"
        );

        let mut call = self
            .http
            .post(&self.endpoint)
            .json(&request_body(&request.prompt, params, image.as_deref()));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }
        let response = call.send().await.map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let extension = video_extension(content_type.as_deref())?;
        let bytes = response.bytes().await.map_err(|e| classify_transport(&e))?;

        let mut output = ProviderOutput::new(bytes.to_vec(), extension);
        output.duration_seconds = Some(f64::from(params.duration_seconds));
        Ok(output)
    }
}
