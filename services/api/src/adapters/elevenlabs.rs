//! services/api/src/adapters/elevenlabs.rs
//!
//! Speech provider backed by the ElevenLabs text-to-speech endpoint, used as
//! the backup audio provider.

use crate::adapters::http::{classify_transport, failure_from_response};
use async_trait::async_trait;
use enablement_core::ports::{
    FailureKind, MediaProvider, MediaRequest, ProviderFailure, ProviderOutput, ProviderResult,
};
use enablement_core::MediaKind;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const MODEL_ID: &str = "eleven_multilingual_v2";

#[derive(Clone)]
pub struct ElevenLabsAdapter {
    http: reqwest::Client,
    api_key: String,
    voice_id: String,
    base_url: String,
    timeout: Duration,
}

impl ElevenLabsAdapter {
    pub fn new(http: reqwest::Client, api_key: String, voice_id: Option<String>, timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            voice_id: voice_id.unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
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
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Serialize)]
struct SpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[async_trait]
impl MediaProvider for ElevenLabsAdapter {
    fn id(&self) -> &str {
        "elevenlabs"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn invoke(&self, request: &MediaRequest) -> ProviderResult<ProviderOutput> {
        if request.prompt.trim().is_empty() {
            return Err(ProviderFailure::new(FailureKind::Unknown, "nothing to narrate"));
        }
        let body = SpeechBody {
            text: &request.prompt,
            model_id: MODEL_ID,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        let response = self
            .http
            .post(format!("{}/text-to-speech/{}", self.base_url, self.voice_id))
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let bytes = response.bytes().await.map_err(|e| classify_transport(&e))?;
        Ok(ProviderOutput::new(bytes.to_vec(), "mp3").with_model(MODEL_ID))
    }
}
