//! services/api/src/adapters/tts.rs
//!
//! This module contains the adapter for OpenAI's Text-to-Speech (TTS) service.
//! It implements the `MediaProvider` port for audio.

use crate::adapters::openai_errors::provider_failure;
use async_openai::{
    config::OpenAIConfig,
    types::audio::{CreateSpeechRequest, SpeechModel, Voice},
    Client,
};
use async_trait::async_trait;
use enablement_core::ports::{
    FailureKind, MediaProvider, MediaRequest, ProviderFailure, ProviderOutput, ProviderResult,
};
use enablement_core::MediaKind;
use std::time::Duration;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An audio provider that uses the OpenAI speech endpoint.
#[derive(Clone)]
pub struct OpenAiTtsAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    model_name: String,
    voice: Voice,
    timeout: Duration,
}

impl OpenAiTtsAdapter {
    pub fn new(client: Client<OpenAIConfig>, model_name: &str, voice: Voice, timeout: Duration) -> Self {
        Self {
            client,
            model: speech_model(model_name),
            model_name: model_name.to_string(),
            voice,
            timeout,
        }
    }
}

/// Maps a configured model name onto the client's model enum.
pub fn speech_model(name: &str) -> SpeechModel {
    match name {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    }
}

/// Parses a configured voice name.
pub fn parse_voice(name: &str) -> Option<Voice> {
    match name.to_lowercase().as_str() {
        "alloy" => Some(Voice::Alloy),
        "echo" => Some(Voice::Echo),
        "fable" => Some(Voice::Fable),
        "onyx" => Some(Voice::Onyx),
        "nova" => Some(Voice::Nova),
        "shimmer" => Some(Voice::Shimmer),
        _ => None,
    }
}

//=========================================================================================
// `MediaProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl MediaProvider for OpenAiTtsAdapter {
    fn id(&self) -> &str {
        "openai-tts"
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
        let speech = CreateSpeechRequest {
            model: self.model.clone(),
            input: request.prompt.clone(),
            voice: self.voice.clone(),
            ..Default::default()
        };

        let response = self
            .client
            .audio()
            .speech()
            .create(speech)
            .await
            .map_err(provider_failure)?;

        Ok(ProviderOutput::new(response.bytes.to_vec(), "mp3").with_model(self.model_name.clone()))
    }
}
