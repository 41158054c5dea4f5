//! services/api/src/wiring.rs
//!
//! Builds the provider chains, the text-generation collaborator and the
//! pipeline settings from the loaded configuration. A capability whose
//! providers all lack credentials gets an empty chain and degrades to
//! placeholders at run time; the service still starts.

use crate::adapters::{
    tts::parse_voice, ElevenLabsAdapter, HttpVideoAdapter, HuggingFaceImageAdapter,
    OpenAiImageAdapter, OpenAiLessonPlanAdapter, OpenAiTtsAdapter,
};
use crate::config::{Config, ConfigError};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use enablement_core::ports::{LessonPlanService, MediaProvider, PortError, PortResult};
use enablement_core::{
    FallbackChain, GenerationOptions, ImageSequenceStrategy, MediaChains, MediaKind,
    MediaStorage, PipelineSettings, ProviderThrottle,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the image, speech and video chains in priority order.
pub fn build_media_chains(
    config: &Config,
    storage: Arc<MediaStorage>,
    throttle: Arc<ProviderThrottle>,
) -> Result<MediaChains, ConfigError> {
    let http = reqwest::Client::new();
    let openai = config.openai_api_key.as_ref().map(|key| {
        Client::with_config(OpenAIConfig::new().with_api_key(key))
    });

    // --- Images ---
    let mut image_providers: Vec<Arc<dyn MediaProvider>> = Vec::new();
    if let Some(key) = &config.openai_api_key {
        image_providers.push(Arc::new(OpenAiImageAdapter::new(
            http.clone(),
            key.clone(),
            config.image_model.clone(),
            config.provider_timeout,
        )));
    }
    if let Some(key) = &config.huggingface_api_key {
        image_providers.push(Arc::new(HuggingFaceImageAdapter::new(
            http.clone(),
            key.clone(),
            config.hf_image_model.clone(),
            config.provider_timeout,
        )));
    }

    // --- Speech ---
    let mut audio_providers: Vec<Arc<dyn MediaProvider>> = Vec::new();
    if let Some(client) = &openai {
        let voice = parse_voice(&config.tts_voice).ok_or_else(|| {
            ConfigError::InvalidValue(
                "TTS_VOICE".to_string(),
                format!("'{}' is not a supported voice", config.tts_voice),
            )
        })?;
        audio_providers.push(Arc::new(OpenAiTtsAdapter::new(
            client.clone(),
            &config.tts_model,
            voice,
            config.provider_timeout,
        )));
    }
    if let Some(key) = &config.elevenlabs_api_key {
        audio_providers.push(Arc::new(ElevenLabsAdapter::new(
            http.clone(),
            key.clone(),
            config.elevenlabs_voice_id.clone(),
            config.provider_timeout,
        )));
    }

    // --- Video ---
    let mut video_providers: Vec<Arc<dyn MediaProvider>> = Vec::new();
    if let Some(url) = &config.video_api_url {
        video_providers.push(Arc::new(HttpVideoAdapter::new(
            http.clone(),
            url.clone(),
            config.video_api_key.clone(),
            config.video_timeout,
        )));
    }

    let sequence = Arc::new(ImageSequenceStrategy::new(
        image_providers.clone(),
        storage.clone(),
        throttle.clone(),
    ));

    let chain = |kind: MediaKind, providers: Vec<Arc<dyn MediaProvider>>| {
        if providers.is_empty() {
            warn!(kind = %kind, "No provider configured; this capability will yield placeholders");
        }
        providers.into_iter().fold(
            FallbackChain::new(kind, storage.clone(), throttle.clone()),
            |chain, provider| chain.with_provider(provider),
        )
    };

    let chains = MediaChains {
        image: chain(MediaKind::Image, image_providers),
        audio: chain(MediaKind::Audio, audio_providers),
        video: chain(MediaKind::Video, video_providers).with_degraded(sequence),
    };
    for kind in MediaKind::ALL {
        info!(kind = %kind, providers = ?chains.chain(kind).provider_ids(), "Provider chain ready");
    }
    Ok(chains)
}

/// The text-generation collaborator, or a stand-in that always fails so every
/// run takes the deterministic fallback plan.
pub fn build_planner(config: &Config) -> Arc<dyn LessonPlanService> {
    match &config.openai_api_key {
        Some(key) => Arc::new(OpenAiLessonPlanAdapter::new(
            Client::with_config(OpenAIConfig::new().with_api_key(key)),
            config.text_model.clone(),
        )),
        None => {
            warn!("OPENAI_API_KEY is not set; lesson plans will use the fallback planner");
            Arc::new(UnconfiguredPlanner)
        }
    }
}

pub fn pipeline_settings(config: &Config) -> PipelineSettings {
    PipelineSettings {
        text_timeout: config.text_timeout,
        lesson_delay: config.lesson_delay,
        lesson_concurrency: config.lesson_concurrency.max(1),
    }
}

pub fn provider_throttle(config: &Config) -> ProviderThrottle {
    ProviderThrottle::new(config.max_concurrent_provider_calls, config.min_call_spacing)
}

struct UnconfiguredPlanner;

#[async_trait]
impl LessonPlanService for UnconfiguredPlanner {
    fn model_id(&self) -> &str {
        "unconfigured"
    }

    async fn generate_lesson_plan(&self, _domain_text: &str, _options: &GenerationOptions) -> PortResult<String> {
        Err(PortError::Unauthorized)
    }
}
