//! crates/enablement_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the pipeline
//! talks to generative providers, the text-generation model and the document
//! store only through them, so each can be swapped for a scripted fake.

use crate::domain::{
    Difficulty, GenerationOptions, MediaAsset, MediaKind, MultimediaModule,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for store and text-generation port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Provider Failure Taxonomy
//=========================================================================================

/// Shared classification of provider failures. Adapters translate their
/// transport-specific errors into one of these so the fallback chain can
/// decide what to do without knowing which provider failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    AuthError,
    PermissionError,
    RateLimited,
    ServiceLoading,
    Timeout,
    NetworkUnreachable,
    MalformedResponse,
    Unknown,
}

/// What the fallback chain does after a failure of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStep {
    /// Try the next provider.
    Advance,
    /// Account or configuration problem: abandon this tier and go to the degraded strategy.
    SkipToDegraded,
    /// Content is pending on the provider side: stop with an enhanced placeholder.
    PendingPlaceholder,
}

impl FailureKind {
    /// Maps an HTTP status returned by a provider onto the taxonomy.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::AuthError,
            403 => Self::PermissionError,
            429 => Self::RateLimited,
            503 => Self::ServiceLoading,
            408 | 504 => Self::Timeout,
            502 => Self::NetworkUnreachable,
            _ => Self::Unknown,
        }
    }

    pub fn chain_step(self) -> ChainStep {
        match self {
            Self::AuthError | Self::PermissionError => ChainStep::SkipToDegraded,
            Self::ServiceLoading => ChainStep::PendingPlaceholder,
            Self::RateLimited
            | Self::Timeout
            | Self::NetworkUnreachable
            | Self::MalformedResponse
            | Self::Unknown => ChainStep::Advance,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AuthError => "auth error",
            Self::PermissionError => "permission error",
            Self::RateLimited => "rate limited",
            Self::ServiceLoading => "service loading",
            Self::Timeout => "timeout",
            Self::NetworkUnreachable => "network unreachable",
            Self::MalformedResponse => "malformed response",
            Self::Unknown => "unknown failure",
        };
        f.write_str(name)
    }
}

/// The failure half of a provider's tagged result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} (status {provider_status:?}): {message}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub provider_status: Option<u16>,
    pub message: String,
    /// Set by providers that report how long a loading model will take.
    pub estimated_wait_seconds: Option<f64>,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider_status: None,
            message: message.into(),
            estimated_wait_seconds: None,
        }
    }

    /// Builds a failure from an HTTP status, classifying it with [`FailureKind::from_http_status`].
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::from_http_status(status),
            provider_status: Some(status),
            message: message.into(),
            estimated_wait_seconds: None,
        }
    }

    pub fn with_estimated_wait(mut self, seconds: Option<f64>) -> Self {
        self.estimated_wait_seconds = seconds;
        self
    }
}

/// A convenience type alias for provider results.
pub type ProviderResult<T> = Result<T, ProviderFailure>;

/// One failed provider attempt, kept in placeholder metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAttempt {
    pub provider: String,
    pub kind: FailureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<u16>,
    pub message: String,
}

impl ProviderAttempt {
    pub fn from_failure(provider: &str, failure: &ProviderFailure) -> Self {
        Self {
            provider: provider.to_string(),
            kind: failure.kind,
            provider_status: failure.provider_status,
            message: failure.message.clone(),
        }
    }
}

//=========================================================================================
// Media Requests
//=========================================================================================

/// Generation parameters for a video request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParams {
    pub duration_seconds: u32,
    pub motion_bucket: u32,
    pub guidance_scale: f32,
    pub image_conditioned: bool,
}

impl VideoParams {
    /// Parameters used when a lesson image is available to condition on.
    pub fn image_conditioned() -> Self {
        Self {
            duration_seconds: 5,
            motion_bucket: 127,
            guidance_scale: 7.5,
            image_conditioned: true,
        }
    }

    /// More conservative parameters for text-only requests.
    pub fn text_only() -> Self {
        Self {
            duration_seconds: 3,
            motion_bucket: 64,
            guidance_scale: 5.0,
            image_conditioned: false,
        }
    }
}

/// A provider-agnostic request for one media asset.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRequest {
    pub kind: MediaKind,
    /// Short human label (lesson title, "Introduction", ...).
    pub subject: String,
    /// Image/video prompt, or the narration text for speech.
    pub prompt: String,
    pub lesson_index: Option<usize>,
    pub conditioning_image: Option<PathBuf>,
    pub video: Option<VideoParams>,
}

impl MediaRequest {
    pub fn image(subject: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            subject: subject.into(),
            prompt: prompt.into(),
            lesson_index: None,
            conditioning_image: None,
            video: None,
        }
    }

    pub fn speech(subject: impl Into<String>, narration: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Audio,
            ..Self::image(subject, narration)
        }
    }

    pub fn video(
        subject: impl Into<String>,
        prompt: impl Into<String>,
        conditioning_image: Option<PathBuf>,
    ) -> Self {
        let params = if conditioning_image.is_some() {
            VideoParams::image_conditioned()
        } else {
            VideoParams::text_only()
        };
        Self {
            kind: MediaKind::Video,
            conditioning_image,
            video: Some(params),
            ..Self::image(subject, prompt)
        }
    }

    pub fn for_lesson(mut self, lesson_index: usize) -> Self {
        self.lesson_index = Some(lesson_index);
        self
    }

    /// Number of narrated words for speech requests.
    pub fn narration_words(&self) -> Option<usize> {
        match self.kind {
            MediaKind::Audio => Some(self.prompt.split_whitespace().count()),
            _ => None,
        }
    }
}

/// Raw content returned by a provider before it is written to the output root.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutput {
    pub bytes: Vec<u8>,
    /// File extension without the dot (`png`, `mp3`, `mp4`, ...).
    pub extension: String,
    pub duration_seconds: Option<f64>,
    pub model: Option<String>,
}

impl ProviderOutput {
    pub fn new(bytes: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            bytes,
            extension: extension.into(),
            duration_seconds: None,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A thin adapter around one external generative endpoint.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Stable identifier recorded as `producedBy` on generated assets.
    fn id(&self) -> &str;

    fn kind(&self) -> MediaKind;

    /// Upper bound for a single call. Every call is bounded.
    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn invoke(&self, request: &MediaRequest) -> ProviderResult<ProviderOutput>;
}

/// A reduced-fidelity but still generative strategy tried before a placeholder.
#[async_trait]
pub trait DegradedStrategy: Send + Sync {
    fn id(&self) -> &str;

    async fn produce(&self, request: &MediaRequest) -> ProviderResult<MediaAsset>;
}

/// The text-generation collaborator that turns domain knowledge into a lesson plan.
///
/// Returns the raw model output; parsing happens in the core so malformed
/// output can fall back to a deterministic plan.
#[async_trait]
pub trait LessonPlanService: Send + Sync {
    fn model_id(&self) -> &str;

    async fn generate_lesson_plan(
        &self,
        domain_text: &str,
        options: &GenerationOptions,
    ) -> PortResult<String>;
}

//=========================================================================================
// Document Store
//=========================================================================================

/// Filters for listing persisted modules. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleFilter {
    pub owner_id: Option<Uuid>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// A module matches when it carries every listed tag.
    pub tags: Vec<String>,
    pub is_public: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ModuleFilter {
    pub fn matches(&self, module: &MultimediaModule) -> bool {
        self.owner_id.map_or(true, |owner| module.owner_id == owner)
            && self
                .category
                .as_ref()
                .map_or(true, |c| module.category.as_deref() == Some(c.as_str()))
            && self
                .difficulty
                .map_or(true, |d| module.plan.difficulty == d)
            && self.tags.iter().all(|t| module.tags.contains(t))
            && self.is_public.map_or(true, |p| module.is_public == p)
    }
}

/// Listing row for a persisted module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSummary {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub lesson_count: usize,
    pub storage_bytes: u64,
    pub audio_duration_seconds: f64,
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&MultimediaModule> for ModuleSummary {
    fn from(module: &MultimediaModule) -> Self {
        Self {
            id: module.id,
            owner_id: module.owner_id,
            title: module.plan.title.clone(),
            description: module.plan.description.clone(),
            difficulty: module.plan.difficulty,
            category: module.category.clone(),
            tags: module.tags.clone(),
            is_public: module.is_public,
            lesson_count: module.plan.lessons.len(),
            storage_bytes: module.totals.storage_bytes,
            audio_duration_seconds: module.totals.audio_duration_seconds,
            view_count: module.view_count,
            created_at: module.created_at,
        }
    }
}

/// Per-owner storage aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub owner_id: Uuid,
    pub module_count: u64,
    pub total_storage_bytes: u64,
    pub total_audio_seconds: f64,
    pub public_modules: u64,
    pub total_views: u64,
}

impl StorageStats {
    pub fn from_summaries(owner_id: Uuid, summaries: &[ModuleSummary]) -> Self {
        summaries
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .fold(
                Self {
                    owner_id,
                    ..Self::default()
                },
                |mut stats, s| {
                    stats.module_count += 1;
                    stats.total_storage_bytes += s.storage_bytes;
                    stats.total_audio_seconds += s.audio_duration_seconds;
                    stats.public_modules += u64::from(s.is_public);
                    stats.total_views += s.view_count;
                    stats
                },
            )
    }
}

/// The document store that holds assembled modules, keyed by module id.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn create_module(&self, module: &MultimediaModule) -> PortResult<Uuid>;

    async fn get_module(&self, id: Uuid) -> PortResult<MultimediaModule>;

    async fn list_modules(&self, filter: &ModuleFilter) -> PortResult<Vec<ModuleSummary>>;

    /// Deletes a module owned by `owner_id`. Modules owned by someone else are `NotFound`.
    async fn delete_module(&self, id: Uuid, owner_id: Uuid) -> PortResult<()>;

    /// Increments the analytics view counter and returns the new value.
    async fn increment_view_count(&self, id: Uuid) -> PortResult<u64>;

    async fn storage_stats(&self, owner_id: Uuid) -> PortResult<StorageStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(FailureKind::from_http_status(401), FailureKind::AuthError);
        assert_eq!(FailureKind::from_http_status(403), FailureKind::PermissionError);
        assert_eq!(FailureKind::from_http_status(429), FailureKind::RateLimited);
        assert_eq!(FailureKind::from_http_status(503), FailureKind::ServiceLoading);
        assert_eq!(FailureKind::from_http_status(504), FailureKind::Timeout);
        assert_eq!(FailureKind::from_http_status(500), FailureKind::Unknown);
    }

    #[test]
    fn test_chain_step_decision_table() {
        assert_eq!(FailureKind::AuthError.chain_step(), ChainStep::SkipToDegraded);
        assert_eq!(FailureKind::PermissionError.chain_step(), ChainStep::SkipToDegraded);
        assert_eq!(
            FailureKind::ServiceLoading.chain_step(),
            ChainStep::PendingPlaceholder
        );
        for kind in [
            FailureKind::RateLimited,
            FailureKind::Timeout,
            FailureKind::NetworkUnreachable,
            FailureKind::MalformedResponse,
            FailureKind::Unknown,
        ] {
            assert_eq!(kind.chain_step(), ChainStep::Advance, "{kind}");
        }
    }

    #[test]
    fn test_video_request_params_depend_on_conditioning_image() {
        let with_image = MediaRequest::video("Lesson", "prompt", Some(PathBuf::from("a.png")));
        let text_only = MediaRequest::video("Lesson", "prompt", None);

        let conditioned = with_image.video.unwrap();
        let conservative = text_only.video.unwrap();
        assert!(conditioned.image_conditioned);
        assert!(!conservative.image_conditioned);
        assert!(conservative.duration_seconds < conditioned.duration_seconds);
        assert!(conservative.motion_bucket < conditioned.motion_bucket);
    }

    #[test]
    fn test_narration_words_only_for_speech() {
        let speech = MediaRequest::speech("Intro", "one two three four");
        assert_eq!(speech.narration_words(), Some(4));
        assert_eq!(MediaRequest::image("x", "one two").narration_words(), None);
    }

    #[test]
    fn test_storage_stats_only_counts_owner() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let row = |owner_id, bytes, public| ModuleSummary {
            id: Uuid::new_v4(),
            owner_id,
            title: "t".into(),
            description: String::new(),
            difficulty: Difficulty::Beginner,
            category: None,
            tags: vec![],
            is_public: public,
            lesson_count: 1,
            storage_bytes: bytes,
            audio_duration_seconds: 10.0,
            view_count: 2,
            created_at: Utc::now(),
        };
        let stats = StorageStats::from_summaries(
            owner,
            &[row(owner, 100, true), row(owner, 50, false), row(other, 999, true)],
        );
        assert_eq!(stats.module_count, 2);
        assert_eq!(stats.total_storage_bytes, 150);
        assert_eq!(stats.public_modules, 1);
        assert_eq!(stats.total_views, 4);
    }
}
