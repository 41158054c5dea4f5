//! crates/enablement_core/src/domain.rs
//!
//! Defines the core data structures for multimedia training-module generation.
//! These structs are independent of any provider, database or transport. They
//! serialize in camelCase because the same shapes are returned to API callers
//! and written as filesystem snapshots.

use crate::ports::ProviderAttempt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// `producedBy` value of every placeholder asset.
pub const PLACEHOLDER_PRODUCER: &str = "placeholder";

/// `producedBy` value of videos synthesized from still images.
pub const IMAGE_SEQUENCE_PRODUCER: &str = "image-sequence";

//=========================================================================================
// Lesson Plan
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    #[default]
    Theory,
    Practical,
    Assessment,
}

impl FromStr for LessonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "theory" | "theoretical" | "concept" => Ok(Self::Theory),
            "practical" | "practice" | "exercise" => Ok(Self::Practical),
            "assessment" | "quiz" | "test" => Ok(Self::Assessment),
            other => Err(format!("unknown lesson type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" | "basic" | "easy" => Ok(Self::Beginner),
            "intermediate" | "medium" => Ok(Self::Intermediate),
            "advanced" | "expert" | "hard" => Ok(Self::Advanced),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// One lesson of a generated plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub lesson_type: LessonType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hint: Option<String>,
}

/// The structured lesson plan produced once per pipeline run.
///
/// Immutable input to media generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub key_takeaways: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

//=========================================================================================
// Media Assets
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Image, MediaKind::Audio, MediaKind::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Directory under the output root that holds assets of this kind.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Audio => "audio",
            Self::Video => "videos",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an asset came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetOrigin {
    /// Real content returned by an external provider.
    Provider,
    /// Generative but reduced-fidelity content (e.g. a still-image sequence instead of a video).
    Degraded,
    /// A descriptive stand-in; no provider produced content.
    Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaceholderReason {
    /// Every provider in the chain failed.
    ProvidersExhausted,
    /// A provider reported that its model is still loading; content is pending, not absent.
    ServicePending,
    /// No provider is configured for this capability.
    NotConfigured,
}

/// Structured description carried by every placeholder asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderDetails {
    pub reason: PlaceholderReason,
    pub subject: String,
    /// What the asset was meant to contain (the prompt or narration excerpt).
    pub intended_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_wait_seconds: Option<f64>,
    #[serde(default)]
    pub attempts: Vec<ProviderAttempt>,
}

/// A single generated (or stand-in) media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub kind: MediaKind,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Provider id, `image-sequence` or `placeholder`.
    pub produced_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub origin: AssetOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_index: Option<usize>,
    /// Word count of the narration an audio asset speaks; used to estimate duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_words: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<PlaceholderDetails>,
}

impl MediaAsset {
    pub fn is_placeholder(&self) -> bool {
        self.origin == AssetOrigin::Placeholder
    }
}

/// Per-lesson media bundle.
///
/// `video_list` may be empty but is always present. A missing image or audio
/// means the capability was disabled, not that generation errored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonMedia {
    pub lesson_index: usize,
    pub lesson_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaAsset>,
    #[serde(default)]
    pub video_list: Vec<MediaAsset>,
}

impl LessonMedia {
    pub fn empty(lesson_index: usize, lesson_title: impl Into<String>) -> Self {
        Self {
            lesson_index,
            lesson_title: lesson_title.into(),
            image: None,
            audio: None,
            video_list: Vec::new(),
        }
    }

    pub fn assets(&self) -> impl Iterator<Item = &MediaAsset> {
        self.image
            .iter()
            .chain(self.audio.iter())
            .chain(self.video_list.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.assets().next().is_none()
    }
}

//=========================================================================================
// Request Options
//=========================================================================================

/// Which capabilities a run should generate. Every capability is on by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    pub include_images: bool,
    pub include_audio: bool,
    pub include_videos: bool,
    pub include_intro_outro: bool,
    pub image_style: Option<String>,
    pub max_lessons: Option<usize>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            include_images: true,
            include_audio: true,
            include_videos: true,
            include_intro_outro: true,
            image_style: None,
            max_lessons: None,
        }
    }
}

impl GenerationOptions {
    /// Options that generate only the lesson plan.
    pub fn text_only() -> Self {
        Self {
            include_images: false,
            include_audio: false,
            include_videos: false,
            include_intro_outro: false,
            ..Self::default()
        }
    }
}

/// Where and how the assembled module is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveOptions {
    pub save_to_store: bool,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            save_to_store: true,
            category: None,
            tags: Vec::new(),
            is_public: false,
        }
    }
}

//=========================================================================================
// Generation Metadata & Summary
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    /// The text-generation collaborator returned a usable plan.
    Generated,
    /// The plan was derived deterministically from the input text.
    Fallback,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelIds {
    pub text: String,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub audio: Vec<String>,
    #[serde(default)]
    pub video: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub started_at: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub model_ids_used: ModelIds,
    pub options: GenerationOptions,
    #[serde(default)]
    pub provider_usage_counts: BTreeMap<String, u32>,
    pub plan_source: PlanSource,
    /// Human-readable record of every degradation that happened during the run.
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaOutcomeCounts {
    pub generated: u32,
    pub degraded: u32,
    pub placeholder: u32,
}

impl MediaOutcomeCounts {
    pub fn record(&mut self, origin: AssetOrigin) {
        match origin {
            AssetOrigin::Provider => self.generated += 1,
            AssetOrigin::Degraded => self.degraded += 1,
            AssetOrigin::Placeholder => self.placeholder += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.generated + self.degraded + self.placeholder
    }
}

/// Breakdown of what was generated versus what fell back, so callers can
/// judge quality without reading logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub lesson_count: usize,
    pub plan_source: PlanSource,
    pub images: MediaOutcomeCounts,
    pub audio: MediaOutcomeCounts,
    pub videos: MediaOutcomeCounts,
    /// True when the plan was generated and no asset was degraded or a placeholder.
    pub fully_generated: bool,
    #[serde(default)]
    pub notes: Vec<String>,
}

//=========================================================================================
// Multimedia Module
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub audio_duration_seconds: f64,
    pub storage_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceInfo {
    pub saved_to_store: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

/// The terminal artifact of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultimediaModule {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[serde(flatten)]
    pub plan: LessonPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro_audio: Option<MediaAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion_audio: Option<MediaAsset>,
    pub lesson_media: Vec<LessonMedia>,
    pub totals: Totals,
    pub generation_metadata: GenerationMetadata,
    pub summary: GenerationSummary,
    #[serde(default)]
    pub persistence: PersistenceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
}

impl MultimediaModule {
    /// Every asset referenced by the module, module-level narration first.
    pub fn assets(&self) -> impl Iterator<Item = &MediaAsset> {
        self.intro_audio
            .iter()
            .chain(self.conclusion_audio.iter())
            .chain(self.lesson_media.iter().flat_map(|m| m.assets()))
    }
}
