//! crates/enablement_core/src/pipeline.rs
//!
//! End-to-end generation of a multimedia training module:
//! content generation → per-lesson media → intro/outro narration → assembly →
//! persistence. Stages run in order and never re-enter. The only fatal outcome
//! is having no usable lesson plan at all; everything else degrades and is
//! recorded in the module's metadata.

use crate::assembler::{assemble_module, AssemblyInput};
use crate::domain::{
    GenerationOptions, GenerationSummary, LessonMedia, LessonPlan, MediaAsset, MediaKind,
    MultimediaModule, PlanSource, SaveOptions,
};
use crate::lesson_media::LessonMediaGenerator;
use crate::persistence::{PersistOutcome, PersistenceGateway};
use crate::plan::{conclusion_narration, fallback_plan, intro_narration, parse_lesson_plan};
use crate::ports::LessonPlanService;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

//=========================================================================================
// Errors, Requests and Reports
//=========================================================================================

/// Failures that abort a run and reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("domain knowledge text is empty")]
    EmptyInput,
    #[error("no usable lesson plan could be produced: {0}")]
    NoUsablePlan(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub domain_knowledge: String,
    #[serde(alias = "userId")]
    pub owner_id: Uuid,
    #[serde(default)]
    pub options: GenerationOptions,
    #[serde(default)]
    pub save_options: SaveOptions,
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub module: MultimediaModule,
    pub summary: GenerationSummary,
    pub persistence: PersistOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    ContentGenerated,
    MediaGenerated,
    IntroOutroGenerated,
    Assembled,
    PersistedOrDegraded,
    Done,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Bound on the text-generation call.
    pub text_timeout: Duration,
    /// Pause before each lesson after the first, as a courtesy to providers.
    pub lesson_delay: Duration,
    /// Lessons generated at once. Results keep lesson order regardless.
    pub lesson_concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            text_timeout: Duration::from_secs(90),
            lesson_delay: Duration::from_secs(1),
            lesson_concurrency: 1,
        }
    }
}

//=========================================================================================
// The Orchestrator
//=========================================================================================

pub struct PipelineOrchestrator {
    planner: Arc<dyn LessonPlanService>,
    media: LessonMediaGenerator,
    gateway: Arc<PersistenceGateway>,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        planner: Arc<dyn LessonPlanService>,
        media: LessonMediaGenerator,
        gateway: Arc<PersistenceGateway>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            planner,
            media,
            gateway,
            settings,
        }
    }

    /// Provider ids configured for each capability, in priority order.
    pub fn provider_overview(&self) -> BTreeMap<MediaKind, Vec<String>> {
        MediaKind::ALL
            .into_iter()
            .map(|kind| (kind, self.media.chains().chain(kind).provider_ids()))
            .collect()
    }

    pub fn text_model(&self) -> &str {
        self.planner.model_id()
    }

    pub async fn run(&self, request: GenerationRequest) -> Result<GenerationReport, PipelineError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut stage = PipelineStage::Start;
        info!(owner = %request.owner_id, "Starting module generation");

        // --- 1. Content ---
        let (plan, plan_source, notes) = self.generate_content(&request).await?;
        advance(&mut stage, PipelineStage::ContentGenerated);
        info!(lessons = plan.lessons.len(), source = ?plan_source, "Lesson plan ready");

        // --- 2. Per-lesson media ---
        let lesson_media = self.generate_lesson_media(&plan, &request.options).await;
        advance(&mut stage, PipelineStage::MediaGenerated);

        // --- 3. Intro / outro narration ---
        let (intro_audio, conclusion_audio) = self.generate_intro_outro(&plan, &request.options).await;
        advance(&mut stage, PipelineStage::IntroOutroGenerated);

        // --- 4. Assembly ---
        let processing_time_ms = (clock.elapsed().as_millis() as u64).max(1);
        let mut module = assemble_module(AssemblyInput {
            owner_id: request.owner_id,
            plan,
            plan_source,
            lesson_media,
            intro_audio,
            conclusion_audio,
            options: request.options.clone(),
            save_options: request.save_options.clone(),
            text_model: self.planner.model_id().to_string(),
            notes,
            started_at,
            processing_time_ms,
        });
        advance(&mut stage, PipelineStage::Assembled);

        // --- 5. Persistence ---
        let persistence = self
            .gateway
            .persist(&mut module, request.save_options.save_to_store)
            .await;
        advance(&mut stage, PipelineStage::PersistedOrDegraded);

        info!(
            module = %module.id,
            storage_bytes = module.totals.storage_bytes,
            audio_seconds = module.totals.audio_duration_seconds,
            saved_to_store = module.persistence.saved_to_store,
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "Module generation finished"
        );
        advance(&mut stage, PipelineStage::Done);

        Ok(GenerationReport {
            summary: module.summary.clone(),
            module,
            persistence,
        })
    }

    /// Asks the text-generation collaborator for a plan, falling back to the
    /// deterministic plan on failure, timeout or unusable output.
    async fn generate_content(
        &self,
        request: &GenerationRequest,
    ) -> Result<(LessonPlan, PlanSource, Vec<String>), PipelineError> {
        let text = request.domain_knowledge.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let mut notes = Vec::new();
        let generated = tokio::time::timeout(
            self.settings.text_timeout,
            self.planner.generate_lesson_plan(text, &request.options),
        )
        .await;

        match generated {
            Ok(Ok(raw)) => match parse_lesson_plan(&raw) {
                Ok(mut plan) => {
                    if let Some(max) = request.options.max_lessons {
                        plan.lessons.truncate(max.max(1));
                    }
                    return Ok((plan, PlanSource::Generated, notes));
                }
                Err(e) => {
                    warn!(error = %e, "Lesson plan output unusable; using fallback plan");
                    notes.push(format!("lesson plan output unusable ({}); fallback plan used", e));
                }
            },
            Ok(Err(e)) => {
                warn!(error = %e, "Text generation failed; using fallback plan");
                notes.push(format!("text generation failed ({}); fallback plan used", e));
            }
            Err(_) => {
                warn!(timeout = ?self.settings.text_timeout, "Text generation timed out; using fallback plan");
                notes.push("text generation timed out; fallback plan used".to_string());
            }
        }

        fallback_plan(text, request.options.max_lessons)
            .map(|plan| (plan, PlanSource::Fallback, notes.clone()))
            .ok_or_else(|| PipelineError::NoUsablePlan(notes.join("; ")))
    }

    async fn generate_lesson_media(
        &self,
        plan: &LessonPlan,
        options: &GenerationOptions,
    ) -> Vec<LessonMedia> {
        let calls_providers = options.include_images || options.include_audio || options.include_videos;
        let delay = if calls_providers {
            self.settings.lesson_delay
        } else {
            Duration::ZERO
        };
        let media = &self.media;

        let lesson_futures: Vec<_> = plan
            .lessons
            .iter()
            .enumerate()
            .map(|(index, lesson)| async move {
                if index > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let bundle = media.generate_for_lesson(index, lesson, options).await;
                info!(lesson = index, assets = bundle.assets().count(), "Lesson media generated");
                bundle
            })
            .collect();

        stream::iter(lesson_futures)
            .buffered(self.settings.lesson_concurrency.max(1))
            .collect()
            .await
    }

    async fn generate_intro_outro(
        &self,
        plan: &LessonPlan,
        options: &GenerationOptions,
    ) -> (Option<MediaAsset>, Option<MediaAsset>) {
        if !(options.include_audio && options.include_intro_outro) {
            return (None, None);
        }
        let intro = self
            .media
            .generate_narration("Introduction", intro_narration(plan))
            .await;
        let conclusion = self
            .media
            .generate_narration("Conclusion", conclusion_narration(plan))
            .await;
        (Some(intro), Some(conclusion))
    }
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    tracing::debug!(from = ?*stage, to = ?next, "Pipeline stage transition");
    *stage = next;
}
