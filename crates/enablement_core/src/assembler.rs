//! crates/enablement_core/src/assembler.rs
//!
//! Merges the lesson plan with the generated media into one
//! [`MultimediaModule`]. Pure: no I/O, no clock reads beyond the id/creation stamp.

use crate::domain::{
    AssetOrigin, GenerationMetadata, GenerationOptions, GenerationSummary, LessonMedia, LessonPlan,
    MediaAsset, MediaKind, MediaOutcomeCounts, ModelIds, MultimediaModule, PersistenceInfo,
    PlanSource, SaveOptions, Totals,
};
use crate::plan::estimate_narration_seconds;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

/// Everything the assembler needs from a finished run.
#[derive(Debug, Clone)]
pub struct AssemblyInput {
    pub owner_id: Uuid,
    pub plan: LessonPlan,
    pub plan_source: PlanSource,
    pub lesson_media: Vec<LessonMedia>,
    pub intro_audio: Option<MediaAsset>,
    pub conclusion_audio: Option<MediaAsset>,
    pub options: GenerationOptions,
    pub save_options: SaveOptions,
    pub text_model: String,
    pub notes: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

pub fn assemble_module(input: AssemblyInput) -> MultimediaModule {
    let mut notes = input.notes;
    let lesson_media = align_lesson_media(&input.plan, input.lesson_media, &mut notes);

    let mut module = MultimediaModule {
        id: Uuid::new_v4(),
        owner_id: input.owner_id,
        plan: input.plan,
        intro_audio: input.intro_audio,
        conclusion_audio: input.conclusion_audio,
        lesson_media,
        totals: Totals::default(),
        generation_metadata: GenerationMetadata {
            started_at: input.started_at,
            processing_time_ms: input.processing_time_ms,
            model_ids_used: ModelIds {
                text: input.text_model,
                ..ModelIds::default()
            },
            options: input.options,
            provider_usage_counts: BTreeMap::new(),
            plan_source: input.plan_source,
            notes: Vec::new(),
        },
        summary: GenerationSummary {
            lesson_count: 0,
            plan_source: input.plan_source,
            images: MediaOutcomeCounts::default(),
            audio: MediaOutcomeCounts::default(),
            videos: MediaOutcomeCounts::default(),
            fully_generated: false,
            notes: Vec::new(),
        },
        persistence: PersistenceInfo::default(),
        category: input.save_options.category,
        tags: input.save_options.tags,
        is_public: input.save_options.is_public,
        view_count: 0,
        created_at: Utc::now(),
    };

    for asset in module.assets() {
        if asset.origin != AssetOrigin::Provider {
            notes.push(describe_fallback(asset));
        }
    }

    module.totals = compute_totals(&module);
    module.generation_metadata.provider_usage_counts = provider_usage_counts(&module);
    module.generation_metadata.model_ids_used.image = producers_of(&module, MediaKind::Image);
    module.generation_metadata.model_ids_used.audio = producers_of(&module, MediaKind::Audio);
    module.generation_metadata.model_ids_used.video = producers_of(&module, MediaKind::Video);
    module.summary = summarize(&module, notes.clone());
    module.generation_metadata.notes = notes;
    module
}

/// Totals derived from the assets a module references. Recomputing on an
/// assembled module yields the totals it already carries.
pub fn compute_totals(module: &MultimediaModule) -> Totals {
    module.assets().fold(Totals::default(), |mut totals, asset| {
        totals.storage_bytes += asset.size_bytes;
        if asset.kind == MediaKind::Audio {
            totals.audio_duration_seconds += audio_duration(asset);
        }
        totals
    })
}

/// Reported duration, or an estimate from the narration word count.
/// Placeholders hold no audio.
pub fn audio_duration(asset: &MediaAsset) -> f64 {
    if asset.is_placeholder() {
        return 0.0;
    }
    asset
        .duration_seconds
        .unwrap_or_else(|| estimate_narration_seconds(asset.narration_words.unwrap_or(0)))
}

/// Places each bundle at its lesson's index. Bundles for unknown lessons and
/// assets tagged with another lesson are dropped; lessons without a bundle get
/// an empty one.
fn align_lesson_media(
    plan: &LessonPlan,
    media: Vec<LessonMedia>,
    notes: &mut Vec<String>,
) -> Vec<LessonMedia> {
    let mut slots: Vec<Option<LessonMedia>> = vec![None; plan.lessons.len()];

    for mut bundle in media {
        let index = bundle.lesson_index;
        let Some(lesson) = plan.lessons.get(index) else {
            warn!(lesson = index, "Dropping media for a lesson that is not in the plan");
            notes.push(format!("dropped media for unknown lesson {}", index));
            continue;
        };
        if lesson.title != bundle.lesson_title {
            warn!(lesson = index, title = %bundle.lesson_title, "Dropping media whose title does not match its lesson");
            notes.push(format!("dropped mismatched media for lesson {}", index));
            continue;
        }
        if slots[index].is_some() {
            notes.push(format!("dropped duplicate media for lesson {}", index));
            continue;
        }

        let belongs = |asset: &MediaAsset| asset.lesson_index.map_or(true, |i| i == index);
        bundle.image = bundle.image.filter(belongs);
        bundle.audio = bundle.audio.filter(belongs);
        bundle.video_list.retain(belongs);
        slots[index] = Some(bundle);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.unwrap_or_else(|| LessonMedia::empty(i, plan.lessons[i].title.clone())))
        .collect()
}

fn provider_usage_counts(module: &MultimediaModule) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for asset in module.assets() {
        *counts.entry(asset.produced_by.clone()).or_insert(0) += 1;
    }
    counts
}

/// Distinct producers of real content for `kind`, in first-use order.
fn producers_of(module: &MultimediaModule, kind: MediaKind) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for asset in module.assets().filter(|a| a.kind == kind && !a.is_placeholder()) {
        let id = asset.model.as_ref().unwrap_or(&asset.produced_by);
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}

fn summarize(module: &MultimediaModule, notes: Vec<String>) -> GenerationSummary {
    let mut images = MediaOutcomeCounts::default();
    let mut audio = MediaOutcomeCounts::default();
    let mut videos = MediaOutcomeCounts::default();
    for asset in module.assets() {
        match asset.kind {
            MediaKind::Image => images.record(asset.origin),
            MediaKind::Audio => audio.record(asset.origin),
            MediaKind::Video => videos.record(asset.origin),
        }
    }

    let plan_source = module.generation_metadata.plan_source;
    let fully_generated = plan_source == PlanSource::Generated
        && [images, audio, videos]
            .iter()
            .all(|c| c.degraded == 0 && c.placeholder == 0);

    GenerationSummary {
        lesson_count: module.plan.lessons.len(),
        plan_source,
        images,
        audio,
        videos,
        fully_generated,
        notes,
    }
}

fn describe_fallback(asset: &MediaAsset) -> String {
    let scope = match asset.lesson_index {
        Some(i) => format!("lesson {} {}", i, asset.kind),
        None => format!("module {}", asset.kind),
    };
    match &asset.placeholder {
        Some(details) => format!("{}: placeholder ({:?})", scope, details.reason),
        None => format!("{}: degraded via {}", scope, asset.produced_by),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Difficulty, Lesson, LessonType, PlaceholderDetails, PlaceholderReason};
    use std::path::PathBuf;

    fn plan(titles: &[&str]) -> LessonPlan {
        LessonPlan {
            title: "Module".into(),
            description: String::new(),
            lessons: titles
                .iter()
                .map(|t| Lesson {
                    title: t.to_string(),
                    content: "content".into(),
                    lesson_type: LessonType::Theory,
                    duration_hint: None,
                })
                .collect(),
            objectives: vec![],
            key_takeaways: vec![],
            difficulty: Difficulty::Beginner,
        }
    }

    fn asset(kind: MediaKind, lesson: Option<usize>, size: u64, origin: AssetOrigin) -> MediaAsset {
        MediaAsset {
            kind,
            path: PathBuf::from("x"),
            size_bytes: size,
            produced_by: match origin {
                AssetOrigin::Placeholder => "placeholder".into(),
                _ => "fake".into(),
            },
            duration_seconds: None,
            origin,
            lesson_index: lesson,
            narration_words: (kind == MediaKind::Audio).then_some(300),
            model: None,
            created_at: Utc::now(),
            placeholder: (origin == AssetOrigin::Placeholder).then(|| PlaceholderDetails {
                reason: PlaceholderReason::ProvidersExhausted,
                subject: "s".into(),
                intended_content: "c".into(),
                pending_provider: None,
                estimated_wait_seconds: None,
                attempts: vec![],
            }),
        }
    }

    fn input(plan: LessonPlan, media: Vec<LessonMedia>) -> AssemblyInput {
        AssemblyInput {
            owner_id: Uuid::new_v4(),
            plan,
            plan_source: PlanSource::Generated,
            lesson_media: media,
            intro_audio: None,
            conclusion_audio: None,
            options: GenerationOptions::default(),
            save_options: SaveOptions::default(),
            text_model: "test-model".into(),
            notes: vec![],
            started_at: Utc::now(),
            processing_time_ms: 5,
        }
    }

    #[test]
    fn test_totals_sum_every_asset_for_any_combination() {
        for mask in 0u8..16 {
            let mut bundle = LessonMedia::empty(0, "A");
            let mut expected = 0;
            if mask & 1 != 0 {
                bundle.image = Some(asset(MediaKind::Image, Some(0), 100, AssetOrigin::Provider));
                expected += 100;
            }
            if mask & 2 != 0 {
                bundle.audio = Some(asset(MediaKind::Audio, Some(0), 30, AssetOrigin::Placeholder));
                expected += 30;
            }
            if mask & 4 != 0 {
                bundle.video_list.push(asset(MediaKind::Video, Some(0), 7, AssetOrigin::Degraded));
                expected += 7;
            }
            let mut inp = input(plan(&["A"]), vec![bundle]);
            if mask & 8 != 0 {
                inp.intro_audio = Some(asset(MediaKind::Audio, None, 11, AssetOrigin::Provider));
                expected += 11;
            }

            let module = assemble_module(inp);
            assert_eq!(module.totals.storage_bytes, expected, "mask {mask}");
            assert_eq!(compute_totals(&module), module.totals, "mask {mask}");
        }
    }

    #[test]
    fn test_audio_duration_uses_estimate_and_ignores_placeholders() {
        let mut bundle = LessonMedia::empty(0, "A");
        bundle.audio = Some(asset(MediaKind::Audio, Some(0), 10, AssetOrigin::Provider));
        let mut inp = input(plan(&["A"]), vec![bundle]);
        let mut intro = asset(MediaKind::Audio, None, 10, AssetOrigin::Provider);
        intro.duration_seconds = Some(12.5);
        inp.intro_audio = Some(intro);
        inp.conclusion_audio = Some(asset(MediaKind::Audio, None, 10, AssetOrigin::Placeholder));

        let module = assemble_module(inp);
        // 300 words at 150 wpm plus the reported 12.5 seconds.
        assert_eq!(module.totals.audio_duration_seconds, 132.5);
        assert_eq!(module.summary.audio.placeholder, 1);
        assert!(!module.summary.fully_generated);
    }

    #[test]
    fn test_media_lands_at_its_own_lesson() {
        let mut second = LessonMedia::empty(1, "B");
        second.image = Some(asset(MediaKind::Image, Some(1), 5, AssetOrigin::Provider));
        second.audio = Some(asset(MediaKind::Audio, Some(0), 5, AssetOrigin::Provider));
        let stray = LessonMedia::empty(7, "Z");
        let renamed = LessonMedia::empty(2, "not C");

        let module = assemble_module(input(plan(&["A", "B", "C"]), vec![renamed, second, stray]));

        assert_eq!(module.lesson_media.len(), 3);
        for (i, media) in module.lesson_media.iter().enumerate() {
            assert_eq!(media.lesson_index, i);
            assert!(media.assets().all(|a| a.lesson_index == Some(i)));
        }
        assert!(module.lesson_media[1].image.is_some());
        // The audio tagged for lesson 0 was not allowed to stay on lesson 1.
        assert!(module.lesson_media[1].audio.is_none());
        assert!(module.lesson_media[0].is_empty());
        assert!(module.lesson_media[2].is_empty());
        assert_eq!(module.generation_metadata.notes.len(), 2);
    }

    #[test]
    fn test_usage_counts_and_summary() {
        let mut bundle = LessonMedia::empty(0, "A");
        bundle.image = Some(asset(MediaKind::Image, Some(0), 1, AssetOrigin::Provider));
        bundle.video_list.push(asset(MediaKind::Video, Some(0), 1, AssetOrigin::Placeholder));

        let module = assemble_module(input(plan(&["A"]), vec![bundle]));

        assert_eq!(module.generation_metadata.provider_usage_counts.get("fake"), Some(&1));
        assert_eq!(module.generation_metadata.provider_usage_counts.get("placeholder"), Some(&1));
        assert_eq!(module.generation_metadata.model_ids_used.image, vec!["fake"]);
        assert!(module.generation_metadata.model_ids_used.video.is_empty());
        assert_eq!(module.summary.images.generated, 1);
        assert_eq!(module.summary.videos.placeholder, 1);
        assert_eq!(module.summary.lesson_count, 1);
    }
}
