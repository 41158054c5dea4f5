//! crates/enablement_core/src/lesson_media.rs
//!
//! Generates the media bundle of a single lesson by driving the image, speech
//! and video fallback chains. Within a lesson the order is fixed: the video
//! request depends on the image result.

use crate::domain::{GenerationOptions, Lesson, LessonMedia, MediaAsset, MediaKind};
use crate::fallback::FallbackChain;
use crate::plan::{image_prompt, lesson_narration, video_prompt};
use crate::ports::MediaRequest;
use std::sync::Arc;
use tracing::debug;

/// One fallback chain per capability.
pub struct MediaChains {
    pub image: FallbackChain,
    pub audio: FallbackChain,
    pub video: FallbackChain,
}

impl MediaChains {
    pub fn chain(&self, kind: MediaKind) -> &FallbackChain {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
        }
    }
}

#[derive(Clone)]
pub struct LessonMediaGenerator {
    chains: Arc<MediaChains>,
}

impl LessonMediaGenerator {
    pub fn new(chains: Arc<MediaChains>) -> Self {
        Self { chains }
    }

    pub fn chains(&self) -> &MediaChains {
        &self.chains
    }

    /// Produces the media for `lesson`. Each capability is generated only when
    /// enabled in `options`; every enabled capability yields an asset.
    pub async fn generate_for_lesson(
        &self,
        lesson_index: usize,
        lesson: &Lesson,
        options: &GenerationOptions,
    ) -> LessonMedia {
        let mut media = LessonMedia::empty(lesson_index, lesson.title.clone());

        if options.include_images {
            let request = MediaRequest::image(
                lesson.title.clone(),
                image_prompt(lesson, options.image_style.as_deref()),
            )
            .for_lesson(lesson_index);
            media.image = Some(self.chains.image.generate(&request).await);
        }

        if options.include_audio {
            let request = MediaRequest::speech(lesson.title.clone(), lesson_narration(lesson))
                .for_lesson(lesson_index);
            media.audio = Some(self.chains.audio.generate(&request).await);
        }

        if options.include_videos {
            // Condition on the lesson image only when a provider actually drew it.
            let conditioning = media
                .image
                .as_ref()
                .filter(|image| !image.is_placeholder())
                .map(|image| image.path.clone());
            debug!(
                lesson = lesson_index,
                image_conditioned = conditioning.is_some(),
                "Requesting lesson video"
            );
            let request = MediaRequest::video(lesson.title.clone(), video_prompt(lesson), conditioning)
                .for_lesson(lesson_index);
            media.video_list.push(self.chains.video.generate(&request).await);
        }

        media
    }

    /// Module-level narration (introduction or conclusion).
    pub async fn generate_narration(&self, subject: &str, narration: String) -> MediaAsset {
        let request = MediaRequest::speech(subject, narration);
        self.chains.audio.generate(&request).await
    }
}
