//! crates/enablement_core/src/sequence.rs
//!
//! Degraded video strategy: a short still-image sequence described by a JSON
//! manifest, used when the video providers reject our credentials.

use crate::domain::{AssetOrigin, MediaAsset, MediaKind, IMAGE_SEQUENCE_PRODUCER};
use crate::fallback::invoke_bounded;
use crate::ports::{
    DegradedStrategy, FailureKind, MediaProvider, MediaRequest, ProviderFailure, ProviderResult,
};
use crate::storage::MediaStorage;
use crate::throttle::ProviderThrottle;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const FRAMES: usize = 3;
const SECONDS_PER_FRAME: f64 = 2.0;

/// Camera directions appended to the prompt of each generated frame.
const FRAME_DIRECTIONS: [&str; 4] = [
    "wide establishing shot",
    "medium shot focusing on the key idea",
    "close-up detail",
    "closing summary view",
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SequenceManifest<'a> {
    subject: &'a str,
    seconds_per_frame: f64,
    frames: &'a [PathBuf],
}

#[derive(Deserialize)]
struct StoredManifest {
    frames: Vec<PathBuf>,
}

/// Frame files listed by a sequence manifest, including a reused lesson image.
pub async fn sequence_frames(manifest: &Path) -> io::Result<Vec<PathBuf>> {
    let bytes = tokio::fs::read(manifest).await?;
    let stored: StoredManifest =
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(stored.frames)
}

pub struct ImageSequenceStrategy {
    image_providers: Vec<Arc<dyn MediaProvider>>,
    storage: Arc<MediaStorage>,
    throttle: Arc<ProviderThrottle>,
}

impl ImageSequenceStrategy {
    pub fn new(
        image_providers: Vec<Arc<dyn MediaProvider>>,
        storage: Arc<MediaStorage>,
        throttle: Arc<ProviderThrottle>,
    ) -> Self {
        Self {
            image_providers: image_providers
                .into_iter()
                .filter(|p| p.kind() == MediaKind::Image)
                .collect(),
            storage,
            throttle,
        }
    }

    /// First provider that answers wins the frame; no nested fallback.
    async fn generate_frame(&self, request: &MediaRequest, direction: &str) -> Option<(PathBuf, u64)> {
        let frame_request = MediaRequest {
            prompt: format!("{}, {}", request.prompt, direction),
            ..MediaRequest::image(request.subject.clone(), String::new())
        };
        let frame_request = match request.lesson_index {
            Some(i) => frame_request.for_lesson(i),
            None => frame_request,
        };

        for provider in &self.image_providers {
            match invoke_bounded(provider.as_ref(), &frame_request, &self.throttle).await {
                Ok(output) => {
                    let label = format!("{}_frame", request.subject);
                    match self
                        .storage
                        .write_bytes(MediaKind::Image, &label, &output.extension, &output.bytes)
                        .await
                    {
                        Ok(written) => return Some(written),
                        Err(e) => warn!(error = %e, "Could not write sequence frame"),
                    }
                }
                Err(failure) => debug!(
                    provider = provider.id(),
                    failure = %failure.kind,
                    "Sequence frame attempt failed"
                ),
            }
        }
        None
    }
}

#[async_trait]
impl DegradedStrategy for ImageSequenceStrategy {
    fn id(&self) -> &str {
        IMAGE_SEQUENCE_PRODUCER
    }

    async fn produce(&self, request: &MediaRequest) -> ProviderResult<MediaAsset> {
        let mut frames: Vec<PathBuf> = Vec::new();
        let mut new_bytes = 0u64;

        // A real lesson image is reused as the opening frame.
        if let Some(image) = &request.conditioning_image {
            if tokio::fs::metadata(image).await.is_ok() {
                frames.push(image.clone());
            }
        }

        let wanted = FRAMES.saturating_sub(frames.len());
        for direction in FRAME_DIRECTIONS.iter().cycle().take(wanted) {
            if let Some((path, size)) = self.generate_frame(request, direction).await {
                frames.push(path);
                new_bytes += size;
            }
        }

        if frames.is_empty() {
            return Err(ProviderFailure::new(
                FailureKind::Unknown,
                "no still frames could be produced for the sequence",
            ));
        }

        let manifest = SequenceManifest {
            subject: &request.subject,
            seconds_per_frame: SECONDS_PER_FRAME,
            frames: &frames,
        };
        let bytes = serde_json::to_vec_pretty(&manifest).map_err(|e| {
            ProviderFailure::new(FailureKind::Unknown, format!("could not encode manifest: {}", e))
        })?;
        let (path, manifest_size) = self
            .storage
            .write_bytes(MediaKind::Video, &format!("{}_sequence", request.subject), "sequence.json", &bytes)
            .await
            .map_err(|e| {
                ProviderFailure::new(FailureKind::Unknown, format!("could not write manifest: {}", e))
            })?;

        Ok(MediaAsset {
            kind: MediaKind::Video,
            path,
            size_bytes: manifest_size + new_bytes,
            produced_by: IMAGE_SEQUENCE_PRODUCER.to_string(),
            duration_seconds: Some(frames.len() as f64 * SECONDS_PER_FRAME),
            origin: AssetOrigin::Degraded,
            lesson_index: request.lesson_index,
            narration_words: None,
            model: None,
            created_at: Utc::now(),
            placeholder: None,
        })
    }
}
