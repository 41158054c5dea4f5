//! crates/enablement_core/src/storage.rs
//!
//! The output filesystem root. Assets are appended under one directory per
//! media kind with timestamp-uniqued names, so concurrent runs never collide.
//! Module snapshots live under `modules/`. Nothing here is rolled back on
//! cancellation; stale assets are removed by [`MediaStorage::sweep_older_than`].

use crate::domain::{
    AssetOrigin, MediaAsset, MediaKind, MultimediaModule, PlaceholderDetails, PLACEHOLDER_PRODUCER,
};
use crate::ports::{MediaRequest, ProviderOutput};
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MODULES_DIR: &str = "modules";

/// Result of one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed_files: u64,
    pub reclaimed_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: MediaKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn snapshot_path(&self, module_id: Uuid) -> PathBuf {
        self.root.join(MODULES_DIR).join(format!("{}.json", module_id))
    }

    /// Creates the per-kind directories and the snapshot directory.
    pub async fn ensure_layout(&self) -> io::Result<()> {
        for kind in MediaKind::ALL {
            tokio::fs::create_dir_all(self.kind_dir(kind)).await?;
        }
        tokio::fs::create_dir_all(self.root.join(MODULES_DIR)).await
    }

    /// Writes raw bytes under the directory for `kind` and returns the path and size.
    pub async fn write_bytes(
        &self,
        kind: MediaKind,
        label: &str,
        extension: &str,
        bytes: &[u8],
    ) -> io::Result<(PathBuf, u64)> {
        let dir = self.kind_dir(kind);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(unique_file_name(kind, label, extension));
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote asset");
        Ok((path, bytes.len() as u64))
    }

    /// Persists a provider's output and describes it as a [`MediaAsset`].
    pub async fn store_output(
        &self,
        provider_id: &str,
        request: &MediaRequest,
        output: ProviderOutput,
    ) -> io::Result<MediaAsset> {
        let label = request
            .lesson_index
            .map(|i| format!("lesson{}_{}", i, provider_id))
            .unwrap_or_else(|| format!("{}_{}", request.subject, provider_id));
        let (path, size_bytes) = self
            .write_bytes(request.kind, &label, &output.extension, &output.bytes)
            .await?;

        Ok(MediaAsset {
            kind: request.kind,
            path,
            size_bytes,
            produced_by: provider_id.to_string(),
            duration_seconds: output.duration_seconds,
            origin: AssetOrigin::Provider,
            lesson_index: request.lesson_index,
            narration_words: request.narration_words(),
            model: output.model,
            created_at: Utc::now(),
            placeholder: None,
        })
    }

    /// Writes the metadata file of a placeholder asset.
    ///
    /// Never fails: when the file cannot be written the asset still exists,
    /// with a size of zero.
    pub async fn write_placeholder(
        &self,
        request: &MediaRequest,
        details: PlaceholderDetails,
    ) -> MediaAsset {
        let label = request
            .lesson_index
            .map(|i| format!("lesson{}_{}", i, PLACEHOLDER_PRODUCER))
            .unwrap_or_else(|| format!("{}_{}", request.subject, PLACEHOLDER_PRODUCER));
        let document = serde_json::json!({
            "kind": request.kind,
            "subject": details.subject,
            "placeholder": &details,
        });

        let (path, size_bytes) = match serde_json::to_vec_pretty(&document) {
            Ok(bytes) => match self.write_bytes(request.kind, &label, "json", &bytes).await {
                Ok(written) => written,
                Err(e) => {
                    warn!(kind = %request.kind, error = %e, "Could not write placeholder file");
                    (self.kind_dir(request.kind).join(unique_file_name(request.kind, &label, "json")), 0)
                }
            },
            Err(e) => {
                warn!(kind = %request.kind, error = %e, "Could not encode placeholder metadata");
                (self.kind_dir(request.kind).join(unique_file_name(request.kind, &label, "json")), 0)
            }
        };

        MediaAsset {
            kind: request.kind,
            path,
            size_bytes,
            produced_by: PLACEHOLDER_PRODUCER.to_string(),
            duration_seconds: None,
            origin: AssetOrigin::Placeholder,
            lesson_index: request.lesson_index,
            narration_words: request.narration_words(),
            model: None,
            created_at: Utc::now(),
            placeholder: Some(details),
        }
    }

    //=====================================================================================
    // Module Snapshots
    //=====================================================================================

    /// Writes the full module as a JSON document, replacing any earlier snapshot.
    pub async fn write_snapshot(&self, module: &MultimediaModule) -> io::Result<PathBuf> {
        let path = self.snapshot_path(module.id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(module)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // Write-then-rename so readers never observe a half-written snapshot.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    pub async fn read_snapshot(&self, module_id: Uuid) -> io::Result<MultimediaModule> {
        let bytes = tokio::fs::read(self.snapshot_path(module_id)).await?;
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Reads every snapshot under the modules directory, skipping unreadable files.
    pub async fn read_all_snapshots(&self) -> io::Result<Vec<MultimediaModule>> {
        let dir = self.root.join(MODULES_DIR);
        let mut modules = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(modules),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<MultimediaModule>(&bytes) {
                    Ok(module) => modules.push(module),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable snapshot"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable snapshot"),
            }
        }
        Ok(modules)
    }

    pub async fn remove_snapshot(&self, module_id: Uuid) -> io::Result<()> {
        remove_if_exists(&self.snapshot_path(module_id)).await
    }

    /// Removes an asset file, refusing paths outside the output root.
    pub async fn remove_asset(&self, path: &Path) -> io::Result<()> {
        if !path.starts_with(&self.root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is outside the output root", path.display()),
            ));
        }
        remove_if_exists(path).await
    }

    //=====================================================================================
    // Cleanup Sweep
    //=====================================================================================

    /// Deletes media files older than `max_age`. Snapshots are left alone.
    pub async fn sweep_older_than(&self, max_age: Duration) -> io::Result<SweepReport> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut report = SweepReport::default();

        for kind in MediaKind::ALL {
            let dir = self.kind_dir(kind);
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                if !metadata.is_file() {
                    continue;
                }
                let modified = metadata.modified().unwrap_or(SystemTime::now());
                if modified < cutoff {
                    match tokio::fs::remove_file(entry.path()).await {
                        Ok(()) => {
                            report.removed_files += 1;
                            report.reclaimed_bytes += metadata.len();
                        }
                        Err(e) => {
                            warn!(path = %entry.path().display(), error = %e, "Cleanup could not remove file")
                        }
                    }
                }
            }
        }

        if report.removed_files > 0 {
            info!(
                removed = report.removed_files,
                reclaimed_bytes = report.reclaimed_bytes,
                "Cleanup sweep removed stale assets"
            );
        }
        Ok(report)
    }
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// `<kind>_<label>_<utc timestamp with millis>_<random>.<ext>`
fn unique_file_name(kind: MediaKind, label: &str, extension: &str) -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}_{}.{}",
        kind.as_str(),
        slugify(label),
        stamp,
        &nonce[..8],
        extension.trim_start_matches('.')
    )
}

fn slugify(label: &str) -> String {
    let slug: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug: String = slug.chars().take(40).collect();
    if slug.is_empty() {
        "asset".to_string()
    } else {
        slug
    }
}
