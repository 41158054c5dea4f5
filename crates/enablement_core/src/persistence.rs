//! crates/enablement_core/src/persistence.rs
//!
//! Durable storage for assembled modules. The filesystem snapshot is written
//! first and is the source of truth; the document-store write is best effort.
//! The read side falls back to snapshots when the store is unavailable.

use crate::domain::{MultimediaModule, IMAGE_SEQUENCE_PRODUCER};
use crate::ports::{ModuleFilter, ModuleStore, ModuleSummary, PortError, PortResult, StorageStats};
use crate::sequence::sequence_frames;
use crate::storage::MediaStorage;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of [`PersistenceGateway::persist`]. Neither variant is an error.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Stored { store_id: Uuid },
    /// The module lives on the filesystem only.
    Degraded { reason: String },
}

pub struct PersistenceGateway {
    store: Arc<dyn ModuleStore>,
    storage: Arc<MediaStorage>,
    store_timeout: Duration,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn ModuleStore>, storage: Arc<MediaStorage>, store_timeout: Duration) -> Self {
        Self {
            store,
            storage,
            store_timeout,
        }
    }

    /// Snapshots `module`, then writes it to the document store unless
    /// `save_to_store` is false. Updates `module.persistence` either way.
    pub async fn persist(&self, module: &mut MultimediaModule, save_to_store: bool) -> PersistOutcome {
        // --- 1. Filesystem snapshot, unconditionally ---
        let snapshot_error = match self.storage.write_snapshot(module).await {
            Ok(path) => {
                module.persistence.snapshot_path = Some(path);
                None
            }
            Err(e) => {
                error!(module = %module.id, error = %e, "Failed to write module snapshot");
                Some(e.to_string())
            }
        };

        if !save_to_store {
            info!(module = %module.id, "Module kept on filesystem only by request");
            return PersistOutcome::Degraded {
                reason: "store write not requested".to_string(),
            };
        }

        // --- 2. Document store, best effort ---
        let stored = self
            .bounded("create module", self.store.create_module(module))
            .await;

        match stored {
            Ok(store_id) => {
                module.persistence.saved_to_store = true;
                module.persistence.store_id = Some(store_id);
                // Refresh the snapshot so it records the store id.
                if snapshot_error.is_none() {
                    if let Err(e) = self.storage.write_snapshot(module).await {
                        warn!(module = %module.id, error = %e, "Could not refresh module snapshot");
                    }
                }
                info!(module = %module.id, store_id = %store_id, "Module saved to store");
                PersistOutcome::Stored { store_id }
            }
            Err(e) => {
                warn!(module = %module.id, error = %e, "Document store write failed; keeping filesystem copy");
                module.persistence.saved_to_store = false;
                module.persistence.store_id = None;
                let reason = match snapshot_error {
                    Some(fs) => format!("store write failed ({}) and snapshot failed ({})", e, fs),
                    None => format!("store write failed: {}", e),
                };
                PersistOutcome::Degraded { reason }
            }
        }
    }

    //=====================================================================================
    // Read Side
    //=====================================================================================

    /// Fetches a module and counts the view. Falls back to the snapshot when
    /// the store does not have it.
    pub async fn get(&self, id: Uuid) -> PortResult<MultimediaModule> {
        match self.bounded("get module", self.store.get_module(id)).await {
            Ok(mut module) => {
                match self
                    .bounded("increment view count", self.store.increment_view_count(id))
                    .await
                {
                    Ok(views) => module.view_count = views,
                    Err(e) => warn!(module = %id, error = %e, "Could not increment view count"),
                }
                Ok(module)
            }
            Err(e) => {
                if !matches!(e, PortError::NotFound(_)) {
                    warn!(module = %id, error = %e, "Store read failed; trying snapshot");
                }
                self.storage
                    .read_snapshot(id)
                    .await
                    .map_err(|_| PortError::NotFound(format!("Module {} not found", id)))
            }
        }
    }

    /// Lists modules from the store. Modules that only exist as snapshots are
    /// merged into the first page.
    pub async fn list(&self, filter: &ModuleFilter) -> PortResult<Vec<ModuleSummary>> {
        match self.bounded("list modules", self.store.list_modules(filter)).await {
            Ok(mut rows) => {
                if filter.offset.unwrap_or(0) == 0 {
                    let extra = self.snapshot_only(filter, &rows).await;
                    if !extra.is_empty() {
                        rows.extend(extra);
                        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                        if let Some(limit) = filter.limit {
                            rows.truncate(limit as usize);
                        }
                    }
                }
                Ok(rows)
            }
            Err(e) => {
                warn!(error = %e, "Store listing failed; listing snapshots");
                self.list_snapshots(filter).await
            }
        }
    }

    /// Deletes a module owned by `owner_id`, its snapshot and its asset files.
    pub async fn delete(&self, id: Uuid, owner_id: Uuid) -> PortResult<()> {
        let module = match self.bounded("get module", self.store.get_module(id)).await {
            Ok(module) => Some(module),
            Err(_) => self.storage.read_snapshot(id).await.ok(),
        };
        let Some(module) = module.filter(|m| m.owner_id == owner_id) else {
            return Err(PortError::NotFound(format!("Module {} not found", id)));
        };

        match self.bounded("delete module", self.store.delete_module(id, owner_id)).await {
            Ok(()) | Err(PortError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if let Err(e) = self.storage.remove_snapshot(id).await {
            warn!(module = %id, error = %e, "Could not remove module snapshot");
        }
        for path in self.asset_files(&module).await {
            if let Err(e) = self.storage.remove_asset(&path).await {
                warn!(module = %id, path = %path.display(), error = %e, "Could not remove asset file");
            }
        }
        info!(module = %id, owner = %owner_id, "Module deleted");
        Ok(())
    }

    pub async fn storage_stats(&self, owner_id: Uuid) -> PortResult<StorageStats> {
        let filter = ModuleFilter {
            owner_id: Some(owner_id),
            ..ModuleFilter::default()
        };
        match self.bounded("storage stats", self.store.storage_stats(owner_id)).await {
            Ok(mut stats) => {
                let extra = StorageStats::from_summaries(owner_id, &self.snapshot_only(&filter, &[]).await);
                stats.module_count += extra.module_count;
                stats.total_storage_bytes += extra.total_storage_bytes;
                stats.total_audio_seconds += extra.total_audio_seconds;
                stats.public_modules += extra.public_modules;
                stats.total_views += extra.total_views;
                Ok(stats)
            }
            Err(e) => {
                warn!(owner = %owner_id, error = %e, "Store aggregation failed; using snapshots");
                let rows = self.list_snapshots(&filter).await?;
                Ok(StorageStats::from_summaries(owner_id, &rows))
            }
        }
    }

    async fn list_snapshots(&self, filter: &ModuleFilter) -> PortResult<Vec<ModuleSummary>> {
        let mut modules = self
            .storage
            .read_all_snapshots()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        modules.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.map_or(usize::MAX, |l| l as usize);
        Ok(modules
            .iter()
            .filter(|m| filter.matches(m))
            .skip(offset)
            .take(limit)
            .map(ModuleSummary::from)
            .collect())
    }

    /// Snapshots of modules that were never saved to the store.
    async fn snapshot_only(&self, filter: &ModuleFilter, known: &[ModuleSummary]) -> Vec<ModuleSummary> {
        let modules = match self.storage.read_all_snapshots().await {
            Ok(modules) => modules,
            Err(e) => {
                warn!(error = %e, "Could not read module snapshots");
                return Vec::new();
            }
        };
        modules
            .iter()
            .filter(|m| !m.persistence.saved_to_store && filter.matches(m))
            .filter(|m| known.iter().all(|k| k.id != m.id))
            .map(ModuleSummary::from)
            .collect()
    }

    /// Files owned by the module: its assets plus the frames behind image sequences.
    async fn asset_files(&self, module: &MultimediaModule) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for asset in module.assets() {
            if asset.produced_by == IMAGE_SEQUENCE_PRODUCER {
                match sequence_frames(&asset.path).await {
                    Ok(frames) => paths.extend(frames),
                    Err(e) => warn!(path = %asset.path.display(), error = %e, "Could not read sequence manifest"),
                }
            }
            paths.push(asset.path.clone());
        }
        paths.sort();
        paths.dedup();
        paths
    }

    /// Every store call is bounded by the configured timeout.
    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = PortResult<T>>) -> PortResult<T> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(PortError::Timeout(format!(
                "{} did not finish within {:?}",
                operation, self.store_timeout
            ))),
        }
    }
}
