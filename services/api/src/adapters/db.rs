//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `ModuleStore` port from the core crate. It handles all interactions with
//! the PostgreSQL database using `sqlx`.
//!
//! Each module is stored as a JSONB document next to a handful of indexed
//! columns used for catalog filtering and per-owner aggregation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use enablement_core::domain::{Difficulty, MultimediaModule};
use enablement_core::ports::{
    ModuleFilter, ModuleStore, ModuleSummary, PortError, PortResult, StorageStats,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A Postgres-backed `ModuleStore`.
#[derive(Clone)]
pub struct PgModuleStore {
    pool: PgPool,
}

impl PgModuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ModuleRecord {
    id: Uuid,
    view_count: i64,
    document: Json<MultimediaModule>,
}
impl ModuleRecord {
    fn to_domain(self) -> MultimediaModule {
        let mut module = self.document.0;
        module.view_count = self.view_count.max(0) as u64;
        module.persistence.saved_to_store = true;
        module.persistence.store_id = Some(self.id);
        module
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: String,
    difficulty: String,
    category: Option<String>,
    tags: Vec<String>,
    is_public: bool,
    lesson_count: i32,
    storage_bytes: i64,
    audio_duration_seconds: f64,
    view_count: i64,
    created_at: DateTime<Utc>,
}
impl SummaryRecord {
    fn to_domain(self) -> ModuleSummary {
        ModuleSummary {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            description: self.description,
            difficulty: self.difficulty.parse::<Difficulty>().unwrap_or_default(),
            category: self.category,
            tags: self.tags,
            is_public: self.is_public,
            lesson_count: self.lesson_count.max(0) as usize,
            storage_bytes: self.storage_bytes.max(0) as u64,
            audio_duration_seconds: self.audio_duration_seconds,
            view_count: self.view_count.max(0) as u64,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct StatsRecord {
    module_count: i64,
    total_storage_bytes: i64,
    total_audio_seconds: f64,
    public_modules: i64,
    total_views: i64,
}

const SUMMARY_COLUMNS: &str = "SELECT id, owner_id, title, description, difficulty, category, tags, \
     is_public, lesson_count, storage_bytes, audio_duration_seconds, view_count, created_at \
     FROM training_modules";

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `ModuleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ModuleStore for PgModuleStore {
    async fn create_module(&self, module: &MultimediaModule) -> PortResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO training_modules \
             (id, owner_id, title, description, difficulty, category, tags, is_public, \
              lesson_count, storage_bytes, audio_duration_seconds, view_count, document, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document, \
               storage_bytes = EXCLUDED.storage_bytes, \
               audio_duration_seconds = EXCLUDED.audio_duration_seconds \
             RETURNING id",
        )
        .bind(module.id)
        .bind(module.owner_id)
        .bind(&module.plan.title)
        .bind(&module.plan.description)
        .bind(module.plan.difficulty.as_str())
        .bind(&module.category)
        .bind(&module.tags)
        .bind(module.is_public)
        .bind(module.plan.lessons.len() as i32)
        .bind(module.totals.storage_bytes as i64)
        .bind(module.totals.audio_duration_seconds)
        .bind(module.view_count as i64)
        .bind(Json(module))
        .bind(module.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn get_module(&self, id: Uuid) -> PortResult<MultimediaModule> {
        let record = sqlx::query_as::<_, ModuleRecord>(
            "SELECT id, view_count, document FROM training_modules WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Module {} not found", id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_modules(&self, filter: &ModuleFilter) -> PortResult<Vec<ModuleSummary>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(SUMMARY_COLUMNS);
        query.push(" WHERE TRUE");
        if let Some(owner) = filter.owner_id {
            query.push(" AND owner_id = ").push_bind(owner);
        }
        if let Some(category) = &filter.category {
            query.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(difficulty) = filter.difficulty {
            query.push(" AND difficulty = ").push_bind(difficulty.as_str());
        }
        if !filter.tags.is_empty() {
            query.push(" AND tags @> ").push_bind(filter.tags.clone());
        }
        if let Some(is_public) = filter.is_public {
            query.push(" AND is_public = ").push_bind(is_public);
        }
        query.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(i64::from(limit));
        }
        if let Some(offset) = filter.offset {
            query.push(" OFFSET ").push_bind(i64::from(offset));
        }

        let records = query
            .build_query_as::<SummaryRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(SummaryRecord::to_domain).collect())
    }

    async fn delete_module(&self, id: Uuid, owner_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM training_modules WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Module {} not found", id)));
        }
        Ok(())
    }

    async fn increment_view_count(&self, id: Uuid) -> PortResult<u64> {
        let views: i64 = sqlx::query_scalar(
            "UPDATE training_modules SET view_count = view_count + 1 WHERE id = $1 RETURNING view_count",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Module {} not found", id)),
            _ => unexpected(e),
        })?;
        Ok(views.max(0) as u64)
    }

    async fn storage_stats(&self, owner_id: Uuid) -> PortResult<StorageStats> {
        let record = sqlx::query_as::<_, StatsRecord>(
            "SELECT COUNT(*) AS module_count, \
                    COALESCE(SUM(storage_bytes), 0)::BIGINT AS total_storage_bytes, \
                    COALESCE(SUM(audio_duration_seconds), 0)::DOUBLE PRECISION AS total_audio_seconds, \
                    COUNT(*) FILTER (WHERE is_public) AS public_modules, \
                    COALESCE(SUM(view_count), 0)::BIGINT AS total_views \
             FROM training_modules WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(StorageStats {
            owner_id,
            module_count: record.module_count.max(0) as u64,
            total_storage_bytes: record.total_storage_bytes.max(0) as u64,
            total_audio_seconds: record.total_audio_seconds,
            public_modules: record.public_modules.max(0) as u64,
            total_views: record.total_views.max(0) as u64,
        })
    }
}
