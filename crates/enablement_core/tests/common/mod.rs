//! Shared fakes for the core integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use enablement_core::ports::{
    FailureKind, LessonPlanService, MediaProvider, MediaRequest, ModuleFilter, ModuleStore,
    ModuleSummary, PortError, PortResult, ProviderFailure, ProviderOutput, ProviderResult,
    StorageStats,
};
use enablement_core::{
    FallbackChain, GenerationOptions, ImageSequenceStrategy, MediaKind, MediaStorage,
    MultimediaModule, ProviderThrottle,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Scripted Provider
//=========================================================================================

/// A provider that replays a script of outcomes, then repeats `fallback`.
pub struct ScriptedProvider {
    id: String,
    kind: MediaKind,
    script: Mutex<VecDeque<Result<(), FailureKind>>>,
    fallback: Result<(), FailureKind>,
    delay: Duration,
    timeout: Duration,
    pub requests: Mutex<Vec<MediaRequest>>,
}

impl ScriptedProvider {
    pub fn succeeding(id: &str, kind: MediaKind) -> Arc<Self> {
        Arc::new(Self::build(id, kind, Vec::new(), Ok(())))
    }

    pub fn failing(id: &str, kind: MediaKind, failure: FailureKind) -> Arc<Self> {
        Arc::new(Self::build(id, kind, Vec::new(), Err(failure)))
    }

    pub fn scripted(id: &str, kind: MediaKind, script: Vec<Result<(), FailureKind>>) -> Arc<Self> {
        Arc::new(Self::build(id, kind, script, Ok(())))
    }

    /// Takes `delay` to answer but only allows `timeout`.
    pub fn slow(id: &str, kind: MediaKind, delay: Duration, timeout: Duration) -> Arc<Self> {
        let mut provider = Self::build(id, kind, Vec::new(), Ok(()));
        provider.delay = delay;
        provider.timeout = timeout;
        Arc::new(provider)
    }

    fn build(
        id: &str,
        kind: MediaKind,
        script: Vec<Result<(), FailureKind>>,
        fallback: Result<(), FailureKind>,
    ) -> Self {
        Self {
            id: id.to_string(),
            kind,
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<MediaRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MediaProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn invoke(&self, request: &MediaRequest) -> ProviderResult<ProviderOutput> {
        self.requests.lock().unwrap().push(request.clone());
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match outcome {
            Ok(()) => {
                let extension = match self.kind {
                    MediaKind::Image => "png",
                    MediaKind::Audio => "mp3",
                    MediaKind::Video => "mp4",
                };
                Ok(ProviderOutput::new(format!("{}:{}", self.id, request.subject).into_bytes(), extension))
            }
            Err(kind) => {
                let failure = ProviderFailure::new(kind, format!("scripted {}", kind));
                Err(match kind {
                    FailureKind::ServiceLoading => failure.with_estimated_wait(Some(20.0)),
                    _ => failure,
                })
            }
        }
    }
}

//=========================================================================================
// Chains
//=========================================================================================

pub fn storage(root: &std::path::Path) -> Arc<MediaStorage> {
    Arc::new(MediaStorage::new(root))
}

pub fn chain(
    kind: MediaKind,
    providers: Vec<Arc<ScriptedProvider>>,
    storage: &Arc<MediaStorage>,
) -> FallbackChain {
    providers.into_iter().fold(
        FallbackChain::new(kind, storage.clone(), Arc::new(ProviderThrottle::unlimited())),
        |chain, p| chain.with_provider(p),
    )
}

pub fn image_sequence(
    image_providers: Vec<Arc<ScriptedProvider>>,
    storage: &Arc<MediaStorage>,
) -> Arc<ImageSequenceStrategy> {
    Arc::new(ImageSequenceStrategy::new(
        image_providers
            .into_iter()
            .map(|p| p as Arc<dyn MediaProvider>)
            .collect(),
        storage.clone(),
        Arc::new(ProviderThrottle::unlimited()),
    ))
}

//=========================================================================================
// Text Generation
//=========================================================================================

pub struct FakePlanner {
    pub response: Result<String, String>,
}

impl FakePlanner {
    pub fn returning(raw: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(raw.to_string()),
        })
    }

    pub fn erroring(message: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Err(message.to_string()),
        })
    }
}

#[async_trait]
impl LessonPlanService for FakePlanner {
    fn model_id(&self) -> &str {
        "fake-text-model"
    }

    async fn generate_lesson_plan(
        &self,
        _domain_text: &str,
        _options: &GenerationOptions,
    ) -> PortResult<String> {
        self.response.clone().map_err(PortError::Unexpected)
    }
}

/// A well-formed plan with `n` lessons titled "Lesson One", "Lesson Two", ...
pub fn plan_json(n: usize) -> String {
    const NAMES: [&str; 6] = ["One", "Two", "Three", "Four", "Five", "Six"];
    let lessons: Vec<serde_json::Value> = (0..n)
        .map(|i| {
            serde_json::json!({
                "title": format!("Lesson {}", NAMES[i % NAMES.len()]),
                "content": format!("Content for lesson {}. Ask open questions.", i + 1),
                "type": if i % 2 == 0 { "theory" } else { "practical" },
                "durationHint": "5 min"
            })
        })
        .collect();
    serde_json::json!({
        "title": "Consultative Selling",
        "description": "Selling by solving problems.",
        "lessons": lessons,
        "objectives": ["Run discovery", "Handle objections"],
        "keyTakeaways": ["Listen more than you talk"],
        "difficulty": "intermediate"
    })
    .to_string()
}

//=========================================================================================
// Document Stores
//=========================================================================================

#[derive(Default)]
pub struct MemoryModuleStore {
    pub modules: Mutex<HashMap<Uuid, MultimediaModule>>,
}

#[async_trait]
impl ModuleStore for MemoryModuleStore {
    async fn create_module(&self, module: &MultimediaModule) -> PortResult<Uuid> {
        self.modules.lock().unwrap().insert(module.id, module.clone());
        Ok(module.id)
    }

    async fn get_module(&self, id: Uuid) -> PortResult<MultimediaModule> {
        self.modules
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(id.to_string()))
    }

    async fn list_modules(&self, filter: &ModuleFilter) -> PortResult<Vec<ModuleSummary>> {
        Ok(self
            .modules
            .lock()
            .unwrap()
            .values()
            .filter(|m| filter.matches(m))
            .map(ModuleSummary::from)
            .collect())
    }

    async fn delete_module(&self, id: Uuid, owner_id: Uuid) -> PortResult<()> {
        let mut modules = self.modules.lock().unwrap();
        let owned = modules.get(&id).map_or(false, |m| m.owner_id == owner_id);
        if owned {
            modules.remove(&id);
            Ok(())
        } else {
            Err(PortError::NotFound(id.to_string()))
        }
    }

    async fn increment_view_count(&self, id: Uuid) -> PortResult<u64> {
        let mut modules = self.modules.lock().unwrap();
        let module = modules
            .get_mut(&id)
            .ok_or_else(|| PortError::NotFound(id.to_string()))?;
        module.view_count += 1;
        Ok(module.view_count)
    }

    async fn storage_stats(&self, owner_id: Uuid) -> PortResult<StorageStats> {
        let rows: Vec<ModuleSummary> = self
            .modules
            .lock()
            .unwrap()
            .values()
            .map(ModuleSummary::from)
            .collect();
        Ok(StorageStats::from_summaries(owner_id, &rows))
    }
}

/// A store whose every operation fails, as if the database were down.
pub struct UnavailableStore;

#[async_trait]
impl ModuleStore for UnavailableStore {
    async fn create_module(&self, _module: &MultimediaModule) -> PortResult<Uuid> {
        Err(PortError::Unexpected("connection refused".into()))
    }

    async fn get_module(&self, _id: Uuid) -> PortResult<MultimediaModule> {
        Err(PortError::Unexpected("connection refused".into()))
    }

    async fn list_modules(&self, _filter: &ModuleFilter) -> PortResult<Vec<ModuleSummary>> {
        Err(PortError::Unexpected("connection refused".into()))
    }

    async fn delete_module(&self, _id: Uuid, _owner_id: Uuid) -> PortResult<()> {
        Err(PortError::Unexpected("connection refused".into()))
    }

    async fn increment_view_count(&self, _id: Uuid) -> PortResult<u64> {
        Err(PortError::Unexpected("connection refused".into()))
    }

    async fn storage_stats(&self, _owner_id: Uuid) -> PortResult<StorageStats> {
        Err(PortError::Unexpected("connection refused".into()))
    }
}
