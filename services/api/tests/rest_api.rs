//! Drives the REST router in-process with an in-memory store.

use api_lib::web::{api_router, state::AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use enablement_core::ports::{
    LessonPlanService, ModuleFilter, ModuleStore, ModuleSummary, PortError, PortResult,
    StorageStats,
};
use enablement_core::{
    FallbackChain, GenerationOptions, LessonMediaGenerator, MediaChains, MediaKind, MediaStorage,
    MultimediaModule, PersistenceGateway, PipelineOrchestrator, PipelineSettings,
    ProviderThrottle,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

//=========================================================================================
// Fakes
//=========================================================================================

struct CannedPlanner;

#[async_trait]
impl LessonPlanService for CannedPlanner {
    fn model_id(&self) -> &str {
        "canned"
    }

    async fn generate_lesson_plan(&self, _text: &str, _options: &GenerationOptions) -> PortResult<String> {
        Ok(json!({
            "title": "Objection Handling",
            "description": "Turning pushback into progress.",
            "difficulty": "beginner",
            "objectives": ["Acknowledge concerns"],
            "keyTakeaways": ["Pause before answering"],
            "lessons": [
                {"title": "Listen", "content": "Let the buyer finish.", "type": "theory"},
                {"title": "Reframe", "content": "Restate the concern as a question.", "type": "practical"}
            ]
        })
        .to_string())
    }
}

#[derive(Default)]
struct MemoryStore {
    modules: Mutex<HashMap<Uuid, MultimediaModule>>,
}

#[async_trait]
impl ModuleStore for MemoryStore {
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
            .ok_or_else(|| PortError::NotFound(format!("Module {} not found", id)))
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
        match modules.get(&id) {
            Some(m) if m.owner_id == owner_id => {
                modules.remove(&id);
                Ok(())
            }
            _ => Err(PortError::NotFound(id.to_string())),
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

//=========================================================================================
// Harness
//=========================================================================================

/// A router whose media chains have no providers, so every asset is a placeholder.
fn app(dir: &TempDir) -> Router {
    let storage = Arc::new(MediaStorage::new(dir.path()));
    let throttle = Arc::new(ProviderThrottle::unlimited());
    let chains = MediaChains {
        image: FallbackChain::new(MediaKind::Image, storage.clone(), throttle.clone()),
        audio: FallbackChain::new(MediaKind::Audio, storage.clone(), throttle.clone()),
        video: FallbackChain::new(MediaKind::Video, storage.clone(), throttle),
    };
    let gateway = Arc::new(PersistenceGateway::new(
        Arc::new(MemoryStore::default()),
        storage,
        Duration::from_secs(1),
    ));
    let pipeline = Arc::new(PipelineOrchestrator::new(
        Arc::new(CannedPlanner),
        LessonMediaGenerator::new(Arc::new(chains)),
        gateway.clone(),
        PipelineSettings {
            text_timeout: Duration::from_secs(1),
            lesson_delay: Duration::ZERO,
            lesson_concurrency: 1,
        },
    ));
    api_router(Arc::new(AppState { pipeline, gateway }))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn generate_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/modules/generate")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn generate(app: &Router, owner: Uuid) -> Value {
    let (status, body) = send(
        app,
        generate_request(json!({
            "domainKnowledge": "Objections are requests for information.",
            "userId": owner,
            "options": {"includeImages": false, "includeAudio": false, "includeVideos": false},
            "saveOptions": {"category": "sales", "tags": ["objections"], "isPublic": true}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn test_generate_returns_module_and_summary() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let body = generate(&app, Uuid::new_v4()).await;

    assert_eq!(body["module"]["title"], "Objection Handling");
    assert_eq!(body["module"]["lessons"].as_array().unwrap().len(), 2);
    assert_eq!(body["module"]["lessonMedia"].as_array().unwrap().len(), 2);
    assert_eq!(body["module"]["category"], "sales");
    assert_eq!(body["summary"]["lessonCount"], 2);
    assert_eq!(body["summary"]["planSource"], "generated");
}

#[tokio::test]
async fn test_generate_with_unconfigured_media_yields_placeholders() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = send(
        &app,
        generate_request(json!({
            "domainKnowledge": "Objections are requests for information.",
            "userId": Uuid::new_v4()
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let first = &body["module"]["lessonMedia"][0];
    assert_eq!(first["image"]["producedBy"], "placeholder");
    assert_eq!(first["image"]["placeholder"]["reason"], "notConfigured");
    assert_eq!(body["summary"]["fullyGenerated"], false);
}

#[tokio::test]
async fn test_generate_rejects_empty_input_and_missing_owner() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, _) = send(
        &app,
        generate_request(json!({"domainKnowledge": "   ", "userId": Uuid::new_v4()})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, generate_request(json!({"domainKnowledge": "Some text."}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_counts_views_and_404s_unknown_ids() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let id = generate(&app, Uuid::new_v4()).await["module"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    for expected in 1..=2 {
        let (status, body) = send(
            &app,
            Request::get(format!("/modules/{}", id)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["viewCount"], expected);
    }

    let (status, _) = send(
        &app,
        Request::get(format!("/modules/{}", Uuid::new_v4())).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_filters_and_mine_requires_user() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let owner = Uuid::new_v4();
    generate(&app, owner).await;
    generate(&app, Uuid::new_v4()).await;

    let (status, body) = send(
        &app,
        Request::get("/modules?mine=true")
            .header("x-user-id", owner.to_string())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(
        &app,
        Request::get("/modules?tag=objections&isPublic=true&difficulty=beginner")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = send(&app, Request::get("/modules?mine=true").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Request::get("/modules?difficulty=impossible").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_is_owner_scoped() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let owner = Uuid::new_v4();
    let id = generate(&app, owner).await["module"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let delete = |user: Option<Uuid>| {
        let mut builder = Request::delete(format!("/modules/{}", id));
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        builder.body(Body::empty()).unwrap()
    };

    assert_eq!(send(&app, delete(None)).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, delete(Some(Uuid::new_v4()))).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, delete(Some(owner))).await.0, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, delete(Some(owner))).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_are_per_user() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let owner = Uuid::new_v4();
    generate(&app, owner).await;
    generate(&app, owner).await;
    generate(&app, Uuid::new_v4()).await;

    let (status, body) = send(
        &app,
        Request::get("/modules/stats")
            .header("x-user-id", owner.to_string())
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moduleCount"], 2);
    assert_eq!(body["publicModules"], 2);

    let (status, _) = send(&app, Request::get("/modules/stats").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_lists_provider_chains() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["textModel"], "canned");
    for kind in ["image", "audio", "video"] {
        assert_eq!(body["providers"][kind], json!([]));
    }
}
