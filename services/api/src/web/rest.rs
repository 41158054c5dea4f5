//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI document.

use crate::web::middleware::{user_id_from_headers, UserId};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use enablement_core::domain::{Difficulty, GenerationSummary};
use enablement_core::ports::{ModuleFilter, ModuleSummary, PortError, StorageStats};
use enablement_core::{
    GenerationOptions, GenerationRequest, MultimediaModule, PipelineError, SaveOptions,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_module_handler,
        list_modules_handler,
        storage_stats_handler,
        get_module_handler,
        delete_module_handler,
        health_handler,
    ),
    components(
        schemas(GenerateModuleBody, GenerateModuleResponse, HealthResponse)
    ),
    tags(
        (name = "Enablement Module API", description = "Generate and browse multimedia sales-training modules.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Request body for generating a module.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateModuleBody {
    /// Free-form domain knowledge to turn into lessons.
    pub domain_knowledge: String,
    /// Owner of the module. Falls back to the `x-user-id` header.
    #[serde(default, alias = "ownerId")]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub options: GenerationOptions,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub save_options: SaveOptions,
}

/// The assembled module and a summary of what was generated.
#[derive(Serialize, ToSchema)]
pub struct GenerateModuleResponse {
    #[schema(value_type = Object)]
    module: MultimediaModule,
    #[schema(value_type = Object)]
    summary: GenerationSummary,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListModulesQuery {
    category: Option<String>,
    difficulty: Option<String>,
    /// Comma-separated; modules must carry every tag.
    tag: Option<String>,
    is_public: Option<bool>,
    /// Only the caller's modules; requires `x-user-id`.
    mine: Option<bool>,
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    text_model: String,
    /// Configured provider ids per media kind, in priority order.
    providers: BTreeMap<String, Vec<String>>,
}

fn port_error_response(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Timeout(message) => {
            error!("{} timed out: {}", context, message);
            (StatusCode::GATEWAY_TIMEOUT, format!("{} timed out", context))
        }
        PortError::Unexpected(message) => {
            error!("{} failed: {}", context, message);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{} failed", context))
        }
    }
}

impl ListModulesQuery {
    fn into_filter(self, headers: &HeaderMap) -> Result<ModuleFilter, (StatusCode, String)> {
        let owner_id = match self.mine {
            Some(true) => Some(user_id_from_headers(headers)?),
            _ => None,
        };
        let difficulty = self
            .difficulty
            .as_deref()
            .map(|d| d.parse::<Difficulty>())
            .transpose()
            .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
        let tags = self
            .tag
            .map(|t| {
                t.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(ModuleFilter {
            owner_id,
            category: self.category,
            difficulty,
            tags,
            is_public: self.is_public,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate a multimedia training module from domain knowledge.
///
/// Media that cannot be generated is replaced by degraded content or
/// placeholders; the call only fails when the input is empty.
#[utoipa::path(
    post,
    path = "/modules/generate",
    request_body = GenerateModuleBody,
    responses(
        (status = 201, description = "Module generated", body = GenerateModuleResponse),
        (status = 400, description = "Empty domain knowledge or missing user id"),
        (status = 422, description = "No usable lesson plan could be produced")
    ),
    params(
        ("x-user-id" = Option<Uuid>, Header, description = "Owner, when not given in the body.")
    )
)]
pub async fn generate_module_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<GenerateModuleBody>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let owner_id = match body.user_id {
        Some(id) => id,
        None => user_id_from_headers(&headers)?,
    };

    let request = GenerationRequest {
        domain_knowledge: body.domain_knowledge,
        owner_id,
        options: body.options,
        save_options: body.save_options,
    };

    match app_state.pipeline.run(request).await {
        Ok(report) => {
            info!(module = %report.module.id, "Module generated via REST");
            let response = GenerateModuleResponse {
                module: report.module,
                summary: report.summary,
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(PipelineError::EmptyInput) => Err((
            StatusCode::BAD_REQUEST,
            "domainKnowledge must not be empty".to_string(),
        )),
        Err(e @ PipelineError::NoUsablePlan(_)) => {
            error!("Failed to generate module: {}", e);
            Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
    }
}

/// List modules, newest first.
#[utoipa::path(
    get,
    path = "/modules",
    params(
        ListModulesQuery,
        ("x-user-id" = Option<Uuid>, Header, description = "Required when `mine=true`.")
    ),
    responses(
        (status = 200, description = "Matching module summaries"),
        (status = 400, description = "Invalid filter or missing user id")
    )
)]
pub async fn list_modules_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListModulesQuery>,
) -> Result<Json<Vec<ModuleSummary>>, (StatusCode, String)> {
    let filter = query.into_filter(&headers)?;
    app_state
        .gateway
        .list(&filter)
        .await
        .map(Json)
        .map_err(|e| port_error_response("Listing modules", e))
}

/// Storage statistics for the calling user.
#[utoipa::path(
    get,
    path = "/modules/stats",
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 200, description = "Per-user storage statistics"),
        (status = 400, description = "Missing or invalid user id")
    )
)]
pub async fn storage_stats_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(owner_id)): Extension<UserId>,
) -> Result<Json<StorageStats>, (StatusCode, String)> {
    app_state
        .gateway
        .storage_stats(owner_id)
        .await
        .map(Json)
        .map_err(|e| port_error_response("Computing storage stats", e))
}

/// Fetch one module. Each fetch counts as a view.
#[utoipa::path(
    get,
    path = "/modules/{id}",
    params(
        ("id" = Uuid, Path, description = "Module id")
    ),
    responses(
        (status = 200, description = "The module"),
        (status = 404, description = "No such module")
    )
)]
pub async fn get_module_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MultimediaModule>, (StatusCode, String)> {
    app_state
        .gateway
        .get(id)
        .await
        .map(Json)
        .map_err(|e| port_error_response("Fetching module", e))
}

/// Delete one of the caller's modules, with its media files.
#[utoipa::path(
    delete,
    path = "/modules/{id}",
    params(
        ("id" = Uuid, Path, description = "Module id"),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the owner.")
    ),
    responses(
        (status = 204, description = "Module deleted"),
        (status = 404, description = "No such module for this owner")
    )
)]
pub async fn delete_module_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(owner_id)): Extension<UserId>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    app_state
        .gateway
        .delete(id, owner_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|e| port_error_response("Deleting module", e))
}

/// Liveness plus the configured provider chains.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let providers = app_state
        .pipeline
        .provider_overview()
        .into_iter()
        .map(|(kind, ids)| (kind.to_string(), ids))
        .collect();
    Json(HealthResponse {
        status: "ok".to_string(),
        text_model: app_state.pipeline.text_model().to_string(),
        providers,
    })
}
