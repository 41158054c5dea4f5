pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_user;
pub use rest::{
    delete_module_handler, generate_module_handler, get_module_handler, health_handler,
    list_modules_handler, storage_stats_handler,
};

use axum::{
    extract::DefaultBodyLimit,
    handler::Handler,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;

/// The REST routes, without CORS, static files or docs.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/modules", get(list_modules_handler))
        .route("/modules/generate", post(generate_module_handler))
        .route(
            "/modules/stats",
            get(storage_stats_handler).route_layer(axum_middleware::from_fn(require_user)),
        )
        .route(
            "/modules/{id}",
            get(get_module_handler)
                .delete(delete_module_handler.layer(axum_middleware::from_fn(require_user))),
        )
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .with_state(app_state)
}
