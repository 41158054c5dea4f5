//! services/api/src/bin/api.rs

use api_lib::{
    adapters::db::PgModuleStore,
    config::Config,
    error::ApiError,
    web::{api_router, rest::ApiDoc, state::AppState},
    wiring::{build_media_chains, build_planner, pipeline_settings, provider_throttle},
};
use axum::http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method};
use axum::Router;
use enablement_core::{
    LessonMediaGenerator, MediaStorage, PersistenceGateway, PipelineOrchestrator,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.store_timeout)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgModuleStore::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Output Root & Provider Chains ---
    let storage = Arc::new(MediaStorage::new(config.output_root.clone()));
    storage.ensure_layout().await?;
    let throttle = Arc::new(provider_throttle(&config));
    let chains = build_media_chains(&config, storage.clone(), throttle)?;

    // --- 4. Build the Pipeline and the Shared AppState ---
    let gateway = Arc::new(PersistenceGateway::new(store, storage.clone(), config.store_timeout));
    let pipeline = Arc::new(PipelineOrchestrator::new(
        build_planner(&config),
        LessonMediaGenerator::new(Arc::new(chains)),
        gateway.clone(),
        pipeline_settings(&config),
    ));
    let app_state = Arc::new(AppState { pipeline, gateway });

    // --- 5. Background Cleanup Sweep ---
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(run_cleanup_sweep(
        storage.clone(),
        config.asset_max_age,
        config.cleanup_interval,
        shutdown.clone(),
    ));

    // --- 6. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-user-id")]);

    let app = Router::new()
        .merge(api_router(app_state))
        .nest_service("/media", ServeDir::new(storage.root()))
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!("Cleanup task ended abnormally: {}", e);
    }
    Ok(())
}

/// Periodically deletes generated media older than `max_age`.
async fn run_cleanup_sweep(
    storage: Arc<MediaStorage>,
    max_age: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Cleanup sweep stopped");
                return;
            }
            _ = ticker.tick() => {
                match storage.sweep_older_than(max_age).await {
                    Ok(report) if report.removed_files > 0 => info!(
                        removed = report.removed_files,
                        reclaimed_bytes = report.reclaimed_bytes,
                        "Cleanup sweep removed expired media"
                    ),
                    Ok(_) => {}
                    Err(e) => error!("Cleanup sweep failed: {}", e),
                }
            }
        }
    }
}
