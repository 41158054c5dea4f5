//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use enablement_core::{PersistenceGateway, PipelineOrchestrator};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineOrchestrator>,
    pub gateway: Arc<PersistenceGateway>,
}
