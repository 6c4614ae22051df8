use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::ReasoningService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Built once at startup; every pipeline component borrows it from here.
    pub llm: Arc<dyn ReasoningService>,
    pub config: Config,
}
