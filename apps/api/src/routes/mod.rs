pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::ranking::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(health::welcome_handler))
        .route("/health", get(health::health_handler))
        // Job description processing
        .route(
            "/job/extract-criteria",
            post(handlers::handle_extract_criteria),
        )
        // Resume scoring
        .route(
            "/resume/score-resumes",
            post(handlers::handle_score_resumes),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
