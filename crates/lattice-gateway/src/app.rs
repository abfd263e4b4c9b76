use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use lattice_agent::deps::Deps;

/// Central shared state; passed as Arc<AppState> to all handlers.
pub struct AppState {
    pub deps: Deps,
}

impl AppState {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

/// Assemble the full router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/api/v1/session", post(crate::http::sessions::create_session))
        .route(
            "/api/v1/session/{id}/messages",
            post(crate::http::sessions::store_message)
                .get(crate::http::sessions::get_messages),
        )
        .route(
            "/api/v1/session/{id}/flush",
            post(crate::http::sessions::flush_session),
        )
        .route(
            "/api/v1/learning_space",
            post(crate::http::spaces::create_space),
        )
        .route(
            "/api/v1/learning_space/{id}/sessions/{session_id}",
            post(crate::http::spaces::link_session),
        )
        .route(
            "/api/v1/learning_space/{id}/skills",
            get(crate::http::spaces::list_skills),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
