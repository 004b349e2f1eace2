//! Router assembly: API endpoints, solve endpoints, WebSocket upgrade,
//! static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - API endpoints (`.php`-suffixed aliases kept for legacy clients)
/// - Solve endpoints used by the capture surface
/// - Solver WebSocket at `/ws/solver`
/// - Static assets from `./static`
/// - CORS (allow any origin/method/headers) and per-request HTTP tracing
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/createTask", post(http::create_task))
        .route("/createTask/index.php", post(http::create_task))
        .route("/getTaskResult", post(http::get_task_result))
        .route("/getTaskResult/index.php", post(http::get_task_result))
        .route("/solve/:task_id", get(http::solve_view))
        .route("/solve/:task_id/submit", post(http::solve_submit))
        .route("/ws/solver", get(ws::ws_upgrade))
        // The dashboard stays off; the root deliberately answers 404.
        .route("/", get(|| async { StatusCode::NOT_FOUND }))
        .nest_service("/static", ServeDir::new("./static"))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
