//! Main application router: status, metrics, and job installation, with no
//! auth middleware or OpenAPI/Swagger surface — this API is unauthenticated
//! by design.

use crate::http::state::AppState;
use crate::http::{jobs, metrics_route, status};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .merge(status::router())
        .merge(metrics_route::router())
        .merge(jobs::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
