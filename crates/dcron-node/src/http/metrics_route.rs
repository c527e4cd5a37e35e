//! `GET /metrics`: the Prometheus recorder's own text-format rendering.
//! Minimal amount of "export" needed to satisfy the route's contract without
//! building a push-based OpenCensus pipeline.

use crate::http::state::AppState;
use axum::routing::get;
use axum::Router;
use axum::extract::State;

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(render))
}

async fn render(State(state): State<AppState>) -> String {
    state.prometheus().render()
}
