//! `GET /status`: a liveness/identity snapshot, no authentication.

use crate::http::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(status))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    running: bool,
    name: String,
    server: String,
    client: u16,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.is_running(),
        name: state.name().to_string(),
        server: state.server_url().to_string(),
        client: state.client_port(),
    })
}
