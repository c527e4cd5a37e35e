//! The node's HTTP surface: `axum` + `tower-http`, trimmed to the four
//! routes this node's contract names.

mod error;
mod jobs;
mod metrics_route;
mod router;
mod state;
mod status;

pub use router::create_router;
pub use state::AppState;
