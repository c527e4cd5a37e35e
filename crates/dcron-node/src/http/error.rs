//! Maps [`DcronError`] onto HTTP status codes: 400 on descriptor parse
//! failure, 503 when a log write fails or times out, 500 on internal
//! marshalling errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dcron_core::DcronError;

pub struct ApiError(pub DcronError);

impl From<DcronError> for ApiError {
    fn from(err: DcronError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_invalid_input() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_transient() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, self.0.to_string()).into_response()
    }
}
