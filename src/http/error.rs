//! HTTP responses for [`GateError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::GateError;

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GateError::SendRateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Verification code sent too frequently, please try again later".to_string(),
            ),
            GateError::CheckRateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many verification attempts, please request a new code later".to_string(),
            ),
            GateError::InvalidRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            _ => {
                // Log the real error server-side, return generic message to client
                tracing::error!(error = %self, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };

        (status, axum::Json(body)).into_response()
    }
}
