//! Per-request error responses.
//!
//! Request errors never escape a handler: each variant maps to a status
//! code and body here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong shared secret.
    #[error("authentication failure")]
    AuthenticationFailure,

    /// Body is not the JSON document the endpoint expects.
    #[error("malformed request body: {0}")]
    MalformedRequestBody(String),

    /// A collaborator failed while serving the request.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationFailure => StatusCode::FORBIDDEN,
            ApiError::MalformedRequestBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            // Plain text, no detail about what was wrong.
            ApiError::AuthenticationFailure => (status, "Forbidden").into_response(),
            ApiError::MalformedRequestBody(detail) => (
                status,
                Json(json!({ "error": "malformed_request_body", "detail": detail })),
            )
                .into_response(),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                (status, Json(json!({ "error": "internal" }))).into_response()
            }
        }
    }
}
