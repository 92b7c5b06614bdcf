use crate::core::error::panic_message;
use crate::core::{CalculationError, ValidationError};
use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::any::Any;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Calculation(#[from] CalculationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MethodNotAllowed(_) => {
                let mut response = (
                    StatusCode::METHOD_NOT_ALLOWED,
                    Json(json!({ "error": self.to_string() })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static("POST"));
                response
            }
            ApiError::Validation(e) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
            }
            ApiError::Calculation(e) => {
                let debug = e.trace().join("\n");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string(), "debug": debug })),
                )
                    .into_response()
            }
        }
    }
}

/// Turns a handler panic into the same JSON error shape as other failures.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic_message(&*panic);
    error!(%detail, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error", "debug": detail })),
    )
        .into_response()
}
