use std::sync::OnceLock;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Postgres unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

static EXPOSE_DETAIL: OnceLock<bool> = OnceLock::new();

/// Whether 500 responses carry the underlying error detail. Set once at
/// startup from configuration; defaults to hiding detail.
pub(crate) fn set_expose_detail(enabled: bool) {
    let _ = EXPOSE_DETAIL.set(enabled);
}

fn expose_detail() -> bool {
    *EXPOSE_DETAIL.get().unwrap_or(&false)
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal { context: String, detail: String },
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal { context: context.to_string(), detail: err.to_string() }
    }

    /// Map a unique-constraint violation to `Conflict`; anything else is an
    /// internal error.
    pub(crate) fn conflict_on_duplicate(
        err: sqlx::Error,
        conflict_message: &str,
        context: &str,
    ) -> Self {
        let is_duplicate = err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map(|code| code == UNIQUE_VIOLATION)
            .unwrap_or(false);

        if is_duplicate {
            Self::Conflict(conflict_message.to_string())
        } else {
            Self::internal(err, context)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, error) = match self {
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, message.to_string(), None)
            }
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message.to_string(), None),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message, None),
            ApiError::Internal { context, detail } => {
                let error = if expose_detail() { Some(detail) } else { None };
                (StatusCode::INTERNAL_SERVER_ERROR, context, error)
            }
        };

        let mut response =
            (status, Json(ErrorEnvelope { success: false, message, error })).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}
