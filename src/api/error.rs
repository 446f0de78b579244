//! API error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::jwt::AuthError;
use crate::turn::{Stage, TurnFailure};

/// Errors returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotConfigured(&'static str),
    KeysUnavailable(String),
    UpstreamUnavailable(Stage, String),
    GenerationFailed,
    Internal(String),
}

impl From<TurnFailure> for ApiError {
    fn from(failure: TurnFailure) -> Self {
        match failure {
            TurnFailure::InputError(msg) => Self::BadRequest(msg.to_string()),
            TurnFailure::UpstreamUnavailable { stage, reason } => {
                Self::UpstreamUnavailable(stage, reason)
            }
            TurnFailure::GenerationFailed => Self::GenerationFailed,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::KeysUnavailable(msg) => Self::KeysUnavailable(msg),
            AuthError::NotConfigured => Self::NotConfigured("authentication is not configured"),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::Auth(msg) => Self::Unauthorized(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::NotConfigured(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "not_configured", msg.to_string())
            }
            Self::KeysUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "keys_unavailable",
                format!("could not fetch verification keys: {msg}"),
            ),
            Self::UpstreamUnavailable(stage, reason) => {
                tracing::error!(%stage, reason = %reason, "upstream unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_unavailable",
                    format!("{stage} service is unavailable"),
                )
            }
            Self::GenerationFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "generation_failed",
                "AI failed to generate a response".to_string(),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "an internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
