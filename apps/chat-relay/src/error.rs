use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::gateway::connection::SendFailure;
use crate::gateway::hub::HubError;

/// Structured API error returned to clients.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: "FORBIDDEN".to_string(),
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "SERVICE_UNAVAILABLE".to_string(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Failures a chat connection can run into, from admission to teardown.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("websocket origin rejected")]
    OriginRejected,
    #[error("delivery to {connection_id} failed: {reason}")]
    RecipientSendFailed {
        connection_id: String,
        reason: SendFailure,
    },
    #[error(transparent)]
    Hub(#[from] HubError),
    #[error("websocket transport error: {0}")]
    Transport(#[from] axum::Error),
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::OriginRejected => Self::forbidden("Origin not allowed"),
            RelayError::Hub(HubError::Closed) => {
                Self::service_unavailable("Chat room is shutting down")
            }
            other => {
                tracing::error!(error = %other, "relay error");
                Self::internal("An internal error occurred")
            }
        }
    }
}

/// Configuration problems detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("allowed origin {0:?} is not of the form host:port")]
    InvalidOrigin(String),
}
