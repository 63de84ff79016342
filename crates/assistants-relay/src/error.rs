use assistants_ox::{ApiErrorDetail, AssistantsError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that end a relay call
#[derive(Debug, Error)]
pub enum RelayError {
    /// Required configuration is missing; nothing was sent upstream
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The inbound body does not have the expected shape
    #[error("Invalid request: {0}")]
    RequestShape(String),

    /// The upstream API answered with a non-success status
    #[error("Upstream error (HTTP {status}): {}", .detail.message)]
    Upstream {
        status: StatusCode,
        detail: ApiErrorDetail,
    },

    /// The upstream request could not be sent or timed out waiting for headers
    #[error("Upstream request failed: {0}")]
    Transport(#[source] AssistantsError),

    /// An upstream event could not be decoded
    #[error("Failed to decode upstream event: {0}")]
    StreamDecode(#[source] AssistantsError),

    /// The upstream stream broke off mid-way
    #[error("Failed to read upstream stream: {0}")]
    StreamRead(#[source] AssistantsError),
}

impl From<AssistantsError> for RelayError {
    fn from(error: AssistantsError) -> Self {
        match error {
            AssistantsError::Api { status, detail } => Self::Upstream { status, detail },
            AssistantsError::MissingApiKey => Self::Config(ConfigError::MissingSecrets),
            AssistantsError::Http(_) | AssistantsError::Timeout(_) => Self::Transport(error),
            AssistantsError::InvalidEventData(_) => Self::StreamDecode(error),
            AssistantsError::Stream(_)
            | AssistantsError::IdleTimeout(_)
            | AssistantsError::Utf8(_) => Self::StreamRead(error),
        }
    }
}

/// `{"error": {...}}` body of every failure response
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ApiErrorDetail,
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RequestShape(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => *status,
            Self::Config(_) | Self::Transport(_) | Self::StreamDecode(_) | Self::StreamRead(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Category name carried as `type` by locally raised failures
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::RequestShape(_) => "invalid_request",
            Self::Upstream { .. } => "upstream_error",
            Self::Transport(_) => "transport_error",
            Self::StreamDecode(_) => "stream_decode_error",
            Self::StreamRead(_) => "stream_read_error",
        }
    }

    /// Body of the `{"error": {...}}` envelope: the upstream detail when there
    /// is one, otherwise the message and category of this error
    pub fn detail(&self) -> ApiErrorDetail {
        match self {
            Self::Upstream { detail, .. } => detail.clone(),
            other => ApiErrorDetail {
                message: other.to_string(),
                r#type: Some(other.kind().to_string()),
                ..Default::default()
            },
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let error = self.detail();
        (self.status_code(), Json(ErrorEnvelope { error })).into_response()
    }
}
