use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error object returned by the API on non-success responses
///
/// Every field is optional on the wire. `message` is always filled in after
/// decoding, falling back to a synthetic description of the status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Errors that can occur when streaming a run from the Assistants API
#[derive(Debug, Error)]
pub enum AssistantsError {
    /// The request could not be sent or the response headers could not be read
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Response headers did not arrive in time
    #[error("No response from API within {0:?}")]
    Timeout(Duration),

    /// The API answered with a non-success status
    #[error("API error (HTTP {status}): {}", .detail.message)]
    Api {
        status: StatusCode,
        detail: ApiErrorDetail,
    },

    /// A record in the event stream could not be decoded
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    /// Transport failure while reading the event stream
    #[error("Stream read error: {0}")]
    Stream(#[source] reqwest::Error),

    /// No bytes arrived on the event stream for too long
    #[error("Stream idle for more than {0:?}")]
    IdleTimeout(Duration),

    /// A line of the event stream was not valid UTF-8
    #[error("UTF-8 decode error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Missing API key
    #[error("Missing API key")]
    MissingApiKey,
}

impl AssistantsError {
    /// True when the failure happened after the event stream was opened
    pub fn is_mid_stream(&self) -> bool {
        matches!(
            self,
            Self::InvalidEventData(_) | Self::Stream(_) | Self::IdleTimeout(_) | Self::Utf8(_)
        )
    }
}

/// Parse an error response from the API
///
/// Picks up whichever of `error.{message,type,param,code}` can be read, so a
/// body with a partially unexpected shape still contributes what it can.
pub(crate) fn parse_error_response(status: StatusCode, bytes: &[u8]) -> AssistantsError {
    let error_object = serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|mut json| json.get_mut("error").map(Value::take));

    let mut detail = error_object
        .as_ref()
        .map(|error| ApiErrorDetail {
            message: scalar_field(error, "message").unwrap_or_default(),
            r#type: scalar_field(error, "type"),
            param: scalar_field(error, "param"),
            code: scalar_field(error, "code"),
        })
        .unwrap_or_default();

    if detail.message.is_empty() {
        let body = String::from_utf8_lossy(bytes);
        let body = body.trim();
        detail.message = if body.is_empty() || error_object.is_some() {
            format!("HTTP status {}", status.as_u16())
        } else {
            format!("HTTP status {}: {}", status.as_u16(), body)
        };
    }

    AssistantsError::Api { status, detail }
}

/// `code` and `param` show up as strings, numbers or null depending on the endpoint
fn scalar_field(object: &Value, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail_of(error: AssistantsError) -> (StatusCode, ApiErrorDetail) {
        match error {
            AssistantsError::Api { status, detail } => (status, detail),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_structured_error() {
        let body = br#"{"error":{"message":"rate limited","type":"rate_limit","param":null,"code":"rate_limit_exceeded"}}"#;
        let (status, detail) = detail_of(parse_error_response(StatusCode::TOO_MANY_REQUESTS, body));

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(detail.message, "rate limited");
        assert_eq!(detail.r#type.as_deref(), Some("rate_limit"));
        assert_eq!(detail.param, None);
        assert_eq!(detail.code.as_deref(), Some("rate_limit_exceeded"));
    }

    #[test]
    fn test_parse_numeric_code() {
        let body = br#"{"error":{"message":"boom","code":500}}"#;
        let (_, detail) = detail_of(parse_error_response(StatusCode::INTERNAL_SERVER_ERROR, body));
        assert_eq!(detail.code.as_deref(), Some("500"));
    }

    #[test]
    fn test_parse_error_without_message_keeps_partial_fields() {
        let body = br#"{"error":{"type":"invalid_request_error"}}"#;
        let (_, detail) = detail_of(parse_error_response(StatusCode::BAD_REQUEST, body));
        assert_eq!(detail.message, "HTTP status 400");
        assert_eq!(detail.r#type.as_deref(), Some("invalid_request_error"));
    }

    #[test]
    fn test_parse_non_json_body() {
        let (status, detail) =
            detail_of(parse_error_response(StatusCode::BAD_GATEWAY, b"upstream connect error"));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(detail.message, "HTTP status 502: upstream connect error");
        assert_eq!(detail.r#type, None);
    }

    #[test]
    fn test_parse_empty_body() {
        let (_, detail) = detail_of(parse_error_response(StatusCode::SERVICE_UNAVAILABLE, b""));
        assert_eq!(detail.message, "HTTP status 503");
    }

    #[test]
    fn test_detail_serialization_skips_missing_fields() {
        let detail = ApiErrorDetail {
            message: "nope".to_string(),
            r#type: Some("server_error".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json, serde_json::json!({"message": "nope", "type": "server_error"}));
    }
}
