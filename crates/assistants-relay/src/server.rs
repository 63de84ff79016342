use std::{convert::Infallible, sync::Arc, time::Duration};

use async_stream::stream;
use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, Method, header},
    response::{IntoResponse, Response},
    routing::post,
};
use futures_util::StreamExt;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::{
    config::{ConfigError, RelayConfig},
    error::RelayError,
    event::{StreamFormat, error_chunk},
    relay::{Relay, RelayRequest, RelayStream},
};

const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Clone)]
struct AppState {
    relay: Arc<Relay>,
    format: StreamFormat,
}

/// Router serving the relay endpoint behind the CORS policy
pub fn router(config: &RelayConfig) -> Result<Router, ConfigError> {
    let state = AppState {
        relay: Arc::new(Relay::new(config)?),
        format: config.stream_format,
    };

    Ok(Router::new()
        .route(&config.route, post(relay_message))
        .layer(cors_layer(&config.allowed_origins)?)
        .with_state(state))
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, ConfigError> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| ConfigError::InvalidOrigin(origin.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE))
}

async fn relay_message(
    State(state): State<AppState>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(%rejection, "rejecting malformed relay request");
        RelayError::RequestShape(rejection.body_text())
    })?;

    info!(
        messages = request.messages.len(),
        resumes_thread = request.resumes_thread(),
        "relaying conversation turn"
    );

    let events = state.relay.open(request).await.inspect_err(|err| {
        warn!(%err, status = err.status_code().as_u16(), "relay call failed before streaming");
    })?;

    Ok(stream_response(events, state.format))
}

/// Each client event becomes one body chunk, written as soon as it is decoded
fn stream_response(mut events: RelayStream, format: StreamFormat) -> Response {
    let body = stream! {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => yield Ok::<_, Infallible>(event.encode(format)),
                Err(err) => {
                    error!(%err, kind = err.kind(), "relay call failed mid-stream");
                    yield Ok(error_chunk(&err, format));
                    break;
                }
            }
        }
    };

    (
        [
            (header::CONTENT_TYPE, format.content_type()),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}
