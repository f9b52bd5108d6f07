use crate::state::WebhookState;

use std::sync::atomic::Ordering;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{Router, get, post};
use tfo_admission::Outcome;
use tracing::{error, warn};

const JSON_CONTENT_TYPE: &str = "application/json";
const LIVEZ_PATH: &str = "/livez";
const READYZ_PATH: &str = "/readyz";

pub const HEALTH_PATHS: [&str; 2] = [LIVEZ_PATH, READYZ_PATH];

/// An UPDATE review carries both `object` and `oldObject`, each up to the 1.5 MiB etcd
/// object limit.
const MAX_REVIEW_BYTES: usize = 8 * 1024 * 1024;

pub fn router(state: WebhookState, webhook_path: &str) -> Router {
    Router::new()
        .route(LIVEZ_PATH, get(livez))
        .route(READYZ_PATH, get(readyz))
        .route(
            webhook_path,
            post(mutate_terraform).layer(DefaultBodyLimit::max(MAX_REVIEW_BYTES)),
        )
        .with_state(state)
}

async fn livez() -> &'static str {
    "healthy"
}

async fn readyz(State(state): State<WebhookState>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Mutating admission endpoint for Terraform resources.
///
/// Requests that are not `application/json`, or that target another resource, get an empty
/// body back.
pub async fn mutate_terraform(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if content_type != JSON_CONTENT_TYPE {
        warn!("contentType={content_type}, expect {JSON_CONTENT_TYPE}");
        return StatusCode::OK.into_response();
    }

    match state.controller.review(&body) {
        Ok(Outcome::Respond(review)) => {
            ([(CONTENT_TYPE, JSON_CONTENT_TYPE)], review).into_response()
        }
        Ok(Outcome::Skipped) => StatusCode::OK.into_response(),
        Err(err) if err.is_client_error() => {
            let message = format!("Request could not be decoded: {err}");
            error!("{message}");
            (StatusCode::BAD_REQUEST, message).into_response()
        }
        Err(err) => {
            error!("{err}");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
