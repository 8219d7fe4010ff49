//! Pusher HTTP request signing.
//!
//! Signed routes carry `auth_key`, `auth_timestamp`, `auth_version`,
//! `body_md5` (when there is a body) and `auth_signature` in the query
//! string. The verified [`Application`] is stored in the request extensions
//! for handlers to pick up with `Extension<Arc<Application>>`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::{Path, Query, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use tracing::debug;

use beacon_core::error::AppError;
use beacon_realtime::Application;

use crate::error::ApiError;
use crate::state::AppState;

/// Oldest accepted `auth_timestamp`, in seconds either side of now.
pub const MAX_TIMESTAMP_SKEW_SECS: i64 = 600;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Verifies a request on an `/apps/{app_id}/...` route.
pub async fn verify_app_signature(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let app_id = params
        .get("app_id")
        .ok_or_else(|| AppError::not_found("Application id missing from path"))?;
    let app = state.realtime.apps.require(app_id)?;
    verify_and_run(app, request, next).await
}

/// Verifies a request on a route identified only by its `auth_key`.
pub async fn verify_key_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let query = parse_query(&request)?;
    let key = query
        .get("auth_key")
        .ok_or_else(|| AppError::authentication("Missing auth_key"))?;
    let app = state
        .realtime
        .apps
        .get_by_key(key)
        .ok_or_else(|| AppError::authentication("Unknown auth_key"))?;
    verify_and_run(app, request, next).await
}

async fn verify_and_run(
    app: Arc<Application>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let query = parse_query(&request)?;
    let (params, signature) = split_signature(query);
    let signature = signature.ok_or_else(|| AppError::authentication("Missing auth_signature"))?;

    if params.get("auth_key").map(String::as_str) != Some(app.key()) {
        return Err(AppError::authentication("auth_key does not match the application").into());
    }
    check_timestamp(params.get("auth_timestamp").map(String::as_str), Utc::now().timestamp())?;

    let (parts, body) = request.into_parts();
    let bytes = body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::validation(format!("Unreadable request body: {e}")))?;

    if !bytes.is_empty() {
        let expected = format!("{:x}", md5::compute(&bytes));
        match params.get("body_md5") {
            Some(md5) if md5.eq_ignore_ascii_case(&expected) => {}
            _ => return Err(AppError::authentication("body_md5 does not match the body").into()),
        }
    }

    app.signer()
        .verify_request(parts.method.as_str(), parts.uri.path(), &params, &signature)?;
    debug!(app_id = %app.id(), path = %parts.uri.path(), "Signed request verified");

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(app);
    Ok(next.run(request).await)
}

fn parse_query(request: &Request) -> Result<HashMap<String, String>, ApiError> {
    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map(|Query(query)| query)
        .map_err(|e| AppError::authentication(format!("Malformed query string: {e}")).into())
}

/// Lower-cases keys and pulls `auth_signature` out of the signed set.
pub fn split_signature(query: HashMap<String, String>) -> (BTreeMap<String, String>, Option<String>) {
    let mut params: BTreeMap<String, String> = query
        .into_iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .collect();
    let signature = params.remove("auth_signature");
    (params, signature)
}

/// Rejects a missing, malformed, or expired `auth_timestamp`.
pub fn check_timestamp(raw: Option<&str>, now: i64) -> Result<(), AppError> {
    let timestamp: i64 = raw
        .ok_or_else(|| AppError::authentication("Missing auth_timestamp"))?
        .parse()
        .map_err(|_| AppError::authentication("Malformed auth_timestamp"))?;

    if (now - timestamp).abs() > MAX_TIMESTAMP_SKEW_SECS {
        return Err(AppError::authentication(
            "Timestamp expired: ensure the server time is correct",
        ));
    }
    Ok(())
}
