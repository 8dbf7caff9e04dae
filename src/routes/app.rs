use crate::{AppState, dispatch::Dispatcher, models::ActionRequest};
use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tracing::warn;

/// Largest request body buffered for a dispatch (form posts, small JSON payloads).
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Application Router Module
///
/// Mounts the dispatcher at `mount_path`. All routing below that point happens through
/// the `action` and `ftl` query parameters, never through the URL path.
pub fn app_routes(mount_path: &str) -> Router<AppState> {
    Router::new().route(mount_path, get(dispatch_get).post(dispatch_post))
}

/// dispatch_get
///
/// GET entry point: buffers the request and hands it to the dispatcher.
pub async fn dispatch_get(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request,
) -> Response {
    match buffer_request(request).await {
        Ok(request) => dispatcher.dispatch_get(&request).await,
        Err(rejection) => rejection,
    }
}

/// dispatch_post
///
/// POST entry point. Url-encoded form fields become request parameters.
pub async fn dispatch_post(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request,
) -> Response {
    match buffer_request(request).await {
        Ok(request) => dispatcher.dispatch_post(&request).await,
        Err(rejection) => rejection,
    }
}

async fn buffer_request(request: Request) -> Result<ActionRequest, Response> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| {
            warn!(error = %e, "request body rejected");
            StatusCode::PAYLOAD_TOO_LARGE.into_response()
        })?;
    Ok(ActionRequest::from_parts(
        parts.method,
        parts.uri,
        parts.headers,
        body,
    ))
}
