use crate::{
    AppState,
    config::AppConfig,
    static_files::{StaticResources, resource_from_path},
};
use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use std::sync::Arc;

/// Resource Router Module
///
/// Serves `/favicon.ico` and everything under `static_prefix` from the static
/// directories. Only the last path segment names the resource.
pub fn resource_routes(static_prefix: &str) -> Router<AppState> {
    let prefix = static_prefix.trim_end_matches('/');
    Router::new()
        .route("/favicon.ico", get(static_resource))
        .route(&format!("{}/{{*name}}", prefix), get(static_resource))
}

/// static_resource
///
/// GET handler for bundled files.
pub async fn static_resource(
    State(statics): State<Arc<StaticResources>>,
    uri: Uri,
) -> Response {
    statics.serve(resource_from_path(uri.path())).await
}

/// redirect_to_app
///
/// Fallback for every unmatched path: GETs are sent to the application mount point so a
/// mistyped URL lands somewhere useful; other methods get a 404.
pub async fn redirect_to_app(
    State(config): State<AppConfig>,
    method: Method,
) -> Response {
    if method == Method::GET {
        Redirect::to(&config.mount_path).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}
