use axum::{Router, extract::FromRef, http::HeaderName};
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// The dispatcher core: identity model, handler family and routing engine.
pub mod models;
pub mod error;
pub mod handlers;
pub mod template;
pub mod dispatch;

// Collaborators consumed by the core.
pub mod auth;
pub mod login;
pub mod render;

// Ambient services around the core.
pub mod config;
pub mod static_files;
pub mod weblib;

// HTTP surface (dispatcher mount point, static resources, fallback).
pub mod routes;
use routes::{app, resources};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use dispatch::{DEFAULT_HANDLER, Dispatcher, DispatcherBuilder, TEMPLATE_PARAM};
pub use error::DispatchError;
pub use handlers::{ActionHandler, Invocation, SimpleActionHandler, TemplateDataFactory};
pub use models::{ActionRequest, AuthLevel, DataMap, UserInfo};
pub use static_files::StaticResources;
pub use template::TemplateResourceHandler;

/// AppState
///
/// The single, immutable container shared by every request: the frozen dispatcher, the
/// static resource service and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub statics: Arc<StaticResources>,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for Arc<Dispatcher> {
    fn from_ref(app_state: &AppState) -> Arc<Dispatcher> {
        app_state.dispatcher.clone()
    }
}

impl FromRef<AppState> for Arc<StaticResources> {
    fn from_ref(app_state: &AppState) -> Arc<StaticResources> {
        app_state.statics.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the HTTP surface: the dispatcher mount point, static resources and the
/// catch-all redirect, wrapped in the request-id and tracing layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(app::app_routes(&state.config.mount_path))
        .merge(resources::resource_routes(&state.config.static_prefix))
        .fallback(resources::redirect_to_app)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                // Generates a unique id for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // Returns the id to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, correlated by its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
