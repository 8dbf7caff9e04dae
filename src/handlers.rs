use async_trait::async_trait;
use axum::response::Response;
use std::sync::Arc;

use crate::{
    auth::SecurityState,
    error::DispatchError,
    models::{ActionRequest, DataMap, UserInfo},
    render::RendererState,
};

// --- Collaborator Contracts ---

/// DataMapProvider
///
/// Supplies the application-wide base bindings for every rendered template
/// (e.g. the user's name, session data, product branding). Implemented by the
/// concrete application.
pub trait DataMapProvider: Send + Sync {
    fn create_data_map(&self, user: &UserInfo, request: &ActionRequest) -> DataMap;
}

impl<F> DataMapProvider for F
where
    F: Fn(&UserInfo, &ActionRequest) -> DataMap + Send + Sync,
{
    fn create_data_map(&self, user: &UserInfo, request: &ActionRequest) -> DataMap {
        self(user, request)
    }
}

/// EmptyDataMap
///
/// Base bindings provider for applications without common bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDataMap;

impl DataMapProvider for EmptyDataMap {
    fn create_data_map(&self, _user: &UserInfo, _request: &ActionRequest) -> DataMap {
        DataMap::new()
    }
}

/// TemplateDataFactory
///
/// Prepares extra, template-specific bindings for a `TemplateResourceHandler`.
#[async_trait]
pub trait TemplateDataFactory: Send + Sync {
    async fn build_template_data(&self) -> DataMap;
}

/// AppContext
///
/// The services shared by every handler of one dispatcher: the security layer, the
/// template renderer and the base bindings provider. Owned by the `Dispatcher` and
/// read-only once built.
pub struct AppContext {
    pub security: SecurityState,
    pub renderer: RendererState,
    pub data_maps: Arc<dyn DataMapProvider>,
    /// Template served in place of a template file the renderer cannot find.
    /// Taken from the handler registered under `::default` in the template table.
    pub default_template: Option<String>,
}

// --- Handler Contract ---

/// Invocation
///
/// Everything a handler receives for one request.
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    /// The action or template key the request was routed by, if any.
    pub key: Option<&'a str>,
    pub user: &'a UserInfo,
    pub request: &'a ActionRequest,
    pub app: &'a AppContext,
}

/// ActionHandler Contract
///
/// The single unit of work the dispatcher routes to. Routing tables store handlers
/// behind this trait only; they never see the concrete type.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, call: Invocation<'_>) -> Result<Response, DispatchError>;
}

/// HandlerState
///
/// The shared handle stored in the routing tables.
pub type HandlerState = Arc<dyn ActionHandler>;

/// SimpleActionHandler
///
/// Adapts a plain synchronous function into an `ActionHandler`.
pub struct SimpleActionHandler<F> {
    f: F,
}

impl<F> SimpleActionHandler<F>
where
    F: for<'a> Fn(Invocation<'a>) -> Result<Response, DispatchError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ActionHandler for SimpleActionHandler<F>
where
    F: for<'a> Fn(Invocation<'a>) -> Result<Response, DispatchError> + Send + Sync,
{
    async fn handle(&self, call: Invocation<'_>) -> Result<Response, DispatchError> {
        (self.f)(call)
    }
}
