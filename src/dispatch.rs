use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    auth::{Resolution, SecurityState},
    error::DispatchError,
    handlers::{
        ActionHandler, AppContext, DataMapProvider, EmptyDataMap, HandlerState, Invocation,
    },
    models::{ActionRequest, AuthLevel, UserInfo},
    render::{RendererState, normalize_template_name},
    template::TemplateResourceHandler,
};

/// Key under which fallback handlers are registered, in any of the three tables.
pub const DEFAULT_HANDLER: &str = "::default";

/// The fixed query parameter that routes a request to a template resource.
pub const TEMPLATE_PARAM: &str = "ftl";

/// Verb
///
/// The two HTTP methods the dispatcher serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

/// Route
///
/// What a request asks for: an action (possibly unnamed) or a template resource.
/// Template names are always normalized to carry the template suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Action(Option<String>),
    Template(String),
}

/// DispatcherBuilder
///
/// Collects the routing tables during application initialization. Consumed by
/// `build`, which makes the tables read-only for the rest of the process; there is no
/// way to register a handler once the dispatcher serves traffic.
///
/// Later registrations under the same key replace earlier ones.
pub struct DispatcherBuilder {
    routing_param: String,
    security: SecurityState,
    renderer: RendererState,
    data_maps: Arc<dyn DataMapProvider>,
    get_handlers: HashMap<String, HandlerState>,
    post_handlers: HashMap<String, HandlerState>,
    template_handlers: HashMap<String, Arc<TemplateResourceHandler>>,
}

impl DispatcherBuilder {
    /// new
    ///
    /// * `routing_param`: the query parameter naming the action (typically `action`).
    /// * `security`: resolves callers and answers permission failures.
    /// * `renderer`: renders template resources.
    pub fn new(routing_param: &str, security: SecurityState, renderer: RendererState) -> Self {
        Self {
            routing_param: routing_param.to_string(),
            security,
            renderer,
            data_maps: Arc::new(EmptyDataMap),
            get_handlers: HashMap::new(),
            post_handlers: HashMap::new(),
            template_handlers: HashMap::new(),
        }
    }

    /// Sets the provider of the base bindings shared by every rendered template.
    pub fn with_data_maps(mut self, provider: Arc<dyn DataMapProvider>) -> Self {
        self.data_maps = provider;
        self
    }

    pub fn add_get_handler<H: ActionHandler + 'static>(self, action: &str, handler: H) -> Self {
        self.add_shared_get_handler(action, Arc::new(handler))
    }

    pub fn add_shared_get_handler(mut self, action: &str, handler: HandlerState) -> Self {
        self.get_handlers.insert(action.to_string(), handler);
        self
    }

    pub fn add_post_handler<H: ActionHandler + 'static>(self, action: &str, handler: H) -> Self {
        self.add_shared_post_handler(action, Arc::new(handler))
    }

    pub fn add_shared_post_handler(mut self, action: &str, handler: HandlerState) -> Self {
        self.post_handlers.insert(action.to_string(), handler);
        self
    }

    /// add_template_handler
    ///
    /// Registers a handler for a template route. The name is normalized the same way
    /// request values are, so `Report` and `Report.ftl` register the same route.
    pub fn add_template_handler(mut self, name: &str, handler: TemplateResourceHandler) -> Self {
        let key = if name == DEFAULT_HANDLER {
            name.to_string()
        } else {
            normalize_template_name(name)
        };
        self.template_handlers.insert(key, Arc::new(handler));
        self
    }

    /// build
    ///
    /// Freezes the tables. A template table without a default handler is accepted,
    /// but any later missing-template substitution will answer with a 500.
    pub fn build(self) -> Dispatcher {
        let default_template = self
            .template_handlers
            .get(DEFAULT_HANDLER)
            .and_then(|handler| handler.template_name())
            .map(str::to_string);

        if default_template.is_none() {
            warn!("no default template handler registered; missing templates will fail");
        }

        info!(
            routing_param = %self.routing_param,
            get = self.get_handlers.len(),
            post = self.post_handlers.len(),
            templates = self.template_handlers.len(),
            "dispatcher built"
        );

        Dispatcher {
            routing_param: self.routing_param,
            app: AppContext {
                security: self.security,
                renderer: self.renderer,
                data_maps: self.data_maps,
                default_template,
            },
            get_handlers: self.get_handlers,
            post_handlers: self.post_handlers,
            template_handlers: self.template_handlers,
        }
    }
}

/// Dispatcher
///
/// The frozen routing engine. Safe to share across request tasks without locking:
/// every table is read-only after `DispatcherBuilder::build`.
pub struct Dispatcher {
    routing_param: String,
    app: AppContext,
    get_handlers: HashMap<String, HandlerState>,
    post_handlers: HashMap<String, HandlerState>,
    template_handlers: HashMap<String, Arc<TemplateResourceHandler>>,
}

impl Dispatcher {
    pub fn routing_param(&self) -> &str {
        &self.routing_param
    }

    pub fn app(&self) -> &AppContext {
        &self.app
    }

    /// route_for
    ///
    /// A template parameter takes priority over the routing parameter.
    pub fn route_for(&self, request: &ActionRequest) -> Route {
        match request.param(TEMPLATE_PARAM) {
            Some(name) => Route::Template(normalize_template_name(name)),
            None => Route::Action(request.param(&self.routing_param).map(str::to_string)),
        }
    }

    pub async fn dispatch_get(&self, request: &ActionRequest) -> Response {
        self.dispatch(Verb::Get, request).await
    }

    pub async fn dispatch_post(&self, request: &ActionRequest) -> Response {
        self.dispatch(Verb::Post, request).await
    }

    /// dispatch
    ///
    /// The one entry point for all four paths (GET/POST x action/template):
    /// 1. resolve the caller; a redirect from the security layer ends the request,
    /// 2. pick the route from the request parameters,
    /// 3. resolve and run the handler under the verb's fallback rules.
    ///
    /// Always produces a response; errors are mapped to their HTTP status here.
    pub async fn dispatch(&self, verb: Verb, request: &ActionRequest) -> Response {
        let user = match self.app.security.resolve_identity(request).await {
            Resolution::Identified(user) => user,
            Resolution::Redirected(response) => {
                debug!(?verb, uri = %request.uri, "no identity, security layer redirected");
                return response;
            }
        };

        let route = self.route_for(request);
        debug!(?verb, ?route, user = %user.username, level = user.level.role_name(), "dispatching");

        match self.dispatch_route(verb, &route, &user, request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn dispatch_route(
        &self,
        verb: Verb,
        route: &Route,
        user: &UserInfo,
        request: &ActionRequest,
    ) -> Result<Response, DispatchError> {
        match (verb, route) {
            // Template routes do their own gating, so this check only guards actions.
            // Only templates (login pages) may be served to an identity mid-login.
            (_, Route::Action(_)) if user.level == AuthLevel::Invalid => {
                Err(DispatchError::Forbidden {
                    required: AuthLevel::User,
                    actual: user.level,
                })
            }

            (verb, Route::Action(action)) => {
                let table = match verb {
                    Verb::Get => &self.get_handlers,
                    Verb::Post => &self.post_handlers,
                };
                let handler = action
                    .as_deref()
                    .and_then(|action| table.get(action))
                    .or_else(|| {
                        debug!(?verb, ?action, "no handler for action, using default");
                        table.get(DEFAULT_HANDLER)
                    })
                    .ok_or(DispatchError::NoDefaultHandler)?;

                handler
                    .handle(self.invocation(action.as_deref(), user, request))
                    .await
            }

            (Verb::Get, Route::Template(name)) => {
                let call = self.invocation(Some(name.as_str()), user, request);
                match self.template_handlers.get(name) {
                    Some(handler) => handler.handle(call).await,
                    None => {
                        // Any bundled template may be served, with default security
                        // and no extra bindings.
                        debug!(template = %name, "unregistered template, serving ad hoc");
                        TemplateResourceHandler::for_template(name.as_str())
                            .handle(call)
                            .await
                    }
                }
            }

            // Writes have no fallback: a POST without a target is an error, not a page.
            (Verb::Post, Route::Template(name)) => {
                let handler = self
                    .template_handlers
                    .get(name)
                    .ok_or_else(|| DispatchError::NotFound(name.clone()))?;

                if !user.is_authorized_for(handler.min_level()) {
                    return Err(DispatchError::Forbidden {
                        required: handler.min_level(),
                        actual: user.level,
                    });
                }

                let writer = handler
                    .post_handler()
                    .ok_or_else(|| DispatchError::NotFound(name.clone()))?;

                writer
                    .handle(self.invocation(Some(name.as_str()), user, request))
                    .await
            }
        }
    }

    fn invocation<'a>(
        &'a self,
        key: Option<&'a str>,
        user: &'a UserInfo,
        request: &'a ActionRequest,
    ) -> Invocation<'a> {
        Invocation {
            key,
            user,
            request,
            app: &self.app,
        }
    }
}
