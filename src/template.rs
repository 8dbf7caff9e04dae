use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    error::DispatchError,
    handlers::{ActionHandler, AppContext, HandlerState, Invocation, TemplateDataFactory},
    models::{ActionRequest, AuthLevel, DataMap, UserInfo},
    render::{RenderError, TEMPLATE_SUFFIX, normalize_template_name},
};

/// Binding holding the raw request parameter multimap.
pub const URLPARAMS_KEY: &str = "urlparams";
/// Binding holding the name of the template being rendered.
pub const FTLNAME_KEY: &str = "ftlname";

/// content_type_for_template
///
/// Response content type, chosen purely from the template name's suffix:
/// `*JSON.ftl`, `*JS.ftl` and `*CSS.ftl` select JSON, JavaScript and CSS; everything
/// else is served as HTML.
pub fn content_type_for_template(template_name: &str) -> &'static str {
    let has_marker = |marker: &str| {
        template_name
            .strip_suffix(TEMPLATE_SUFFIX)
            .is_some_and(|stem| stem.ends_with(marker))
    };

    if has_marker("JSON") {
        "application/json"
    } else if has_marker("JS") {
        "text/javascript"
    } else if has_marker("CSS") {
        "text/css"
    } else {
        "text/html"
    }
}

impl AppContext {
    /// serve_template
    ///
    /// Renders `template_name` for the caller. The data context is the application base
    /// bindings, overlaid with `extra`, plus `urlparams` and `ftlname`.
    ///
    /// A template the renderer cannot locate is replaced by the default template (same
    /// data context) instead of surfacing an engine error. Any other render failure
    /// becomes a 500 carrying the engine diagnostic.
    pub fn serve_template(
        &self,
        user: &UserInfo,
        request: &ActionRequest,
        template_name: &str,
        extra: Option<&DataMap>,
    ) -> Result<Response, DispatchError> {
        let content_type = content_type_for_template(template_name);

        let mut data = self.data_maps.create_data_map(user, request);
        if let Some(extra) = extra {
            data.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let urlparams = serde_json::to_value(&request.params)
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        data.insert(URLPARAMS_KEY.to_string(), urlparams);
        data.insert(
            FTLNAME_KEY.to_string(),
            Value::String(template_name.to_string()),
        );

        let body = match self.renderer.render(template_name, &data) {
            Ok(body) => body,
            Err(RenderError::NotFound(missing)) => {
                let Some(fallback) = self.default_template.as_deref() else {
                    error!(template = %missing, "template missing and no default template registered");
                    return Err(DispatchError::NoDefaultTemplate(missing));
                };
                warn!(template = %missing, fallback = %fallback, "template missing, serving default");
                self.renderer
                    .render(fallback, &data)
                    .map_err(|e| DispatchError::Render(e.to_string()))?
            }
            Err(RenderError::Failed(diagnostic)) => {
                error!(template = %template_name, %diagnostic, "template render failed");
                return Err(DispatchError::Render(diagnostic));
            }
        };

        Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
    }
}

/// TemplateResourceHandler
///
/// Serves one template resource behind a minimum authorization level.
///
/// Optional parts:
/// - a data factory producing extra bindings, cached on the handler unless
///   `refresh_always` is set,
/// - a write handler receiving POSTs addressed to the same template route.
///
/// Without an explicit template name the handler renders the key it was dispatched
/// under, so one instance can be shared by several routes.
pub struct TemplateResourceHandler {
    template_name: Option<String>,
    min_level: AuthLevel,
    data_factory: Option<Arc<dyn TemplateDataFactory>>,
    refresh_always: bool,
    post_handler: Option<HandlerState>,
    // Shared across requests for the handler's lifetime. Concurrent cold-start requests
    // may each build and store it; the last store wins.
    extra_data: ArcSwapOption<DataMap>,
}

impl TemplateResourceHandler {
    /// Handler rendering whatever key it is dispatched under.
    pub fn new() -> Self {
        Self {
            template_name: None,
            min_level: AuthLevel::User,
            data_factory: None,
            refresh_always: false,
            post_handler: None,
            extra_data: ArcSwapOption::empty(),
        }
    }

    /// Handler bound to a fixed template. The name may omit the template suffix.
    pub fn for_template(template_name: &str) -> Self {
        Self {
            template_name: Some(normalize_template_name(template_name)),
            ..Self::new()
        }
    }

    pub fn with_min_level(mut self, level: AuthLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_post_handler(mut self, handler: HandlerState) -> Self {
        self.post_handler = Some(handler);
        self
    }

    pub fn with_data_factory(
        mut self,
        factory: Arc<dyn TemplateDataFactory>,
        refresh_always: bool,
    ) -> Self {
        self.data_factory = Some(factory);
        self.refresh_always = refresh_always;
        self
    }

    /// with_interaction
    ///
    /// Attaches an object that both prepares the template's bindings and answers the
    /// POSTs the rendered page sends back.
    pub fn with_interaction<T>(mut self, actor: Arc<T>, refresh_always: bool) -> Self
    where
        T: ActionHandler + TemplateDataFactory + 'static,
    {
        self.data_factory = Some(actor.clone() as Arc<dyn TemplateDataFactory>);
        self.post_handler = Some(actor as HandlerState);
        self.refresh_always = refresh_always;
        self
    }

    pub fn template_name(&self) -> Option<&str> {
        self.template_name.as_deref()
    }

    pub fn min_level(&self) -> AuthLevel {
        self.min_level
    }

    pub fn post_handler(&self) -> Option<&HandlerState> {
        self.post_handler.as_ref()
    }

    /// Returns the extra bindings for this request, rebuilding them when there is a
    /// factory and nothing cached yet, or when the refresh-always flag is set.
    async fn extra_data(&self) -> Option<Arc<DataMap>> {
        // refresh_always can only be set together with a factory, so this is
        // (factory && nothing cached) || refresh_always.
        let cached = self.extra_data.load_full();
        match &self.data_factory {
            Some(factory) if cached.is_none() || self.refresh_always => {
                debug!(template = ?self.template_name, "building template data");
                let data = Arc::new(factory.build_template_data().await);
                self.extra_data.store(Some(data.clone()));
                Some(data)
            }
            _ => cached,
        }
    }
}

impl Default for TemplateResourceHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for TemplateResourceHandler {
    async fn handle(&self, call: Invocation<'_>) -> Result<Response, DispatchError> {
        if !call.user.is_authorized_for(self.min_level) {
            info!(
                user = %call.user.username,
                required = self.min_level.role_name(),
                actual = call.user.level.role_name(),
                "insufficient level for template"
            );
            return Ok(call
                .app
                .security
                .security_redirect(self.min_level, call.user.level));
        }

        let template_name = self
            .template_name
            .as_deref()
            .or(call.key)
            .ok_or_else(|| DispatchError::Internal("template handler has no template name".into()))?;

        let extra = self.extra_data().await;

        call.app
            .serve_template(call.user, call.request, template_name, extra.as_deref())
    }
}
