use std::path::{Path, PathBuf};
use std::sync::Arc;

use tera::{Context, Tera};
use tracing::{debug, info};

use crate::{models::DataMap, template::content_type_for_template};

/// File suffix every template resource carries.
pub const TEMPLATE_SUFFIX: &str = ".ftl";

/// normalize_template_name
///
/// Template resources may be requested without their suffix; `HelloWorld` and
/// `HelloWorld.ftl` name the same resource.
pub fn normalize_template_name(name: &str) -> String {
    if name.ends_with(TEMPLATE_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, TEMPLATE_SUFFIX)
    }
}

/// RenderError
///
/// The two ways a render can fail. `NotFound` is recoverable by the caller (it may
/// substitute another template); `Failed` carries the engine diagnostic and is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),
}

/// TemplateRenderer Contract
///
/// Turns a template name and a data context into rendered text. The dispatcher only
/// selects the name and assembles the context; everything else is delegated here.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template_name: &str, context: &DataMap) -> Result<String, RenderError>;
}

/// RendererState
///
/// The shared handle used to pass the renderer around the application.
pub type RendererState = Arc<dyn TemplateRenderer>;

/// TeraRenderer
///
/// Tera-backed renderer that loads every `*.ftl` file from an ordered list of
/// directories. Template names are paths relative to their directory. When two
/// directories provide the same name, the earlier directory wins, so an application
/// directory listed first can override shared templates listed after it.
///
/// Values are HTML-escaped in every template served as HTML. Templates served as
/// JSON, JavaScript or CSS (see `content_type_for_template`) render values verbatim.
pub struct TeraRenderer {
    html: Tera,
    verbatim: Tera,
}

impl TeraRenderer {
    /// Creates an empty renderer. Templates can be added with `add_raw_template`.
    pub fn new() -> Self {
        Self::from_tera(Tera::default())
    }

    fn from_tera(mut html: Tera) -> Self {
        html.autoescape_on(vec![TEMPLATE_SUFFIX]);
        let mut verbatim = html.clone();
        verbatim.autoescape_on(vec![]);
        Self { html, verbatim }
    }

    /// from_dirs
    ///
    /// Loads all templates from the given directories, in priority order.
    /// Missing directories are skipped; syntax errors are reported immediately.
    pub fn from_dirs<P: AsRef<Path>>(dirs: &[P]) -> Result<Self, RenderError> {
        let mut tera = Tera::default();

        for dir in dirs {
            let dir = dir.as_ref();
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "template directory missing, skipped");
                continue;
            }

            let glob = template_glob(dir);
            let loaded = Tera::parse(&glob).map_err(|e| RenderError::Failed(describe(&e)))?;

            // `extend` keeps names already present, giving earlier directories priority.
            tera.extend(&loaded)
                .map_err(|e| RenderError::Failed(describe(&e)))?;
            info!(dir = %dir.display(), "loaded templates");
        }

        tera.build_inheritance_chains()
            .map_err(|e| RenderError::Failed(describe(&e)))?;

        Ok(Self::from_tera(tera))
    }

    /// add_raw_template
    ///
    /// Registers a template from an in-memory string, replacing any template with the
    /// same name.
    pub fn add_raw_template(&mut self, name: &str, content: &str) -> Result<(), RenderError> {
        for tera in [&mut self.html, &mut self.verbatim] {
            tera.add_raw_template(name, content)
                .map_err(|e| RenderError::Failed(describe(&e)))?;
        }
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.html.get_template_names().any(|n| n == name)
    }

    fn engine_for(&self, template_name: &str) -> &Tera {
        match content_type_for_template(template_name) {
            "text/html" => &self.html,
            _ => &self.verbatim,
        }
    }
}

impl Default for TeraRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for TeraRenderer {
    fn render(&self, template_name: &str, context: &DataMap) -> Result<String, RenderError> {
        if !self.has_template(template_name) {
            return Err(RenderError::NotFound(template_name.to_string()));
        }

        let ctx = Context::from_value(serde_json::Value::Object(context.clone()))
            .map_err(|e| RenderError::Failed(describe(&e)))?;

        self.engine_for(template_name)
            .render(template_name, &ctx)
            .map_err(|e| RenderError::Failed(describe(&e)))
    }
}

fn template_glob(dir: &Path) -> String {
    let mut pattern = PathBuf::from(dir);
    pattern.push(format!("**/*{}", TEMPLATE_SUFFIX));
    pattern.to_string_lossy().into_owned()
}

/// Flattens a Tera error and its source chain into a single diagnostic line.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
