use std::env;
use std::path::PathBuf;

/// Local fallback for the session signing secret. Never accepted in production.
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and shared
/// through `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects log format and the security layer.
    pub env: Env,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Path the dispatcher is mounted at (e.g. "/hello").
    pub mount_path: String,
    // Query parameter naming the action to run.
    pub routing_param: String,
    // Template directories, searched in order.
    pub template_dirs: Vec<PathBuf>,
    // Directory holding static resources.
    pub static_dir: PathBuf,
    // URL prefix static resources are served under.
    pub static_prefix: String,
    // Cache policy for static resources: negative = unspecified, 0 = no-cache, N = days.
    pub static_cache_days: i64,
    // Secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Template serving the login form; reachable without a session.
    pub login_template: String,
    // Where callers without a session are sent.
    pub login_url: String,
    // Accounts accepted by the login form: `name:level:argon2-phc` entries separated by `;`.
    pub login_accounts: String,
    // Lifetime of an issued session, in seconds.
    pub session_ttl_secs: usize,
}

/// Env
///
/// Defines the runtime context: developer conveniences locally, hardened settings in
/// production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for tests and scaffolding; no environment needed.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:9988".to_string(),
            mount_path: "/hello".to_string(),
            routing_param: "action".to_string(),
            template_dirs: vec![PathBuf::from("templates")],
            static_dir: PathBuf::from("static"),
            static_prefix: "/res".to_string(),
            static_cache_days: -1,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            login_template: "Login.ftl".to_string(),
            login_url: "/hello?ftl=Login.ftl".to_string(),
            login_accounts: String::new(),
            session_ttl_secs: 8 * 60 * 60,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables (call `dotenv` first to pick
    /// up a `.env` file).
    ///
    /// # Panics
    /// Panics when `JWT_SECRET` is missing in production, or when a numeric variable
    /// cannot be parsed. The server must not start half-configured.
    pub fn load() -> Self {
        let defaults = Self::default();

        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
        };

        let mount_path = env::var("MOUNT_PATH").unwrap_or(defaults.mount_path);

        let template_dirs = env::var("TEMPLATE_DIRS")
            .map(|dirs| {
                dirs.split(':')
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or(defaults.template_dirs);

        let static_cache_days = env::var("STATIC_CACHE_DAYS")
            .map(|days| {
                days.parse()
                    .expect("FATAL: STATIC_CACHE_DAYS must be an integer.")
            })
            .unwrap_or(defaults.static_cache_days);

        let session_ttl_secs = env::var("SESSION_TTL_SECS")
            .map(|secs| {
                secs.parse()
                    .expect("FATAL: SESSION_TTL_SECS must be an integer.")
            })
            .unwrap_or(defaults.session_ttl_secs);

        let login_template = env::var("LOGIN_TEMPLATE").unwrap_or(defaults.login_template);
        let login_url = env::var("LOGIN_URL")
            .unwrap_or_else(|_| format!("{}?ftl={}", mount_path, login_template));

        Self {
            env,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9988".to_string()),
            routing_param: env::var("ROUTING_PARAM").unwrap_or(defaults.routing_param),
            template_dirs,
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            static_prefix: env::var("STATIC_PREFIX").unwrap_or(defaults.static_prefix),
            static_cache_days,
            jwt_secret,
            login_template,
            login_url,
            login_accounts: env::var("LOGIN_ACCOUNTS").unwrap_or(defaults.login_accounts),
            session_ttl_secs,
            mount_path,
        }
    }
}
