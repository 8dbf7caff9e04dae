use async_trait::async_trait;
use axum::response::{Html, IntoResponse, Response};
use ftl_dispatch::{
    AppState, DEFAULT_HANDLER, DispatcherBuilder, StaticResources, TemplateResourceHandler,
    auth::{JwtUserSecurity, SecurityState, StaticUserSecurity},
    config::{AppConfig, Env},
    create_router,
    error::DispatchError,
    handlers::{ActionHandler, HandlerState, Invocation},
    login::{LoginHandler, StaticCredentials},
    models::{ActionRequest, AuthLevel, DataMap, UserInfo},
    render::{RendererState, TeraRenderer},
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::Notify};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ShutdownHandler
///
/// Answers the "stop server" POST sent by the Hello World page, then asks the server to
/// shut down gracefully after a short delay so the reply still reaches the browser.
struct ShutdownHandler {
    shutdown: Arc<Notify>,
}

#[async_trait]
impl ActionHandler for ShutdownHandler {
    async fn handle(&self, call: Invocation<'_>) -> Result<Response, DispatchError> {
        tracing::info!(user = %call.user.username, "shutdown requested");

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            shutdown.notify_one();
        });

        Ok(Html("<html><body><h1>Shutting down in 2s!</h1></body></html>").into_response())
    }
}

/// hello_data_map
///
/// Base bindings for every template of the demo application.
fn hello_data_map(user: &UserInfo, _request: &ActionRequest) -> DataMap {
    let mut map = DataMap::new();
    map.insert("message".into(), Value::from("Hello, world!"));
    map.insert("username".into(), Value::from(user.username.clone()));
    map.insert("role".into(), Value::from(user.level.role_name()));
    map
}

/// main
///
/// Runs the Hello World application: a dispatcher whose default page renders
/// `HelloWorld.ftl`, and whose POSTs to that template stop the server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ftl_dispatch=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Collaborators
    let renderer = TeraRenderer::from_dirs(&config.template_dirs)
        .expect("FATAL: Failed to load templates. Check TEMPLATE_DIRS.");
    let renderer = Arc::new(renderer) as RendererState;

    // Locally everyone is logged in as a plain user; production requires a session,
    // obtained by posting the login form back to the login template.
    let (security, login): (SecurityState, Option<HandlerState>) = match config.env {
        Env::Local => (
            Arc::new(StaticUserSecurity::new(UserInfo::new("user", AuthLevel::User)))
                as SecurityState,
            None,
        ),
        Env::Production => {
            let jwt = Arc::new(JwtUserSecurity::new(
                &config.jwt_secret,
                &config.login_template,
                &config.login_url,
            ));
            let accounts = StaticCredentials::parse(&config.login_accounts)
                .expect("FATAL: Failed to parse LOGIN_ACCOUNTS.");
            if accounts.is_empty() {
                tracing::warn!("LOGIN_ACCOUNTS is empty; nobody can log in");
            }
            let login = LoginHandler::new(
                jwt.clone(),
                Arc::new(accounts),
                config.session_ttl_secs,
                &config.mount_path,
            );
            (jwt as SecurityState, Some(Arc::new(login) as HandlerState))
        }
    };

    let mut login_page = TemplateResourceHandler::new().with_min_level(AuthLevel::Invalid);
    if let Some(login) = login {
        login_page = login_page.with_post_handler(login);
    }

    // 4. Routing tables (frozen before the server accepts traffic)
    let shutdown = Arc::new(Notify::new());
    let dispatcher = DispatcherBuilder::new(&config.routing_param, security, renderer)
        .with_data_maps(Arc::new(hello_data_map))
        .add_get_handler(
            DEFAULT_HANDLER,
            TemplateResourceHandler::for_template("HelloWorld.ftl"),
        )
        .add_template_handler(
            DEFAULT_HANDLER,
            TemplateResourceHandler::for_template("HelloWorld.ftl"),
        )
        .add_template_handler(
            "HelloWorld.ftl",
            TemplateResourceHandler::new().with_post_handler(Arc::new(ShutdownHandler {
                shutdown: shutdown.clone(),
            })),
        )
        .add_template_handler(&config.login_template, login_page)
        .build();

    let statics = StaticResources::new(&config.static_dir).with_cache_days(config.static_cache_days);

    // 5. Server
    let bind_addr = config.bind_addr.clone();
    let mount_path = config.mount_path.clone();
    let app = create_router(AppState {
        dispatcher: Arc::new(dispatcher),
        statics: Arc::new(statics),
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("Application available at: http://{}{}", bind_addr, mount_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown.notified() => tracing::info!("shutdown requested by application"),
                _ = tokio::signal::ctrl_c() => tracing::info!("shutdown requested by signal"),
            }
        })
        .await
        .expect("FATAL: HTTP server error");

    tracing::info!("Server stopped.");
}
