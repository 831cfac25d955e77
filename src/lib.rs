pub mod api;
pub mod auth;
pub mod cli;
pub mod jwt;
pub mod rate_limit;
pub mod sessions;
pub mod users;

use api::create_api_router;
use auth::AuthService;
use axum::Router;
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use sessions::RefreshSessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use users::UserDirectory;

pub struct ServerConfig {
    /// Token codec holding the access and refresh secrets
    pub jwt: JwtConfig,
    /// Read-only user lookup
    pub users: Arc<dyn UserDirectory>,
    /// Live refresh token per user
    pub sessions: Arc<dyn RefreshSessionStore>,
    /// Login throttling; None disables it
    pub login_rate_limit: Option<RateLimitConfig>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(config.jwt.clone());
    let auth = Arc::new(AuthService::new(
        jwt.clone(),
        config.users.clone(),
        config.sessions.clone(),
    ));
    let rate_limit = config.login_rate_limit.clone().map(Arc::new);

    Router::new().nest("/api", create_api_router(auth, jwt, rate_limit))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
