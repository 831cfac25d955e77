mod auth;
mod error;
mod hello;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::auth::{AuthService, identity_gate};
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use auth::AuthState;
pub use error::ApiError;

/// Create the API router.
///
/// Every request passes the identity gate before reaching a handler.
pub fn create_api_router(
    auth: Arc<AuthService>,
    jwt: Arc<JwtConfig>,
    rate_limit: Option<Arc<RateLimitConfig>>,
) -> Router {
    let auth_state = AuthState { auth, jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state.clone(), rate_limit))
        .nest("/hello", hello::router())
        .layer(middleware::from_fn_with_state(
            auth_state,
            identity_gate::<AuthState>,
        ))
}
