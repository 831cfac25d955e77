//! Token endpoints.
//!
//! - POST `/login` - Exchange credentials for an access + refresh token pair
//! - POST `/token` - Exchange a refresh token for a new access token (no rotation)
//! - POST `/refresh` - Rotate a refresh token, returning a new pair
//! - GET `/whoami` - Report the identity resolved for the current request

use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::{AuthService, LoginRequest, OptionalAuth, RefreshRequest, TokenResponse};
use crate::impl_has_token_codec;
use crate::jwt::JwtConfig;
use crate::rate_limit::{RateLimitConfig, rate_limit_login};
use crate::users::Role;

#[derive(Clone)]
pub struct AuthState {
    pub auth: Arc<AuthService>,
    pub jwt: Arc<JwtConfig>,
}

impl_has_token_codec!(AuthState);

pub fn router(state: AuthState, rate_limit: Option<Arc<RateLimitConfig>>) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone());

    let login_router = match rate_limit {
        Some(config) => {
            login_router.layer(middleware::from_fn_with_state(config, rate_limit_login))
        }
        None => login_router,
    };

    Router::new()
        .route("/token", post(access_token))
        .route("/refresh", post(refresh))
        .route("/whoami", get(whoami))
        .with_state(state)
        .merge(login_router)
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.auth.login(&payload)?))
}

/// New access token only. Any refresh-token problem yields a response with
/// both tokens set to null rather than an error status.
async fn access_token(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(
        state.auth.exchange_access_token(&payload.refresh_token)?,
    ))
}

async fn refresh(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.auth.refresh(&payload.refresh_token)?))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WhoAmIResponse {
    authenticated: bool,
    principal: Option<String>,
    display_name: Option<String>,
    roles: Vec<Role>,
}

async fn whoami(OptionalAuth(identity): OptionalAuth) -> Json<WhoAmIResponse> {
    Json(match identity {
        Some(identity) => WhoAmIResponse {
            authenticated: true,
            principal: Some(identity.principal),
            display_name: Some(identity.display_name),
            roles: identity.roles.into_iter().collect(),
        },
        None => WhoAmIResponse {
            authenticated: false,
            principal: None,
            display_name: None,
            roles: Vec::new(),
        },
    })
}
