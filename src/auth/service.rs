//! Login, access-token renewal, and refresh-token rotation.
//!
//! The service holds no state of its own; the live refresh token for each
//! login lives in the injected [`RefreshSessionStore`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::errors::AuthError;
use super::types::{LoginRequest, TokenResponse};
use crate::jwt::JwtConfig;
use crate::sessions::RefreshSessionStore;
use crate::users::{Principal, UserDirectory};

#[derive(Clone)]
pub struct AuthService {
    jwt: Arc<JwtConfig>,
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn RefreshSessionStore>,
}

impl AuthService {
    pub fn new(
        jwt: Arc<JwtConfig>,
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn RefreshSessionStore>,
    ) -> Self {
        Self {
            jwt,
            users,
            sessions,
        }
    }

    /// Check credentials and start a new session, replacing any previous one.
    pub fn login(&self, request: &LoginRequest) -> Result<TokenResponse, AuthError> {
        let user = self.users.lookup(&request.login).ok_or_else(|| {
            info!(login = %request.login, "Login failed: unknown user");
            AuthError::UserNotFound
        })?;

        if !user.password_matches(&request.password) {
            info!(login = %request.login, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.jwt.generate_access_token(&user.principal)?;
        let refresh_token = self.jwt.generate_refresh_token(&user.principal)?;
        self.sessions
            .put(&user.principal.login, refresh_token.clone());

        info!(login = %user.principal.login, "Login succeeded");
        Ok(TokenResponse::new(Some(access_token), Some(refresh_token)))
    }

    /// Mint a new access token from a live refresh token, leaving the refresh token as is.
    ///
    /// Any refresh-token failure yields an empty response rather than an error.
    pub fn exchange_access_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let Some(login) = self.live_session_login(refresh_token) else {
            return Ok(TokenResponse::empty());
        };

        let principal = self.principal(&login).ok_or(AuthError::UserNotFound)?;
        let access_token = self.jwt.generate_access_token(&principal)?;

        debug!(login = %login, "Issued access token from refresh token");
        Ok(TokenResponse::new(Some(access_token), None))
    }

    /// Rotate a live refresh token: issue a new pair and retire the presented token.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let login = self
            .live_session_login(refresh_token)
            .ok_or(AuthError::InvalidRefreshToken)?;

        let Some(principal) = self.principal(&login) else {
            warn!(login = %login, "Refresh for user missing from directory");
            return Err(AuthError::InvalidRefreshToken);
        };

        let access_token = self.jwt.generate_access_token(&principal)?;
        let new_refresh_token = self.jwt.generate_refresh_token(&principal)?;

        // Lost a race with another rotation of the same token.
        if !self
            .sessions
            .rotate(&login, refresh_token, new_refresh_token.clone())
        {
            warn!(login = %login, "Refresh token superseded during rotation");
            return Err(AuthError::InvalidRefreshToken);
        }

        info!(login = %login, "Rotated refresh token");
        Ok(TokenResponse::new(
            Some(access_token),
            Some(new_refresh_token),
        ))
    }

    /// Login of a refresh token that is validly signed, unexpired, and still the
    /// one stored for its subject.
    fn live_session_login(&self, refresh_token: &str) -> Option<String> {
        if !self.jwt.validate_refresh_token(refresh_token) {
            return None;
        }

        let claims = match self.jwt.refresh_claims(refresh_token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Failed to read validated refresh token");
                return None;
            }
        };

        match self.sessions.get(&claims.sub) {
            Some(stored) if stored == refresh_token => Some(claims.sub),
            Some(_) => {
                info!(login = %claims.sub, "Refresh token does not match live session");
                None
            }
            None => {
                info!(login = %claims.sub, "No live session for refresh token");
                None
            }
        }
    }

    fn principal(&self, login: &str) -> Option<Principal> {
        self.users.lookup(login).map(|user| user.principal)
    }
}
