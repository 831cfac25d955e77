//! Request identity: the gate middleware and the extractors that read its result.
//!
//! The gate verifies the bearer access token once per request and stores a
//! [`RequestIdentity`] in the request extensions. Extensions are dropped with
//! the request, so an identity never outlives it. Handlers receive the
//! identity explicitly through [`Auth`] or [`OptionalAuth`].

use std::marker::PhantomData;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::bearer::get_bearer_token;
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasTokenCodec;
use super::types::{Identity, RequestIdentity};
use crate::jwt::JwtConfig;
use crate::users::Role;

/// Resolve the caller of a request from its headers.
/// A missing, invalid, or expired access token yields `Anonymous`.
pub fn resolve_identity(jwt: &JwtConfig, headers: &HeaderMap) -> RequestIdentity {
    let Some(token) = get_bearer_token(headers) else {
        return RequestIdentity::Anonymous;
    };

    if !jwt.validate_access_token(token) {
        return RequestIdentity::Anonymous;
    }

    match jwt.access_claims(token) {
        Ok(claims) => RequestIdentity::Authenticated(Identity::from(claims)),
        Err(e) => {
            debug!(error = %e, "Failed to read validated access token");
            RequestIdentity::Anonymous
        }
    }
}

/// Middleware that publishes the request's identity for downstream handlers.
/// Never rejects; authorization is left to the extractors.
pub async fn identity_gate<S>(State(state): State<S>, mut request: Request, next: Next) -> Response
where
    S: HasTokenCodec + Clone + Send + Sync + 'static,
{
    let identity = resolve_identity(state.jwt(), request.headers());
    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn request_identity(parts: &Parts) -> Option<Identity> {
    parts
        .extensions
        .get::<RequestIdentity>()
        .and_then(RequestIdentity::identity)
        .cloned()
}

/// Role requirement checked by [`Auth`].
pub trait RoleConstraint: Send + Sync + 'static {
    fn allows(identity: &Identity) -> bool;
}

/// Any authenticated caller.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_identity: &Identity) -> bool {
        true
    }
}

/// Callers holding the USER role.
pub struct UserOnly;

impl RoleConstraint for UserOnly {
    fn allows(identity: &Identity) -> bool {
        identity.has_role(Role::User)
    }
}

/// Callers holding the ADMIN role.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(identity: &Identity) -> bool {
        identity.has_role(Role::Admin)
    }
}

/// Extractor for endpoints that require an authenticated caller with role `R`.
/// Returns 401 for anonymous requests and 403 when the role is missing.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub identity: Identity,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity =
            request_identity(parts).ok_or(ApiAuthError(AuthErrorKind::NotAuthenticated))?;

        if !R::allows(&identity) {
            debug!(principal = %identity.principal, "Missing required role");
            return Err(ApiAuthError(AuthErrorKind::InsufficientRole));
        }

        Ok(Auth {
            identity,
            _role: PhantomData,
        })
    }
}

/// Optional authentication extractor - never fails.
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(request_identity(parts)))
    }
}
