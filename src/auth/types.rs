//! Identity and wire types for authentication.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::jwt::AccessClaims;
use crate::users::Role;

/// Token type reported in every token response.
pub const BEARER: &str = "Bearer";

/// Authenticated caller, decoded once from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Login of the authenticated user
    pub principal: String,
    /// Roles granted by the access token
    pub roles: BTreeSet<Role>,
    /// Display name
    pub display_name: String,
}

impl Identity {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<AccessClaims> for Identity {
    fn from(claims: AccessClaims) -> Self {
        Self {
            principal: claims.sub,
            roles: claims.roles,
            display_name: claims.first_name,
        }
    }
}

/// Outcome of the identity gate for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestIdentity {
    #[default]
    Anonymous,
    Authenticated(Identity),
}

impl RequestIdentity {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            RequestIdentity::Anonymous => None,
            RequestIdentity::Authenticated(identity) => Some(identity),
        }
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            RequestIdentity::Anonymous => None,
            RequestIdentity::Authenticated(identity) => Some(identity),
        }
    }
}

/// Credentials submitted to log in.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Body of the token and refresh endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Tokens handed back to the client. Absent tokens serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            token_type: BEARER.to_string(),
            access_token,
            refresh_token,
        }
    }

    /// Response carrying no tokens at all.
    pub fn empty() -> Self {
        Self::new(None, None)
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}
