//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed under two independent secrets. A
//! service that only checks access tokens never needs the refresh secret.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::users::{Principal, Role};

/// Access token duration: 5 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 5 * 60;

/// Refresh token duration: 30 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Shortest accepted secret, in bytes (256 bits).
pub const MIN_SECRET_LENGTH: usize = 32;

/// JWT claims for access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (login)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Unique token id
    pub jti: String,
    /// Granted roles
    pub roles: BTreeSet<Role>,
    /// Display name
    #[serde(rename = "firstName")]
    pub first_name: String,
}

/// JWT claims for refresh tokens. Deliberately carries no roles or names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (login)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Unique token id
    pub jti: String,
}

/// Signing material for one token kind.
#[derive(Clone)]
struct KeyDomain {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl KeyDomain {
    fn new(secret: &[u8]) -> Self {
        Self {
            algorithm: algorithm_for_key(secret.len()),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation
    }
}

/// Pick the strongest HMAC variant the key length supports.
fn algorithm_for_key(len: usize) -> Algorithm {
    if len >= 64 {
        Algorithm::HS512
    } else if len >= 48 {
        Algorithm::HS384
    } else {
        Algorithm::HS256
    }
}

/// Token codec holding both signing secrets.
#[derive(Clone)]
pub struct JwtConfig {
    access: KeyDomain,
    refresh: KeyDomain,
}

impl JwtConfig {
    /// Create a codec from raw secrets.
    /// Both secrets must be at least [`MIN_SECRET_LENGTH`] bytes and must differ.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Result<Self, JwtError> {
        if access_secret.len() < MIN_SECRET_LENGTH {
            return Err(JwtError::InvalidKey("access secret is too short"));
        }
        if refresh_secret.len() < MIN_SECRET_LENGTH {
            return Err(JwtError::InvalidKey("refresh secret is too short"));
        }
        if access_secret == refresh_secret {
            return Err(JwtError::InvalidKey(
                "access and refresh secrets must be different",
            ));
        }

        Ok(Self {
            access: KeyDomain::new(access_secret),
            refresh: KeyDomain::new(refresh_secret),
        })
    }

    /// Create a codec from base64-encoded secrets.
    pub fn from_base64(access_secret: &str, refresh_secret: &str) -> Result<Self, JwtError> {
        let access = STANDARD
            .decode(access_secret.trim())
            .map_err(|_| JwtError::InvalidKey("access secret is not valid base64"))?;
        let refresh = STANDARD
            .decode(refresh_secret.trim())
            .map_err(|_| JwtError::InvalidKey("refresh secret is not valid base64"))?;
        Self::new(&access, &refresh)
    }

    /// Generate an access token carrying the principal's roles and display name.
    pub fn generate_access_token(&self, principal: &Principal) -> Result<String, JwtError> {
        let claims = AccessClaims {
            sub: principal.login.clone(),
            exp: now()? + ACCESS_TOKEN_DURATION_SECS,
            jti: uuid::Uuid::new_v4().to_string(),
            roles: principal.roles.clone(),
            first_name: principal.display_name.clone(),
        };

        jsonwebtoken::encode(
            &Header::new(self.access.algorithm),
            &claims,
            &self.access.encoding_key,
        )
        .map_err(JwtError::Encoding)
    }

    /// Generate a refresh token carrying only the subject.
    pub fn generate_refresh_token(&self, principal: &Principal) -> Result<String, JwtError> {
        let claims = RefreshClaims {
            sub: principal.login.clone(),
            exp: now()? + REFRESH_TOKEN_DURATION_SECS,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        jsonwebtoken::encode(
            &Header::new(self.refresh.algorithm),
            &claims,
            &self.refresh.encoding_key,
        )
        .map_err(JwtError::Encoding)
    }

    /// Check signature and expiry of an access token. Failures are logged, never raised.
    pub fn validate_access_token(&self, token: &str) -> bool {
        report("access", self.access_claims(token))
    }

    /// Check signature and expiry of a refresh token. Failures are logged, never raised.
    pub fn validate_refresh_token(&self, token: &str) -> bool {
        report("refresh", self.refresh_claims(token))
    }

    /// Decode the claims of an access token.
    pub fn access_claims(&self, token: &str) -> Result<AccessClaims, JwtError> {
        decode(token, &self.access)
    }

    /// Decode the claims of a refresh token.
    pub fn refresh_claims(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        decode(token, &self.refresh)
    }
}

fn now() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

fn decode<T: serde::de::DeserializeOwned>(token: &str, domain: &KeyDomain) -> Result<T, JwtError> {
    jsonwebtoken::decode::<T>(token, &domain.decoding_key, &domain.validation())
        .map(|data| data.claims)
        .map_err(JwtError::from)
}

fn report<T>(kind: &'static str, result: Result<T, JwtError>) -> bool {
    match result {
        Ok(_) => true,
        Err(JwtError::Expired) => {
            debug!(kind, "Token expired");
            false
        }
        Err(e) => {
            warn!(kind, reason = %e, "Rejected token");
            false
        }
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Token expiry is in the past
    Expired,
    /// Token structure, encoding, or payload is broken
    Malformed(jsonwebtoken::errors::Error),
    /// Signature does not match the key domain
    InvalidSignature,
    /// Header names an algorithm this key domain does not accept
    UnsupportedAlgorithm,
    /// Any other rejection from the JWT library
    Invalid(jsonwebtoken::errors::Error),
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Unusable signing secret
    InvalidKey(&'static str),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => JwtError::UnsupportedAlgorithm,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => JwtError::Malformed(e),
            _ => JwtError::Invalid(e),
        }
    }
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Expired => write!(f, "Token expired"),
            JwtError::Malformed(e) => write!(f, "Malformed token: {}", e),
            JwtError::InvalidSignature => write!(f, "Invalid signature"),
            JwtError::UnsupportedAlgorithm => write!(f, "Unsupported algorithm"),
            JwtError::Invalid(e) => write!(f, "Invalid token: {}", e),
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::InvalidKey(reason) => write!(f, "Invalid signing key: {}", reason),
        }
    }
}

impl std::error::Error for JwtError {}
