//! Token lifecycle: login, renewal, rotation, and per-request identity.
//!
//! Dual-token system: short-lived access tokens (5 min, stateless) presented
//! as `Authorization: Bearer`, and long-lived refresh tokens (30 days) of
//! which exactly one per user is live at a time.

mod bearer;
mod errors;
mod extractors;
mod service;
mod state;
mod types;

pub use bearer::get_bearer_token;
pub use errors::{ApiAuthError, AuthError, AuthErrorKind};
pub use extractors::{
    AdminOnly, AnyRole, Auth, OptionalAuth, RoleConstraint, UserOnly, identity_gate,
    resolve_identity,
};
pub use service::AuthService;
pub use state::HasTokenCodec;
pub use types::{BEARER, Identity, LoginRequest, RefreshRequest, RequestIdentity, TokenResponse};
