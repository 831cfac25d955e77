//! Role-gated greeting endpoints.

use axum::{Router, routing::get};

use crate::auth::{AdminOnly, Auth, UserOnly};

pub fn router() -> Router {
    Router::new()
        .route("/user", get(hello_user))
        .route("/admin", get(hello_admin))
}

async fn hello_user(auth: Auth<UserOnly>) -> String {
    format!("Hello user {}!", auth.identity.principal)
}

async fn hello_admin(auth: Auth<AdminOnly>) -> String {
    format!("Hello admin {}!", auth.identity.principal)
}
