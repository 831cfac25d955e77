#![allow(dead_code)]

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use bearerline::{
    ServerConfig,
    cli::ClientIpHeader,
    create_app,
    jwt::JwtConfig,
    rate_limit::{IpExtractor, RateLimitConfig},
    sessions::InMemorySessionStore,
    users::StaticUserDirectory,
};
use serde_json::Value;
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"integration-access-secret-0123456789-abcdefghijklmnopqrstuvwxyz";
pub const REFRESH_SECRET: &[u8] = b"integration-refresh-secret-0123456789-abcdefghijklmnopqrstuvwxy";

pub struct TestApp {
    pub app: Router,
    pub jwt: JwtConfig,
    pub sessions: Arc<InMemorySessionStore>,
}

pub fn test_jwt() -> JwtConfig {
    JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET).expect("Invalid test secrets")
}

/// Create a test app with the demo users and no login rate limit.
pub fn create_test_app() -> TestApp {
    build_test_app(None)
}

/// Create a test app whose login endpoint allows `burst` attempts per peer address.
pub fn create_rate_limited_app(burst: u32) -> TestApp {
    build_rate_limited_app(burst, None)
}

/// Same as `create_rate_limited_app`, keyed by a trusted `X-Forwarded-For` header.
pub fn create_rate_limited_app_behind_proxy(burst: u32) -> TestApp {
    build_rate_limited_app(burst, Some(ClientIpHeader::XForwardedFor))
}

fn build_rate_limited_app(burst: u32, ip_header: Option<ClientIpHeader>) -> TestApp {
    let burst = NonZeroU32::new(burst).expect("burst must be non-zero");
    build_test_app(Some(RateLimitConfig::new(
        NonZeroU32::MIN,
        burst,
        ip_header.map(IpExtractor::from),
    )))
}

/// Where a request appears to come from.
#[derive(Clone, Copy, Default)]
pub struct Client<'a> {
    /// Socket peer address, as `into_make_service_with_connect_info` would record it.
    pub peer: Option<&'a str>,
    pub forwarded_for: Option<&'a str>,
}

impl<'a> Client<'a> {
    pub fn peer(addr: &'a str) -> Self {
        Self {
            peer: Some(addr),
            forwarded_for: None,
        }
    }

    pub fn forwarded_for(self, value: &'a str) -> Self {
        Self {
            forwarded_for: Some(value),
            ..self
        }
    }
}

fn build_test_app(login_rate_limit: Option<RateLimitConfig>) -> TestApp {
    let jwt = test_jwt();
    let sessions = Arc::new(InMemorySessionStore::new());
    let config = ServerConfig {
        jwt: jwt.clone(),
        users: Arc::new(StaticUserDirectory::demo()),
        sessions: sessions.clone(),
        login_rate_limit,
    };
    TestApp {
        app: create_app(&config),
        jwt,
        sessions,
    }
}

async fn read_body(response: axum::http::Response<Body>) -> (StatusCode, Vec<u8>) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    (status, body.to_vec())
}

/// POST a JSON body and return the status with the parsed JSON response.
pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_json_from(app, uri, body, Client::default()).await
}

/// Same as `post_json`, sent as if from the given client.
pub async fn post_json_from(
    app: &Router,
    uri: &str,
    body: Value,
    client: Client<'_>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(value) = client.forwarded_for {
        request = request.header("x-forwarded-for", value);
    }
    if let Some(peer) = client.peer {
        let addr: SocketAddr = peer.parse().expect("invalid peer address");
        request = request.extension(ConnectInfo(addr));
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let (status, bytes) = read_body(response).await;
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// GET with an optional raw Authorization header value.
pub async fn get_with_auth(
    app: &Router,
    uri: &str,
    authorization: Option<&str>,
) -> (StatusCode, String) {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(value) = authorization {
        request = request.header("authorization", value);
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let (status, bytes) = read_body(response).await;
    (status, String::from_utf8(bytes).expect("Body is not UTF-8"))
}

/// GET with `Authorization: Bearer <token>`.
pub async fn get_with_bearer(app: &Router, uri: &str, token: &str) -> (StatusCode, String) {
    get_with_auth(app, uri, Some(&format!("Bearer {}", token))).await
}

/// Log in and return (access_token, refresh_token).
pub async fn login(app: &Router, login: &str, password: &str) -> (String, String) {
    let (status, body) = post_json(
        app,
        "/api/auth/login",
        serde_json::json!({ "login": login, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);

    (
        body["accessToken"].as_str().expect("accessToken").to_string(),
        body["refreshToken"].as_str().expect("refreshToken").to_string(),
    )
}

/// Replace the first character of a token's signature segment.
pub fn tamper_signature(token: &str) -> String {
    let (head, signature) = token.rsplit_once('.').expect("not a JWT");
    let mut chars: Vec<char> = signature.chars().collect();
    chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
    format!("{}.{}", head, chars.into_iter().collect::<String>())
}
