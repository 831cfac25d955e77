//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password guessing.
//! The client IP is the socket peer address unless a trusted proxy header is configured.

use std::net::{IpAddr, SocketAddr};
use std::{num::NonZeroU32, sync::Arc};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use tracing::warn;

use crate::cli::ClientIpHeader;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Reads the client IP from a header set by a trusted reverse proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpExtractor {
    header: ClientIpHeader,
}

impl From<ClientIpHeader> for IpExtractor {
    fn from(header: ClientIpHeader) -> Self {
        Self { header }
    }
}

impl IpExtractor {
    pub fn header_name(&self) -> &'static str {
        self.header.header_name()
    }

    /// Parse the client IP out of the header value.
    ///
    /// For `X-Forwarded-For` the last entry is used: it is the one appended by
    /// the proxy in front of us, earlier entries come from the client.
    pub fn extract(&self, value: &str) -> Result<String, &'static str> {
        let candidate = match self.header {
            ClientIpHeader::XForwardedFor => value.rsplit(',').next().unwrap_or(value),
            ClientIpHeader::XRealIp | ClientIpHeader::CfConnectingIp => value,
        };

        candidate
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain a valid address")
    }
}

/// Rate limiting configuration for the login endpoint.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub login: Arc<IpLimiter>,
    /// Trusted proxy header; None keys buckets by the peer address.
    pub ip_extractor: Option<IpExtractor>,
}

impl RateLimitConfig {
    /// Allow `per_second` logins per IP with bursts of up to `burst`.
    pub fn new(per_second: NonZeroU32, burst: NonZeroU32, ip_extractor: Option<IpExtractor>) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_second(per_second).allow_burst(burst),
            )),
            ip_extractor,
        }
    }
}

/// Extract the client IP of a request.
///
/// With an extractor, only the configured header is consulted and a missing or
/// invalid header is an error; there is no fallback to the peer address.
/// Without one, the peer address from `ConnectInfo` is used and headers are ignored.
pub fn client_ip(request: &Request, ip_extractor: Option<&IpExtractor>) -> Result<String, &'static str> {
    match ip_extractor {
        Some(extractor) => {
            let value = request
                .headers()
                .get(extractor.header_name())
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            extractor.extract(value)
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match client_ip(&request, config.ip_extractor.as_ref()) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Rejected login without client IP");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}
