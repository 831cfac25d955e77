//! CLI argument parsing, validation, and startup helpers.

use std::num::NonZeroU32;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::Parser;
use rand::RngCore;
use tracing::{error, info};

use crate::ServerConfig;
use crate::jwt::JwtConfig;
use crate::rate_limit::{IpExtractor, RateLimitConfig};
use crate::sessions::InMemorySessionStore;
use crate::users::StaticUserDirectory;

/// Environment variable holding the base64 access-token secret.
pub const ACCESS_SECRET_ENV: &str = "JWT_ACCESS_SECRET";

/// Environment variable holding the base64 refresh-token secret.
pub const REFRESH_SECRET_ENV: &str = "JWT_REFRESH_SECRET";

/// Size of secrets produced by `--generate-keys`.
const GENERATED_KEY_BYTES: usize = 64;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Proxy header trusted to carry the client IP.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    XForwardedFor,
    XRealIp,
    CfConnectingIp,
}

impl ClientIpHeader {
    pub fn header_name(self) -> &'static str {
        match self {
            ClientIpHeader::XForwardedFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
            ClientIpHeader::CfConnectingIp => "cf-connecting-ip",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bearerline",
    about = "JWT access/refresh token service with refresh-token rotation"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "BEARERLINE_PORT", default_value = "8080")]
    pub port: u16,

    /// Path to file containing the base64 access secret. Prefer the JWT_ACCESS_SECRET env var
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the base64 refresh secret. Prefer the JWT_REFRESH_SECRET env var
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// JSON file with users ([{login, password, firstName, roles}]). Demo users if omitted
    #[arg(long)]
    pub users_file: Option<String>,

    /// Login attempts allowed per second per client IP. Unlimited if omitted
    #[arg(long)]
    pub login_rate_limit: Option<NonZeroU32>,

    /// Burst size for login rate limiting
    #[arg(long, default_value = "5")]
    pub login_burst: NonZeroU32,

    /// Header set by a trusted reverse proxy to read the client IP from.
    /// Only set this behind a proxy that overwrites it; the peer address is used otherwise
    #[arg(long, env = "BEARERLINE_IP_HEADER")]
    pub ip_header: Option<ClientIpHeader>,

    /// Print two freshly generated secrets and exit
    #[arg(long)]
    pub generate_keys: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_name: &str, secret_file: Option<&str>) -> Option<String> {
    if let Ok(secret) = std::env::var(env_name) {
        // Clear the environment variable to prevent leaking
        // SAFETY: Called once from main before the server starts; nothing else
        // in the process reads or writes the environment concurrently.
        unsafe { std::env::remove_var(env_name) };
        return Some(secret.trim().to_string());
    }

    let Some(path) = secret_file else {
        error!(
            env = env_name,
            "Secret is required. Set the environment variable (recommended) or pass a secret file"
        );
        return None;
    };

    match std::fs::read_to_string(path) {
        Ok(content) => Some(content.trim().to_string()),
        Err(e) => {
            error!(path = %path, error = %e, "Failed to read secret file");
            None
        }
    }
}

/// Build the token codec from both base64 secrets.
/// Returns None and logs an error if either secret is unusable.
pub fn load_jwt_config(access_secret: &str, refresh_secret: &str) -> Option<JwtConfig> {
    match JwtConfig::from_base64(access_secret, refresh_secret) {
        Ok(config) => Some(config),
        Err(e) => {
            error!(error = %e, "Invalid JWT secrets");
            None
        }
    }
}

/// Load the user directory from a JSON file, or fall back to the demo users.
pub fn load_users(users_file: Option<&str>) -> Option<StaticUserDirectory> {
    let Some(path) = users_file else {
        info!("No users file given, using demo users");
        return Some(StaticUserDirectory::demo());
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(path = %path, error = %e, "Failed to read users file");
            return None;
        }
    };

    match StaticUserDirectory::from_json(&content) {
        Ok(directory) => {
            info!(path = %path, count = directory.len(), "Users loaded");
            Some(directory)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to parse users file");
            None
        }
    }
}

/// Generate a random base64 secret suitable for either key domain.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; GENERATED_KEY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Handle the --generate-keys flag: print one secret per key domain.
pub fn handle_generate_keys() {
    println!("{}={}", ACCESS_SECRET_ENV, generate_secret());
    println!("{}={}", REFRESH_SECRET_ENV, generate_secret());
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    jwt: JwtConfig,
    users: StaticUserDirectory,
    login_rate_limit: Option<NonZeroU32>,
    login_burst: NonZeroU32,
    ip_header: Option<ClientIpHeader>,
) -> ServerConfig {
    let ip_extractor = ip_header.map(IpExtractor::from);
    ServerConfig {
        jwt,
        users: Arc::new(users),
        sessions: Arc::new(InMemorySessionStore::new()),
        login_rate_limit: login_rate_limit
            .map(|rate| RateLimitConfig::new(rate, login_burst, ip_extractor)),
    }
}
