mod common;

use axum::http::StatusCode;
use bearerline::sessions::RefreshSessionStore;
use common::*;
use serde_json::json;

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_returns_token_pair() {
    let test = create_test_app();

    let (status, body) = post_json(
        &test.app,
        "/api/auth/login",
        json!({ "login": "Anton", "password": "1234" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokenType"], "Bearer");

    let access = body["accessToken"].as_str().unwrap();
    let refresh = body["refreshToken"].as_str().unwrap();
    assert!(test.jwt.validate_access_token(access));
    assert!(test.jwt.validate_refresh_token(refresh));
    assert_eq!(test.sessions.get("Anton").as_deref(), Some(refresh));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let test = create_test_app();

    let (wrong_password_status, wrong_password) = post_json(
        &test.app,
        "/api/auth/login",
        json!({ "login": "Anton", "password": "wrong" }),
    )
    .await;
    let (unknown_user_status, unknown_user) = post_json(
        &test.app,
        "/api/auth/login",
        json!({ "login": "Nobody", "password": "1234" }),
    )
    .await;

    assert_eq!(wrong_password_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_user);
    assert_eq!(wrong_password["error"], "Authentication failed");
    assert!(test.sessions.get("Anton").is_none());
}

#[tokio::test]
async fn test_second_login_invalidates_first_refresh_token() {
    let test = create_test_app();

    let (_, first_refresh) = login(&test.app, "Anton", "1234").await;
    let (_, second_refresh) = login(&test.app, "Anton", "1234").await;
    assert_ne!(first_refresh, second_refresh);

    let (status, body) = post_json(
        &test.app,
        "/api/auth/refresh",
        json!({ "refreshToken": first_refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid refresh token");
}

// ============================================================================
// Access token exchange
// ============================================================================

#[tokio::test]
async fn test_exchange_issues_access_token_without_rotation() {
    let test = create_test_app();
    let (_, refresh) = login(&test.app, "Anton", "1234").await;

    for _ in 0..2 {
        let (status, body) = post_json(
            &test.app,
            "/api/auth/token",
            json!({ "refreshToken": refresh }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["refreshToken"].is_null());
        let access = body["accessToken"].as_str().unwrap();
        assert_eq!(test.jwt.access_claims(access).unwrap().sub, "Anton");
    }

    assert_eq!(test.sessions.get("Anton").as_deref(), Some(refresh.as_str()));
}

#[tokio::test]
async fn test_exchange_with_bad_token_returns_empty_response() {
    let test = create_test_app();
    let (access, refresh) = login(&test.app, "Anton", "1234").await;

    for token in [
        "garbage".to_string(),
        tamper_signature(&refresh),
        // Access tokens are signed with the other secret.
        access,
    ] {
        let (status, body) = post_json(
            &test.app,
            "/api/auth/token",
            json!({ "refreshToken": token }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "tokenType": "Bearer", "accessToken": null, "refreshToken": null })
        );
    }
}

// ============================================================================
// Refresh rotation
// ============================================================================

#[tokio::test]
async fn test_refresh_rotates_token() {
    let test = create_test_app();
    let (_, refresh) = login(&test.app, "Sergei", "12345").await;

    let (status, body) = post_json(
        &test.app,
        "/api/auth/refresh",
        json!({ "refreshToken": refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let new_refresh = body["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, refresh);
    assert!(test.jwt.validate_access_token(body["accessToken"].as_str().unwrap()));
    assert_eq!(test.sessions.get("Sergei").as_deref(), Some(new_refresh.as_str()));

    // The rotated-out token is dead for both endpoints.
    let (status, _) = post_json(
        &test.app,
        "/api/auth/refresh",
        json!({ "refreshToken": refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post_json(
        &test.app,
        "/api/auth/token",
        json!({ "refreshToken": refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["accessToken"].is_null());
}

#[tokio::test]
async fn test_refresh_rejects_malformed_token() {
    let test = create_test_app();

    let (status, body) = post_json(
        &test.app,
        "/api/auth/refresh",
        json!({ "refreshToken": "not.a.jwt" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid refresh token");
}

#[tokio::test]
async fn test_login_refresh_exchange_scenario() {
    let test = create_test_app();

    let (access, refresh) = login(&test.app, "Anton", "1234").await;
    let (status, greeting) = get_with_bearer(&test.app, "/api/hello/user", &access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(greeting, "Hello user Anton!");

    let (_, rotated) = post_json(
        &test.app,
        "/api/auth/refresh",
        json!({ "refreshToken": refresh }),
    )
    .await;
    let rotated_refresh = rotated["refreshToken"].as_str().unwrap();

    let (status, exchanged) = post_json(
        &test.app,
        "/api/auth/token",
        json!({ "refreshToken": rotated_refresh }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let new_access = exchanged["accessToken"].as_str().unwrap();
    let (status, greeting) = get_with_bearer(&test.app, "/api/hello/user", new_access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(greeting, "Hello user Anton!");
}

// ============================================================================
// Login rate limiting
// ============================================================================

fn wrong_password() -> serde_json::Value {
    json!({ "login": "Anton", "password": "wrong" })
}

#[tokio::test]
async fn test_login_rate_limited_per_peer() {
    let test = create_rate_limited_app(2);

    for _ in 0..2 {
        let (status, _) = post_json_from(
            &test.app,
            "/api/auth/login",
            wrong_password(),
            Client::peer("10.0.0.1:40000"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // A new source port is still the same client.
    let (status, _) = post_json_from(
        &test.app,
        "/api/auth/login",
        wrong_password(),
        Client::peer("10.0.0.1:40001"),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Another client still has its own budget.
    let (status, _) = post_json_from(
        &test.app,
        "/api/auth/login",
        wrong_password(),
        Client::peer("10.0.0.2:40000"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forwarded_for_ignored_without_trusted_proxy() {
    let test = create_rate_limited_app(2);
    let mut limited = 0;

    for i in 0..20 {
        let forwarded = format!("203.0.113.{}", i);
        let (status, _) = post_json_from(
            &test.app,
            "/api/auth/login",
            wrong_password(),
            Client::peer("10.0.0.1:40000").forwarded_for(&forwarded),
        )
        .await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }

    // Two attempts fit the burst; the rest share one bucket.
    assert!(limited >= 17, "only {} of 20 attempts were limited", limited);
}

#[tokio::test]
async fn test_login_without_client_ip_is_forbidden() {
    let test = create_rate_limited_app(2);

    let (status, _) = post_json_from(
        &test.app,
        "/api/auth/login",
        json!({ "login": "Anton", "password": "1234" }),
        Client::default(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A forwarding header alone does not identify the client.
    let (status, _) = post_json_from(
        &test.app,
        "/api/auth/login",
        json!({ "login": "Anton", "password": "1234" }),
        Client::default().forwarded_for("10.0.0.1"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_rate_limited_behind_proxy() {
    let test = create_rate_limited_app_behind_proxy(2);
    let proxy = Client::peer("192.168.0.10:50000");

    // Client-supplied entries before the proxy's own are ignored.
    for spoofed in ["1.1.1.1, 10.0.0.1", "2.2.2.2, 10.0.0.1"] {
        let (status, _) = post_json_from(
            &test.app,
            "/api/auth/login",
            wrong_password(),
            proxy.forwarded_for(spoofed),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = post_json_from(
        &test.app,
        "/api/auth/login",
        wrong_password(),
        proxy.forwarded_for("3.3.3.3, 10.0.0.1"),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = post_json_from(
        &test.app,
        "/api/auth/login",
        wrong_password(),
        proxy.forwarded_for("10.0.0.2"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The configured header is required; the peer address is not a fallback.
    let (status, _) =
        post_json_from(&test.app, "/api/auth/login", wrong_password(), proxy).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rate_limit_only_applies_to_login() {
    let test = create_rate_limited_app(1);
    let client = Client::peer("10.0.0.1:40000");

    let (status, body) = post_json_from(
        &test.app,
        "/api/auth/login",
        json!({ "login": "Anton", "password": "1234" }),
        client,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let refresh = body["refreshToken"].as_str().unwrap().to_string();

    for _ in 0..3 {
        let (status, _) = post_json_from(
            &test.app,
            "/api/auth/token",
            json!({ "refreshToken": refresh }),
            client,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
