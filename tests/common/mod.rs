#![allow(dead_code)]

//! Shared helpers for integration tests: spawn a real server on a random
//! port and drive it over HTTP.

use mint_invoicing::db::Database;
use mint_invoicing::{ServerConfig, start_server};
use std::net::SocketAddr;

pub const ACCESS_SECRET: &[u8] = b"integration-test-access-secret-0123456789";
pub const REFRESH_SECRET: &[u8] = b"integration-test-refresh-secret-0123456789";

pub const PASSWORD: &str = "Sup3rSecret";

pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    /// Handle to the server's database, for tests that manipulate state
    /// no endpoint exposes (e.g. revoking sessions out from under a client).
    pub db: Database,
}

async fn spawn(access_ttl_secs: Option<u64>) -> TestServer {
    let db = Database::open(":memory:").await.expect("open database");
    let config = ServerConfig {
        db: db.clone(),
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        access_ttl_secs,
        secure_cookies: false,
        partitioned_cookies: false,
        cors_origins: vec![],
    };
    let (_handle, addr) = start_server(config, 0).await;
    TestServer {
        addr,
        base_url: format!("http://{}", addr),
        db,
    }
}

pub async fn spawn_server() -> TestServer {
    spawn(None).await
}

/// Spawn a server whose access tokens expire after the given number of
/// seconds. Zero makes every minted access token immediately invalid.
pub async fn spawn_server_with_access_ttl(seconds: u64) -> TestServer {
    spawn(Some(seconds)).await
}

/// A plain HTTP client with no cookie store; tests that care about the
/// refresh cookie manage it by hand for precise control.
pub fn bare_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Pull the refresh cookie value out of a response's Set-Cookie headers.
/// Returns the last `jwt=` value, or None when the response only clears it.
pub fn refresh_cookie(response: &reqwest::Response) -> Option<String> {
    let mut value = None;
    for header in response.headers().get_all(reqwest::header::SET_COOKIE) {
        let Ok(cookie) = header.to_str() else { continue };
        let Some(rest) = cookie.strip_prefix("jwt=") else {
            continue;
        };
        let token = rest.split(';').next().unwrap_or("").to_string();
        if !token.is_empty() {
            value = Some(token);
        }
    }
    value
}

pub fn signup_body(name: &str, email: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "email": email,
        "password": PASSWORD,
        "passwordConfirmation": PASSWORD,
        "address": {
            "line1": "1 High Street",
            "city": "Bristol",
            "postcode": "BS1 1AA"
        }
    })
}

pub async fn signup(server: &TestServer, email: &str) {
    let response = bare_client()
        .post(format!("{}/api/users", server.base_url))
        .json(&signup_body("Test User", email))
        .send()
        .await
        .expect("signup request");
    assert_eq!(response.status(), 201, "signup failed for {}", email);
}

/// Log in with the test password. Returns (access token, refresh cookie).
pub async fn login(server: &TestServer, email: &str) -> (String, String) {
    let response = bare_client()
        .post(format!("{}/auth/login", server.base_url))
        .json(&serde_json::json!({ "email": email, "password": PASSWORD }))
        .send()
        .await
        .expect("login request");
    assert_eq!(response.status(), 200, "login failed for {}", email);

    let cookie = refresh_cookie(&response).expect("login sets refresh cookie");
    let body: serde_json::Value = response.json().await.expect("login body");
    let token = body["accessToken"]
        .as_str()
        .expect("login returns accessToken")
        .to_string();
    (token, cookie)
}

/// Create an account and log in. Returns (access token, refresh cookie).
pub async fn signup_and_login(server: &TestServer, email: &str) -> (String, String) {
    signup(server, email).await;
    login(server, email).await
}
