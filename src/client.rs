//! Client-side session manager.
//!
//! Wraps a [`reqwest::Client`] whose cookie store carries the refresh
//! cookie, while the access token lives only in memory behind a lock. Every
//! request goes out with `Authorization: Bearer` when a token is held; a 403
//! answer triggers one silent refresh and one retry of the original request.
//! Concurrent 403s coalesce into a single refresh call: waiters that find
//! the token already rotated while they queued reuse it instead of spending
//! the (single-use) refresh token again.

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub enum ClientError {
    /// Malformed base URL or path
    Url(url::ParseError),
    /// Transport-level failure
    Http(reqwest::Error),
    /// Server response missing the expected access token
    MalformedResponse,
    /// Request body failed to serialize
    Serialize(serde_json::Error),
    /// Login rejected (wrong credentials)
    Unauthorized,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Url(e) => write!(f, "Invalid URL: {}", e),
            ClientError::Http(e) => write!(f, "Request failed: {}", e),
            ClientError::MalformedResponse => write!(f, "Malformed server response"),
            ClientError::Serialize(e) => write!(f, "Failed to serialize request body: {}", e),
            ClientError::Unauthorized => write!(f, "Invalid email or password"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Http(e)
    }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        ClientError::Url(e)
    }
}

/// An authenticated API session. Cheap to clone; clones share the cookie
/// store, the held access token and the refresh coalescing lock.
#[derive(Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: Arc<RwLock<Option<String>>>,
    refresh_lock: Arc<Mutex<()>>,
}

impl SessionClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            access_token: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    /// The access token currently held in memory, if any.
    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn store_token_from(&self, response: reqwest::Response) -> Result<(), ClientError> {
        let body: Value = response.json().await?;
        let token = body
            .get("accessToken")
            .and_then(Value::as_str)
            .ok_or(ClientError::MalformedResponse)?;
        *self.access_token.write().await = Some(token.to_string());
        Ok(())
    }

    /// Authenticate, storing the access token in memory. The refresh cookie
    /// lands in the cookie store automatically.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.endpoint("/auth/login")?)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        let response = response.error_for_status()?;
        self.store_token_from(response).await
    }

    /// Attempt to restore a session from the refresh cookie, as on a page
    /// reload. Failure is not an error; it just leaves the client
    /// unauthenticated. Returns whether a session was restored.
    pub async fn restore_session(&self) -> Result<bool, ClientError> {
        match self.refresh().await {
            Ok(()) => Ok(true),
            Err(_) => {
                *self.access_token.write().await = None;
                Ok(false)
            }
        }
    }

    /// End the session locally and on the server.
    pub async fn logout(&self) -> Result<(), ClientError> {
        *self.access_token.write().await = None;
        self.http
            .get(self.endpoint("/auth/logout")?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn refresh(&self) -> Result<(), ClientError> {
        let response = self
            .http
            .get(self.endpoint("/auth/refresh")?)
            .send()
            .await?
            .error_for_status()?;
        self.store_token_from(response).await
    }

    /// Refresh unless another task already rotated the token while we were
    /// waiting for the lock. `stale` is the token the failed request used.
    async fn refresh_coalesced(&self, stale: Option<&str>) -> Result<(), ClientError> {
        let _guard = self.refresh_lock.lock().await;

        {
            let current = self.access_token.read().await;
            if current.as_deref() != stale {
                debug!("token already rotated by a concurrent refresh");
                return Ok(());
            }
        }

        self.refresh().await
    }

    /// Send a request with the bearer token attached, silently refreshing
    /// and retrying exactly once on 403. A failed refresh drops the local
    /// session and surfaces the original 403 response.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.endpoint(path)?;
        let token = self.access_token().await;

        let response = self.dispatch(method.clone(), url.clone(), body, token.as_deref()).await?;
        if response.status() != StatusCode::FORBIDDEN {
            return Ok(response);
        }

        // One retry after a silent refresh
        if self.refresh_coalesced(token.as_deref()).await.is_err() {
            *self.access_token.write().await = None;
            return Ok(response);
        }

        let token = self.access_token().await;
        self.dispatch(method, url, body, token.as_deref()).await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ClientError> {
        let body = serde_json::to_value(body).map_err(ClientError::Serialize)?;
        self.send(Method::POST, path, Some(&body)).await
    }

    pub async fn put<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ClientError> {
        let body = serde_json::to_value(body).map_err(ClientError::Serialize)?;
        self.send(Method::PUT, path, Some(&body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        self.send(Method::DELETE, path, None).await
    }
}
