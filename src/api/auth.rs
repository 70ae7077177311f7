//! Session API endpoints.
//!
//! - POST `/login` - Exchange credentials for an access token + refresh cookie
//! - GET `/refresh` - Rotate the refresh cookie and mint a new access token
//! - GET `/logout` - Revoke the presented refresh token and clear the cookie
//!
//! The refresh token never appears in a response body and the access token
//! never appears in a cookie. Every response that touches the session clears
//! the presented cookie before setting a replacement, so a failed refresh
//! cannot leave a stale cookie behind.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, Json};
use crate::auth::{CookieConfig, SessionService, get_cookie};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

#[derive(Clone)]
pub struct AuthState {
    pub session: SessionService,
    pub cookie: CookieConfig,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: AuthState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    Router::new()
        .route("/refresh", get(refresh))
        .route("/logout", get(logout))
        .with_state(state)
        .merge(login_router)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenResponse {
    access_token: String,
}

async fn login(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let presented = get_cookie(&headers, state.cookie.name);
    let tokens = state
        .session
        .login(payload.email.trim(), &payload.password, presented)
        .await?;

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, state.cookie.clear()),
            (SET_COOKIE, state.cookie.set(&tokens.refresh_token)),
        ]),
        Json(AccessTokenResponse {
            access_token: tokens.access_token,
        }),
    ))
}

async fn refresh(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let presented = get_cookie(&headers, state.cookie.name);

    match state.session.refresh(presented).await {
        Ok(tokens) => Ok((
            StatusCode::OK,
            AppendHeaders([
                (SET_COOKIE, state.cookie.clear()),
                (SET_COOKIE, state.cookie.set(&tokens.refresh_token)),
            ]),
            Json(AccessTokenResponse {
                access_token: tokens.access_token,
            }),
        )
            .into_response()),
        Err(e) => {
            // The presented cookie is dead either way; clear it alongside
            // the error so the browser does not keep replaying it.
            let error: ApiError = e.into();
            Ok((
                AppendHeaders([(SET_COOKIE, state.cookie.clear())]),
                error,
            )
                .into_response())
        }
    }
}

async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let presented = get_cookie(&headers, state.cookie.name);
    state.session.logout(presented).await?;

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, state.cookie.clear())]),
    ))
}
