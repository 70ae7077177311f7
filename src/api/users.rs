//! Account signup and profile endpoints.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, Json, ResultExt};
use crate::auth::Auth;
use crate::db::{Address, Database, NewUser};
use crate::impl_has_auth_backend;
use crate::jwt::TokenCodec;
use crate::rate_limit::{RateLimitConfig, rate_limit_user_create};

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let signup_router = Router::new()
        .route("/", post(create_user))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_user_create,
        ));

    Router::new()
        .route("/me", get(current_user))
        .with_state(state)
        .merge(signup_router)
}

#[derive(Serialize)]
struct ProfileResponse {
    uuid: String,
    name: String,
    email: String,
    address: Address,
}

async fn current_user(Auth(user): Auth) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        uuid: user.uuid,
        name: user.name,
        email: user.email,
        address: user.address,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    name: String,
    email: String,
    password: String,
    password_confirmation: String,
    address: Address,
}

#[derive(Serialize)]
struct CreateUserResponse {
    uuid: String,
    name: String,
    email: String,
}

/// Bcrypt work factor. Lowered under test-mode so suites that create many
/// accounts stay fast.
#[cfg(not(feature = "test-mode"))]
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(feature = "test-mode")]
const BCRYPT_COST: u32 = 4;

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 || password.len() > 32 {
        return Err(ApiError::bad_request(
            "Password must be between 8 and 32 characters",
        ));
    }
    if password.contains(' ') {
        return Err(ApiError::bad_request("Password cannot contain spaces"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ApiError::bad_request(
            "Password must contain at least one number",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ApiError::bad_request(
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ApiError::bad_request(
            "Password must contain at least one uppercase letter",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ApiError::bad_request("Invalid email address"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(())
}

fn validate_address(address: &Address) -> Result<(), ApiError> {
    if address.line1.trim().is_empty()
        || address.city.trim().is_empty()
        || address.postcode.trim().is_empty()
    {
        return Err(ApiError::bad_request(
            "Address line 1, city and postcode are required",
        ));
    }
    Ok(())
}

async fn create_user(
    State(state): State<UsersState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim();
    let email = payload.email.trim();

    if name.is_empty() {
        return Err(ApiError::bad_request("Name cannot be empty"));
    }
    if name.len() > 70 {
        return Err(ApiError::bad_request("Name is too long"));
    }
    validate_email(email)?;
    validate_password(&payload.password)?;
    if payload.password != payload.password_confirmation {
        return Err(ApiError::bad_request("Passwords do not match"));
    }
    validate_address(&payload.address)?;

    let available = state
        .db
        .users()
        .is_email_available(email)
        .await
        .db_err("Failed to check email availability")?;
    if !available {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = bcrypt::hash(&payload.password, BCRYPT_COST).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Internal error")
    })?;

    let uuid = uuid::Uuid::new_v4().to_string();
    state
        .db
        .users()
        .create(&NewUser {
            uuid: uuid.clone(),
            email: email.to_string(),
            name: name.to_string(),
            password_hash,
            address: payload.address,
        })
        .await
        .db_err("Failed to create user")?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            uuid,
            name: name.to_string(),
            email: email.to_string(),
        }),
    ))
}
