mod auth;
mod customers;
mod error;
mod invoices;
mod users;

use axum::{Json, Router, http::StatusCode, routing::get};
use std::sync::Arc;

use crate::auth::{CookieConfig, SessionService};
use crate::db::Database;
use crate::jwt::TokenCodec;
use crate::rate_limit::RateLimitConfig;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    codec: Arc<TokenCodec>,
    cookie: CookieConfig,
) -> Router {
    let rate_limit_config = Arc::new(RateLimitConfig::new());

    let auth_state = auth::AuthState {
        session: SessionService::new(db.clone(), codec.clone()),
        cookie,
        rate_limit_config: rate_limit_config.clone(),
    };

    let users_state = users::UsersState {
        db: db.clone(),
        codec: codec.clone(),
        rate_limit_config,
    };

    let customers_state = customers::CustomersState {
        db: db.clone(),
        codec: codec.clone(),
    };

    let invoices_state = invoices::InvoicesState { db, codec };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/api/users", users::router(users_state))
        .nest("/api/customers", customers::router(customers_state))
        .nest("/api/invoices", invoices::router(invoices_state))
        .route("/api/status", get(status))
}

async fn status() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
