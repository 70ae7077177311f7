//! Authentication error types for the request gate.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Rejection for the [`Auth`](super::Auth) extractor.
///
/// Missing credentials and unknown subjects are 401 so the client knows it
/// has no session; an invalid or expired token is 403, the signal that a
/// silent refresh is worth attempting.
#[derive(Debug)]
pub enum AuthError {
    /// No `Authorization: Bearer` header present
    MissingToken,
    /// Token present but invalid or expired
    InvalidToken,
    /// Token verified but its subject no longer resolves to a user
    UserNotFound,
    /// Database failure while resolving the subject
    DatabaseError,
}

impl AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::FORBIDDEN,
            AuthError::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Not authenticated",
            AuthError::InvalidToken => "Invalid or expired token",
            AuthError::UserNotFound => "User not found",
            AuthError::DatabaseError => "Database error",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
