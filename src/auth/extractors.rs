//! Axum extractor gating protected routes on a bearer access token.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};

use super::errors::AuthError;
use super::state::HasAuthBackend;
use crate::db::User;

/// Extractor for endpoints that require authentication.
///
/// Verifies the `Authorization: Bearer` access token and resolves its
/// subject to a live user record, which is handed to the handler. Pure
/// read; nothing is mutated and no tokens are minted here - recovery from
/// an expired access token is the client's job via `/auth/refresh`.
pub struct Auth(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    header.strip_prefix("Bearer ")
}

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;

        let claims = state
            .codec()
            .verify_access_token(token)
            .map_err(|_| AuthError::InvalidToken)?;

        let user = state
            .db()
            .users()
            .get_by_uuid(&claims.sub)
            .await
            .map_err(|e| {
                tracing::error!("Failed to resolve token subject: {}", e);
                AuthError::DatabaseError
            })?
            .ok_or(AuthError::UserNotFound)?;

        Ok(Auth(user))
    }
}
