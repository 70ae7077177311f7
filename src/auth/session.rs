//! Session lifecycle: login, refresh token rotation, logout.
//!
//! A refresh token is honored only while its exact string is stored for its
//! subject. Every successful refresh replaces the presented token with a
//! fresh one (rotation). A syntactically valid token that is no longer
//! stored has already been spent: presenting one is treated as evidence of
//! theft and revokes every session the account holds.
//!
//! Rotation is not transactionally atomic against concurrent refreshes with
//! the same token: the first to persist wins and the loser trips reuse
//! detection, revoking all sessions. Known limitation of this design.

use std::sync::Arc;

use tracing::warn;

use crate::db::{Database, User};
use crate::jwt::{JwtError, TokenCodec};

/// Outcome of a successful login or refresh.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    /// Returned in the response body, held in client memory.
    pub access_token: String,
    /// Set as the HTTP-only refresh cookie, never in the body.
    pub refresh_token: String,
}

/// Session lifecycle failures, mapped to HTTP statuses at the API layer.
#[derive(Debug)]
pub enum SessionError {
    /// Unknown email or wrong password; deliberately indistinguishable (401)
    InvalidCredentials,
    /// No refresh cookie presented where one is required (401)
    MissingCookie,
    /// Refresh token failed signature or expiry verification (403)
    InvalidRefreshToken,
    /// Verified refresh token that is no longer stored; all of the
    /// subject's sessions have been revoked (403)
    ReuseDetected,
    /// Token encoding failure (500)
    Jwt(JwtError),
    /// Database failure (500)
    Db(sqlx::Error),
    /// Password hashing failure (500)
    Hash(bcrypt::BcryptError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidCredentials => write!(f, "Invalid email or password"),
            SessionError::MissingCookie => write!(f, "No refresh token cookie"),
            SessionError::InvalidRefreshToken => write!(f, "Invalid or expired refresh token"),
            SessionError::ReuseDetected => write!(f, "Refresh token reuse detected"),
            SessionError::Jwt(e) => write!(f, "Token error: {}", e),
            SessionError::Db(e) => write!(f, "Database error: {}", e),
            SessionError::Hash(e) => write!(f, "Hash error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Db(e)
    }
}

impl From<JwtError> for SessionError {
    fn from(e: JwtError) -> Self {
        SessionError::Jwt(e)
    }
}

/// Orchestrates the session lifecycle over the token codec and the refresh
/// token store.
#[derive(Clone)]
pub struct SessionService {
    db: Database,
    codec: Arc<TokenCodec>,
}

impl SessionService {
    pub fn new(db: Database, codec: Arc<TokenCodec>) -> Self {
        Self { db, codec }
    }

    fn issue_pair(&self, user: &User) -> Result<SessionTokens, SessionError> {
        let access_token = self
            .codec
            .issue_access_token(&user.uuid, &user.name, &user.email)?;
        let refresh_token = self
            .codec
            .issue_refresh_token(&user.uuid, &user.name, &user.email)?;
        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    async fn store_refresh_token(&self, user_id: i64, token: &str) -> Result<(), SessionError> {
        let claims = self.codec.verify_refresh_token(token)?;
        self.db.refresh_tokens().add(user_id, token, claims.exp).await?;
        Ok(())
    }

    /// Authenticate with email and password, issuing a fresh token pair.
    ///
    /// If the browser presented a refresh cookie alongside the login, that
    /// token is being replaced: it is removed from the user's set. A
    /// presented token that no user holds at all is a stale or stolen token
    /// being replayed - the authenticating user's whole set is cleared
    /// before the new token is added, so a thief holding an old cookie
    /// cannot keep a live session past this login.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        presented_cookie: Option<&str>,
    ) -> Result<SessionTokens, SessionError> {
        let user = self.db.users().get_by_email(email).await?;

        // Verify against a dummy hash when the user is unknown so the two
        // failure modes take similar time and the response cannot tell them
        // apart.
        let password_correct = match &user {
            Some(user) => bcrypt::verify(password, &user.password_hash)
                .map_err(SessionError::Hash)?,
            None => {
                let _ = bcrypt::verify(password, DUMMY_HASH);
                false
            }
        };

        let Some(user) = user else {
            return Err(SessionError::InvalidCredentials);
        };
        if !password_correct {
            return Err(SessionError::InvalidCredentials);
        }

        let tokens = self.issue_pair(&user)?;

        if let Some(presented) = presented_cookie {
            let owner = self.db.refresh_tokens().find_owner(presented).await?;
            match owner {
                None => {
                    // Scenario: a token was stolen, the victim's session was
                    // since rotated or revoked, and the thief's copy is now
                    // presented at login. Nothing holds this token, so it
                    // cannot be trusted to say which sessions are legitimate.
                    warn!(user = %user.uuid, "attempted refresh token reuse at login");
                    self.db.refresh_tokens().clear(user.id).await?;
                }
                Some(_) => {
                    // Normal re-login on this device: the presented token is
                    // being replaced by the new one.
                    self.db.refresh_tokens().remove(user.id, presented).await?;
                }
            }
        }

        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        Ok(tokens)
    }

    /// Exchange a refresh token for a new token pair, rotating it.
    pub async fn refresh(
        &self,
        presented_cookie: Option<&str>,
    ) -> Result<SessionTokens, SessionError> {
        let presented = presented_cookie.ok_or(SessionError::MissingCookie)?;

        let claims = self
            .codec
            .verify_refresh_token(presented)
            .map_err(|_| SessionError::InvalidRefreshToken)?;

        let user = self
            .db
            .users()
            .get_by_uuid(&claims.sub)
            .await?
            .ok_or(SessionError::InvalidRefreshToken)?;

        // The removal doubles as the membership check: a verified token that
        // was not stored has already been spent. Revoke everything the
        // subject holds - an attacker replayed this token, or the user's
        // own replay lost a rotation race; either way no stored token can
        // be trusted to be in the right hands.
        let was_stored = self.db.refresh_tokens().remove(user.id, presented).await?;
        if !was_stored {
            warn!(user = %user.uuid, "attempted refresh token reuse");
            self.db.refresh_tokens().clear(user.id).await?;
            return Err(SessionError::ReuseDetected);
        }

        let tokens = self.issue_pair(&user)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        Ok(tokens)
    }

    /// Revoke the presented refresh token. Always succeeds; with no cookie
    /// or an unrecognized token there is simply nothing to revoke. Other
    /// sessions' tokens are left intact.
    pub async fn logout(&self, presented_cookie: Option<&str>) -> Result<(), SessionError> {
        let Some(presented) = presented_cookie else {
            return Ok(());
        };

        let Some(owner_id) = self.db.refresh_tokens().find_owner(presented).await? else {
            return Ok(());
        };

        self.db.refresh_tokens().remove(owner_id, presented).await?;
        Ok(())
    }
}

/// bcrypt hash of an unguessable string, used to equalize login timing for
/// unknown emails.
const DUMMY_HASH: &str = "$2b$12$LQvJdGYbXv9PDiEsp3mDVeC05t6grCCNX1HH6pJVzwY0r6mO6O2hi";
