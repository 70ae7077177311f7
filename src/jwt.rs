//! JWT token generation and validation.
//!
//! Dual-secret codec: access tokens and refresh tokens are signed with
//! independent secrets, so compromise of one kind cannot be used to mint
//! the other. Access tokens are short-lived and stateless; refresh tokens
//! are long-lived and only honored while their exact string is stored in
//! the refresh token table.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// JWT claims for access tokens (stateless).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user UUID)
    pub sub: String,
    /// Display name
    pub name: String,
    /// Account email
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (user UUID)
    pub sub: String,
    /// Display name
    pub name: String,
    /// Account email
    pub email: String,
    /// Random nonce. Two refresh tokens minted for the same user within the
    /// same second must still be distinct strings, because the store keys on
    /// the token string alone.
    pub nonce: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token duration: 10 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 10 * 60;

/// Refresh token duration: 1 year
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Codec for signing and verifying both token kinds.
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: u64,
    refresh_ttl: u64,
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Token expired
    Expired,
    /// Bad signature or malformed token
    Invalid(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Expired => write!(f, "Token expired"),
            JwtError::Invalid(e) => write!(f, "Invalid token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}

fn unix_now() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

fn decode_error(e: jsonwebtoken::errors::Error) -> JwtError {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Invalid(e),
    }
}

impl TokenCodec {
    /// Create a new codec with separate access and refresh secrets and the
    /// default TTLs (10 minutes / 1 year).
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl: ACCESS_TOKEN_DURATION_SECS,
            refresh_ttl: REFRESH_TOKEN_DURATION_SECS,
        }
    }

    /// Override the access token TTL. Zero makes every issued access token
    /// already expired, which protected routes must report as 403.
    pub fn with_access_ttl(mut self, seconds: u64) -> Self {
        self.access_ttl = seconds;
        self
    }

    /// Access token TTL in seconds.
    pub fn access_ttl(&self) -> u64 {
        self.access_ttl
    }

    /// Refresh token TTL in seconds.
    pub fn refresh_ttl(&self) -> u64 {
        self.refresh_ttl
    }

    /// Sign a new access token for a user. No side effects.
    pub fn issue_access_token(
        &self,
        user_uuid: &str,
        name: &str,
        email: &str,
    ) -> Result<String, JwtError> {
        let now = unix_now()?;
        let claims = AccessClaims {
            sub: user_uuid.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + self.access_ttl,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(JwtError::Encoding)
    }

    /// Sign a new refresh token for a user, with a fresh random nonce.
    pub fn issue_refresh_token(
        &self,
        user_uuid: &str,
        name: &str,
        email: &str,
    ) -> Result<String, JwtError> {
        let now = unix_now()?;
        let nonce: u64 = rand::rng().random();
        let claims = RefreshClaims {
            sub: user_uuid.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            nonce: format!("{:016x}", nonce),
            iat: now,
            exp: now + self.refresh_ttl,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(JwtError::Encoding)
    }

    /// Validate and decode an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<AccessClaims>(token, &self.access_decoding, &validation)
            .map(|data| data.claims)
            .map_err(decode_error)
    }

    /// Validate and decode a refresh token.
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<RefreshClaims>(token, &self.refresh_decoding, &validation)
            .map(|data| data.claims)
            .map_err(decode_error)
    }
}
