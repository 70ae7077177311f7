//! Refresh token storage.
//!
//! Each row is one currently-valid refresh token for a user; a user may hold
//! several at once (one per device/session). Access tokens are stateless and
//! never stored. A refresh token whose signature verifies but whose string is
//! absent from this table has already been spent or revoked - presenting one
//! is treated as a reuse signal by the session service.

use sqlx::sqlite::SqlitePool;

use super::invoice::timestamp_to_datetime;

/// Store for the per-user set of live refresh tokens.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a token to a user's set. `expires_at` is the token's exp claim
    /// (Unix seconds), kept so expired rows can be pruned.
    pub async fn add(&self, user_id: i64, token: &str, expires_at: u64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(token)
            .bind(timestamp_to_datetime(expires_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove a specific token from a user's set.
    /// Returns false when the token was not stored - the reuse signal.
    pub async fn remove(&self, user_id: i64, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ? AND token = ?")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every token a user holds (revoke all sessions).
    pub async fn clear(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Reverse lookup: which user, if any, currently holds this exact token.
    pub async fn find_owner(&self, token: &str) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    /// List a user's live tokens, oldest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT token FROM refresh_tokens WHERE user_id = ? ORDER BY id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Delete all tokens past their expiry.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
