//! PostgreSQL credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::CredentialStore;
use crate::error::{AuthError, Result};
use crate::models::auth::{NewRefreshRecord, RefreshRecord, User};

type RefreshRow = (i64, String, String, String, String, DateTime<Utc>);

/// `CredentialStore` over the `users` and `refresh_tokens` tables.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// User ids are UUIDs in the schema; anything else cannot exist.
fn parse_user_id(user_id: &str) -> Option<Uuid> {
    Uuid::parse_str(user_id).ok()
}

fn record_from_row(row: RefreshRow) -> RefreshRecord {
    let (id, user_id, hashed_secret, bound_token_id, client_ip, expires_at) = row;
    RefreshRecord {
        id,
        user_id,
        hashed_secret,
        bound_token_id,
        client_ip,
        expires_at,
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(&self, user_id: &str, email: &str) -> Result<()> {
        let id = parse_user_id(user_id)
            .ok_or_else(|| AuthError::invalid_input(format!("malformed user id '{user_id}'")))?;
        sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2)")
            .bind(id)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::from(e).context(format!("register user '{email}'")))?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<User> {
        let not_found = || AuthError::not_found(format!("user '{user_id}' not found"));
        let id = parse_user_id(user_id).ok_or_else(not_found)?;
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT id::text, email FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::from(e).context("get user"))?;
        row.map(|(id, email)| User { id, email })
            .ok_or_else(not_found)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<User> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT id::text, email FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::from(e).context("get user"))?;
        row.map(|(id, email)| User { id, email })
            .ok_or_else(|| AuthError::not_found("user not found"))
    }

    async fn insert_refresh_record(&self, record: NewRefreshRecord) -> Result<RefreshRecord> {
        let user_id = parse_user_id(&record.user_id).ok_or_else(|| {
            AuthError::invalid_input(format!("malformed user id '{}'", record.user_id))
        })?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO refresh_tokens \
             (user_id, hashed_secret, access_token_jti, client_ip, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(user_id)
        .bind(&record.hashed_secret)
        .bind(&record.bound_token_id)
        .bind(&record.client_ip)
        .bind(record.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AuthError::from(e).context("save refresh token"))?;
        Ok(record.with_id(id))
    }

    async fn find_refresh_record(&self, user_id: &str, token_id: &str) -> Result<RefreshRecord> {
        let not_found = || AuthError::not_found("refresh token not found");
        let uid = parse_user_id(user_id).ok_or_else(not_found)?;
        let row = sqlx::query_as::<_, RefreshRow>(
            "SELECT id, user_id::text, hashed_secret, access_token_jti, client_ip, expires_at \
             FROM refresh_tokens \
             WHERE user_id = $1 AND access_token_jti = $2",
        )
        .bind(uid)
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::from(e).context("get refresh token"))?;
        row.map(record_from_row).ok_or_else(not_found)
    }

    async fn take_refresh_record(&self, record_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::from(e).context("revoke refresh token"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired_refresh_records(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::from(e).context("purge refresh tokens"))?;
        Ok(result.rows_affected())
    }
}
