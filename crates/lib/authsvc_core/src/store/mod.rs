//! Credential store: users and hashed refresh records.
//!
//! The orchestrator only sees the [`CredentialStore`] trait. Two
//! implementations ship with the crate: PostgreSQL for deployments and an
//! in-process map for tests and embedding.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::auth::{NewRefreshRecord, RefreshRecord, User};

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Durable mapping from (user, access-token id) to a hashed refresh record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new user. A duplicate email is a `Conflict`.
    async fn create_user(&self, user_id: &str, email: &str) -> Result<()>;

    /// Fetch a user by id. Absence is a `NotFound` error.
    async fn find_user_by_id(&self, user_id: &str) -> Result<User>;

    /// Fetch a user by email. Absence is a `NotFound` error.
    async fn find_user_by_email(&self, email: &str) -> Result<User>;

    /// Persist a refresh record, returning it with its assigned id.
    /// A duplicate `bound_token_id` is a `Conflict`.
    async fn insert_refresh_record(&self, record: NewRefreshRecord) -> Result<RefreshRecord>;

    /// Point lookup by owner and bound access-token id.
    async fn find_refresh_record(&self, user_id: &str, token_id: &str) -> Result<RefreshRecord>;

    /// Delete a record by id. Deleting an absent id is not an error.
    async fn delete_refresh_record(&self, record_id: i64) -> Result<()> {
        self.take_refresh_record(record_id).await.map(|_| ())
    }

    /// Delete a record by id, reporting whether this call removed it.
    ///
    /// Of any number of concurrent calls for the same id, at most one
    /// returns `true`.
    async fn take_refresh_record(&self, record_id: i64) -> Result<bool>;

    /// Remove records whose `expires_at` is at or before `now`.
    async fn purge_expired_refresh_records(&self, now: DateTime<Utc>) -> Result<u64>;
}
