//! In-process credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::CredentialStore;
use crate::error::{AuthError, Result};
use crate::models::auth::{NewRefreshRecord, RefreshRecord, User};

#[derive(Default)]
struct Tables {
    /// Keyed by user id.
    users: HashMap<String, User>,
    /// Keyed by record id.
    refresh: HashMap<i64, RefreshRecord>,
    next_record_id: i64,
}

/// `CredentialStore` backed by hash maps behind a single lock.
///
/// Enforces the same uniqueness rules as the PostgreSQL schema: unique
/// email, unique bound token id, and records must reference an existing user.
#[derive(Default)]
pub struct MemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live refresh records.
    pub async fn refresh_record_count(&self) -> usize {
        self.tables.read().await.refresh.len()
    }

    /// All live refresh records owned by `user_id`, ordered by id.
    pub async fn refresh_records_for(&self, user_id: &str) -> Vec<RefreshRecord> {
        let tables = self.tables.read().await;
        let mut records: Vec<RefreshRecord> = tables
            .refresh
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_user(&self, user_id: &str, email: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(user_id) {
            return Err(AuthError::conflict(format!("user '{user_id}' already exists")));
        }
        if tables.users.values().any(|u| u.email == email) {
            return Err(AuthError::conflict(format!("email '{email}' already exists")));
        }
        tables.users.insert(
            user_id.to_string(),
            User {
                id: user_id.to_string(),
                email: email.to_string(),
            },
        );
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<User> {
        self.tables
            .read()
            .await
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| AuthError::not_found(format!("user '{user_id}' not found")))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<User> {
        self.tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| AuthError::not_found("user not found"))
    }

    async fn insert_refresh_record(&self, record: NewRefreshRecord) -> Result<RefreshRecord> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&record.user_id) {
            return Err(AuthError::invalid_input(format!(
                "user '{}' does not exist",
                record.user_id
            )));
        }
        if tables
            .refresh
            .values()
            .any(|r| r.bound_token_id == record.bound_token_id)
        {
            return Err(AuthError::conflict(format!(
                "jti '{}' already exists",
                record.bound_token_id
            )));
        }
        tables.next_record_id += 1;
        let stored = record.with_id(tables.next_record_id);
        tables.refresh.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_refresh_record(&self, user_id: &str, token_id: &str) -> Result<RefreshRecord> {
        self.tables
            .read()
            .await
            .refresh
            .values()
            .find(|r| r.user_id == user_id && r.bound_token_id == token_id)
            .cloned()
            .ok_or_else(|| AuthError::not_found("refresh token not found"))
    }

    async fn take_refresh_record(&self, record_id: i64) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .refresh
            .remove(&record_id)
            .is_some())
    }

    async fn purge_expired_refresh_records(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.refresh.len();
        tables.refresh.retain(|_, r| r.expires_at > now);
        Ok((before - tables.refresh.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::error::ErrorKind;

    fn new_record(user_id: &str, jti: &str, expires_at: DateTime<Utc>) -> NewRefreshRecord {
        NewRefreshRecord {
            user_id: user_id.into(),
            hashed_secret: "$2b$04$hash".into(),
            bound_token_id: jti.into(),
            client_ip: "1.1.1.1".into(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let store = MemoryCredentialStore::new();
        store.create_user("u1", "a@b.com").await.unwrap();
        let err = store.create_user("u2", "a@b.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn users_are_found_by_id_and_email() {
        let store = MemoryCredentialStore::new();
        store.create_user("u1", "a@b.com").await.unwrap();

        assert_eq!(store.find_user_by_id("u1").await.unwrap().email, "a@b.com");
        assert_eq!(store.find_user_by_email("a@b.com").await.unwrap().id, "u1");
        assert_eq!(
            store.find_user_by_id("nope").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn records_get_distinct_ids_and_unique_jti() {
        let store = MemoryCredentialStore::new();
        store.create_user("u1", "a@b.com").await.unwrap();
        let exp = Utc::now() + Duration::days(1);

        let a = store.insert_refresh_record(new_record("u1", "j1", exp)).await.unwrap();
        let b = store.insert_refresh_record(new_record("u1", "j2", exp)).await.unwrap();
        assert_ne!(a.id, b.id);

        let err = store
            .insert_refresh_record(new_record("u1", "j1", exp))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn record_for_unknown_user_is_rejected() {
        let store = MemoryCredentialStore::new();
        let err = store
            .insert_refresh_record(new_record("ghost", "j1", Utc::now()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn lookup_requires_owner_and_jti() {
        let store = MemoryCredentialStore::new();
        store.create_user("u1", "a@b.com").await.unwrap();
        store.create_user("u2", "c@d.com").await.unwrap();
        let exp = Utc::now() + Duration::days(1);
        store.insert_refresh_record(new_record("u1", "j1", exp)).await.unwrap();

        assert!(store.find_refresh_record("u1", "j1").await.is_ok());
        let err = store.find_refresh_record("u2", "j1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_take_reports_removal() {
        let store = MemoryCredentialStore::new();
        store.create_user("u1", "a@b.com").await.unwrap();
        let rec = store
            .insert_refresh_record(new_record("u1", "j1", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        assert!(store.take_refresh_record(rec.id).await.unwrap());
        assert!(!store.take_refresh_record(rec.id).await.unwrap());
        store.delete_refresh_record(rec.id).await.unwrap();
        assert_eq!(store.refresh_record_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_takes_have_a_single_winner() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.create_user("u1", "a@b.com").await.unwrap();
        let rec = store
            .insert_refresh_record(new_record("u1", "j1", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.take_refresh_record(rec.id).await.unwrap()
            }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn purge_removes_only_expired_records() {
        let store = MemoryCredentialStore::new();
        store.create_user("u1", "a@b.com").await.unwrap();
        let now = Utc::now();
        store
            .insert_refresh_record(new_record("u1", "old", now - Duration::minutes(1)))
            .await
            .unwrap();
        store
            .insert_refresh_record(new_record("u1", "edge", now))
            .await
            .unwrap();
        store
            .insert_refresh_record(new_record("u1", "live", now + Duration::minutes(1)))
            .await
            .unwrap();

        assert_eq!(store.purge_expired_refresh_records(now).await.unwrap(), 2);
        let left = store.refresh_records_for("u1").await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].bound_token_id, "live");
    }
}
