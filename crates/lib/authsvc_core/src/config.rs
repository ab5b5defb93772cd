//! Token lifetime and signing configuration.

use std::path::{Path, PathBuf};

use chrono::Duration;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;

use crate::error::{AuthError, Result};

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;

/// Refresh token lifetime: 30 days.
pub const DEFAULT_REFRESH_TTL_MINUTES: i64 = 30 * 24 * 60;

/// bcrypt cost factor for refresh secrets.
pub const DEFAULT_HASH_COST: u32 = 10;

/// bcrypt accepts costs in `4..=31`.
const MIN_HASH_COST: u32 = 4;
const MAX_HASH_COST: u32 = 31;

/// Longest accepted token lifetime: 100 years.
const MAX_TTL_MINUTES: i64 = 100 * 365 * 24 * 60;

/// Configuration for the credential issuer and the orchestrator.
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC signing key for access tokens.
    pub signing_key: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// bcrypt cost used when hashing refresh secrets.
    pub hash_cost: u32,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("signing_key", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("hash_cost", &self.hash_cost)
            .finish()
    }
}

impl TokenConfig {
    /// Build a config with default lifetimes around the given signing key.
    pub fn new(signing_key: impl Into<Vec<u8>>) -> Self {
        Self {
            signing_key: signing_key.into(),
            access_ttl: Duration::minutes(DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl: Duration::minutes(DEFAULT_REFRESH_TTL_MINUTES),
            hash_cost: DEFAULT_HASH_COST,
        }
    }

    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                        |
    /// |------------------------------|--------------------------------|
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file  |
    /// | `ACCESS_TOKEN_TTL_MINUTES`   | `15`                           |
    /// | `REFRESH_TOKEN_TTL_MINUTES`  | `43200` (30 days)              |
    /// | `REFRESH_HASH_COST`          | `10`                           |
    pub fn from_env() -> Result<Self> {
        let config = Self {
            signing_key: resolve_jwt_secret()?.into_bytes(),
            access_ttl: env_minutes("ACCESS_TOKEN_TTL_MINUTES", DEFAULT_ACCESS_TTL_MINUTES)?,
            refresh_ttl: env_minutes("REFRESH_TOKEN_TTL_MINUTES", DEFAULT_REFRESH_TTL_MINUTES)?,
            hash_cost: env_number("REFRESH_HASH_COST", DEFAULT_HASH_COST)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the issuer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.signing_key.is_empty() {
            return Err(AuthError::invalid_input("signing key must not be empty"));
        }
        if self.access_ttl <= Duration::zero() || self.refresh_ttl <= Duration::zero() {
            return Err(AuthError::invalid_input("token lifetimes must be positive"));
        }
        let max_ttl = Duration::minutes(MAX_TTL_MINUTES);
        if self.access_ttl > max_ttl || self.refresh_ttl > max_ttl {
            return Err(AuthError::invalid_input(format!(
                "token lifetimes must not exceed {MAX_TTL_MINUTES} minutes"
            )));
        }
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.hash_cost) {
            return Err(AuthError::invalid_input(format!(
                "hash cost must be between {} and {}",
                MIN_HASH_COST,
                MAX_HASH_COST
            )));
        }
        Ok(())
    }
}

/// Parse a numeric environment variable, falling back to `default` when unset.
fn env_number<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AuthError::invalid_input(format!("{name} is not a valid number: {raw}"))),
        _ => Ok(default),
    }
}

/// Parse a lifetime in minutes, rejecting values `Duration` cannot hold.
fn env_minutes(name: &str, default: i64) -> Result<Duration> {
    let minutes = env_number(name, default)?;
    Duration::try_minutes(minutes)
        .ok_or_else(|| AuthError::invalid_input(format!("{name} is out of range: {minutes}")))
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> Result<String> {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return Ok(secret);
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return Ok(secret);
    }
    load_or_create_secret(&jwt_secret_path())
}

/// Read the secret at `path`, generating and persisting a new one if absent.
pub fn load_or_create_secret(path: &Path) -> Result<String> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AuthError::internal(format!("create {}: {e}", parent.display())).with_source(e)
        })?;
    }
    std::fs::write(path, &secret).map_err(|e| {
        AuthError::internal(format!("write {}: {e}", path.display())).with_source(e)
    })?;
    info!(path = %path.display(), "generated new JWT secret");
    Ok(secret)
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("authsvc")
        .join("jwt-secret")
}
