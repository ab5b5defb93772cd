//! Credential issuer.
//!
//! Signs and verifies access tokens, mints refresh secrets and checks the
//! binding between a stored refresh record and a presented pair. Pure apart
//! from randomness; no storage access.

pub mod jwt;
pub mod secret;

use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;

use crate::clock::Clock;
use crate::config::TokenConfig;
use crate::error::{AuthError, Result};
use crate::models::auth::{AccessClaims, RefreshRecord};

/// Why an access token failed verification.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Signature and structure are valid but the token is past `exp`.
    /// The claims are still usable for a refresh.
    #[error("access token expired")]
    Expired(AccessClaims),

    #[error("invalid access token: {0}")]
    Invalid(String),
}

impl From<VerifyError> for AuthError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Expired(_) => AuthError::token_expired("access token expired"),
            VerifyError::Invalid(reason) => AuthError::invalid_token(reason),
        }
    }
}

/// Capability interface over the issuer, so the orchestrator can run
/// against a stub in tests.
pub trait TokenIssuer: Send + Sync {
    /// Sign a new access token. Returns the token and its claims.
    fn issue_access_token(&self, user_id: &str, client_ip: &str)
    -> Result<(String, AccessClaims)>;

    fn verify_access_token(&self, token: &str) -> std::result::Result<AccessClaims, VerifyError>;

    fn issue_refresh_secret(&self) -> String;

    fn hash_refresh_secret(&self, secret: &str) -> Result<String>;

    fn verify_refresh_binding(
        &self,
        record: &RefreshRecord,
        secret: &str,
        token_id: &str,
    ) -> Result<()>;

    /// Lifetime of access tokens issued by this issuer.
    fn access_ttl(&self) -> Duration;
}

/// HS512 + bcrypt issuer. The signing key is fixed at construction.
pub struct CredentialIssuer {
    signing_key: Vec<u8>,
    access_ttl: Duration,
    hash_cost: u32,
    clock: Arc<dyn Clock>,
}

impl CredentialIssuer {
    pub fn new(config: &TokenConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            signing_key: config.signing_key.clone(),
            access_ttl: config.access_ttl,
            hash_cost: config.hash_cost,
            clock,
        }
    }
}

impl TokenIssuer for CredentialIssuer {
    fn issue_access_token(
        &self,
        user_id: &str,
        client_ip: &str,
    ) -> Result<(String, AccessClaims)> {
        jwt::generate_access_token(
            user_id,
            client_ip,
            &self.signing_key,
            self.access_ttl,
            self.clock.now(),
        )
    }

    fn verify_access_token(&self, token: &str) -> std::result::Result<AccessClaims, VerifyError> {
        jwt::verify_access_token(token, &self.signing_key, self.clock.now())
    }

    fn issue_refresh_secret(&self) -> String {
        secret::generate_refresh_secret()
    }

    fn hash_refresh_secret(&self, secret: &str) -> Result<String> {
        secret::hash_refresh_secret(secret, self.hash_cost)
    }

    fn verify_refresh_binding(
        &self,
        record: &RefreshRecord,
        secret: &str,
        token_id: &str,
    ) -> Result<()> {
        secret::verify_refresh_binding(record, secret, token_id)
    }

    fn access_ttl(&self) -> Duration {
        self.access_ttl
    }
}
