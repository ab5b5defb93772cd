//! Token lifecycle orchestration: register, login, refresh and revoke.
//!
//! A refresh consumes exactly one stored record and produces exactly one
//! new pair. The old record is retired with a conditional delete, so of
//! several requests racing on the same stale pair only one can win.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{CredentialIssuer, TokenIssuer, VerifyError};
use crate::clock::{Clock, SystemClock};
use crate::config::TokenConfig;
use crate::error::{AuthError, ErrorKind, Result};
use crate::models::auth::{
    AccessClaims, IpChangeNotice, NewRefreshRecord, RefreshRecord, Registration, TokenPair,
};
use crate::notify::{LogNotifier, SecurityNotifier, dispatch_ip_change};
use crate::store::CredentialStore;

/// The single message callers see for any refresh/revoke credential failure.
const INVALID_CREDENTIALS: &str = "invalid access or refresh token";

/// A pair that has been signed and hashed but not yet persisted.
struct MintedPair {
    tokens: TokenPair,
    record: NewRefreshRecord,
}

/// Orchestrates the credential lifecycle over a store and an issuer.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    issuer: Arc<dyn TokenIssuer>,
    notifier: Arc<dyn SecurityNotifier>,
    clock: Arc<dyn Clock>,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        issuer: Arc<dyn TokenIssuer>,
        notifier: Arc<dyn SecurityNotifier>,
        clock: Arc<dyn Clock>,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            store,
            issuer,
            notifier,
            clock,
            refresh_ttl,
        }
    }

    /// Production wiring: HS512/bcrypt issuer, wall clock, log notifier.
    pub fn from_config(config: &TokenConfig, store: Arc<dyn CredentialStore>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let issuer = Arc::new(CredentialIssuer::new(config, clock.clone()));
        Self::new(
            store,
            issuer,
            Arc::new(LogNotifier),
            clock,
            config.refresh_ttl,
        )
    }

    /// Replace the security notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn SecurityNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Create a user and hand out their first credential pair.
    pub async fn register(&self, email: &str, client_ip: &str) -> Result<Registration> {
        let email = email.trim();
        validate_email(email)?;

        let user_id = Uuid::now_v7().to_string();
        self.store.create_user(&user_id, email).await?;
        info!(user_id = %user_id, "user registered");

        let tokens = self
            .issue_pair(&user_id, client_ip)
            .await
            .map_err(|e| e.context("issue initial credentials"))?;
        Ok(Registration { user_id, tokens })
    }

    /// Issue a new pair for an existing user.
    pub async fn login(&self, user_id: &str, client_ip: &str) -> Result<TokenPair> {
        self.store.find_user_by_id(user_id).await?;
        let tokens = self.issue_pair(user_id, client_ip).await?;
        info!(user_id, "credentials issued");
        Ok(tokens)
    }

    /// Exchange a (possibly expired) access token plus its refresh secret
    /// for a new pair, retiring the old one.
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_secret: &str,
        client_ip: &str,
    ) -> Result<TokenPair> {
        let (claims, record) = self.authenticate_pair(access_token, refresh_secret).await?;

        // Mint before retiring so a signing or hashing failure leaves the
        // old pair redeemable.
        let minted = self
            .mint_pair(&claims.user_id, client_ip)
            .await
            .map_err(|e| e.context("rotate credentials"))?;

        if !self.store.take_refresh_record(record.id).await? {
            debug!(user_id = %claims.user_id, jti = %claims.token_id, "lost rotation race");
            return Err(AuthError::invalid_token(INVALID_CREDENTIALS));
        }

        if claims.bound_ip != client_ip {
            dispatch_ip_change(
                self.store.clone(),
                self.notifier.clone(),
                IpChangeNotice {
                    user_id: claims.user_id.clone(),
                    email: None,
                    previous_ip: claims.bound_ip.clone(),
                    new_ip: client_ip.to_string(),
                    at: self.clock.now(),
                },
            );
        }

        // A failure past this point leaves the user without a live pair;
        // they must log in again.
        let tokens = self
            .persist_pair(minted)
            .await
            .map_err(|e| e.context("rotate credentials"))?;
        info!(user_id = %claims.user_id, "credentials rotated");
        Ok(tokens)
    }

    /// Explicitly retire a pair without issuing a successor.
    pub async fn revoke(&self, access_token: &str, refresh_secret: &str) -> Result<()> {
        let (claims, record) = self.authenticate_pair(access_token, refresh_secret).await?;
        if !self.store.take_refresh_record(record.id).await? {
            return Err(AuthError::invalid_token(INVALID_CREDENTIALS));
        }
        info!(user_id = %claims.user_id, "credentials revoked");
        Ok(())
    }

    /// Drop refresh records that are past their own expiry.
    pub async fn purge_expired(&self) -> Result<u64> {
        let purged = self
            .store
            .purge_expired_refresh_records(self.clock.now())
            .await
            .map_err(|e| e.context("purge expired refresh tokens"))?;
        if purged > 0 {
            info!(purged, "purged expired refresh tokens");
        }
        Ok(purged)
    }

    /// Verify a presented pair against its stored record.
    ///
    /// An expired access token is accepted here; every other failure
    /// collapses into one `InvalidToken`, except storage failures, which
    /// keep their kind.
    async fn authenticate_pair(
        &self,
        access_token: &str,
        refresh_secret: &str,
    ) -> Result<(AccessClaims, RefreshRecord)> {
        let claims = match self.issuer.verify_access_token(access_token) {
            Ok(claims) | Err(VerifyError::Expired(claims)) => claims,
            Err(e) => {
                debug!(error = %e, "access token rejected");
                return Err(AuthError::invalid_token(INVALID_CREDENTIALS));
            }
        };

        let record = match self
            .store
            .find_refresh_record(&claims.user_id, &claims.token_id)
            .await
        {
            Ok(record) => record,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(user_id = %claims.user_id, jti = %claims.token_id, "no refresh record");
                return Err(AuthError::invalid_token(INVALID_CREDENTIALS));
            }
            Err(e) => return Err(e.context("look up refresh token")),
        };

        let issuer = self.issuer.clone();
        let checked = record.clone();
        let secret = refresh_secret.to_string();
        let token_id = claims.token_id.clone();
        tokio::task::spawn_blocking(move || {
            issuer.verify_refresh_binding(&checked, &secret, &token_id)
        })
        .await
        .map_err(|e| AuthError::internal(format!("binding check task: {e}")))?
        .map_err(|e| {
            debug!(user_id = %claims.user_id, error = %e, "refresh binding rejected");
            AuthError::invalid_token(INVALID_CREDENTIALS)
        })?;

        if record.expires_at <= self.clock.now() {
            debug!(user_id = %claims.user_id, "refresh record expired");
            if let Err(e) = self.store.delete_refresh_record(record.id).await {
                warn!(error = %e, "failed to delete expired refresh record");
            }
            return Err(AuthError::invalid_token(INVALID_CREDENTIALS));
        }

        Ok((claims, record))
    }

    async fn issue_pair(&self, user_id: &str, client_ip: &str) -> Result<TokenPair> {
        let minted = self.mint_pair(user_id, client_ip).await?;
        self.persist_pair(minted).await
    }

    /// Sign an access token and hash a new refresh secret bound to it.
    async fn mint_pair(&self, user_id: &str, client_ip: &str) -> Result<MintedPair> {
        let (access_token, claims) = self
            .issuer
            .issue_access_token(user_id, client_ip)
            .map_err(|e| e.context("sign access token"))?;
        let refresh_token = self.issuer.issue_refresh_secret();
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.refresh_ttl)
            .ok_or_else(|| AuthError::internal("refresh token lifetime out of range"))?;

        let issuer = self.issuer.clone();
        let secret = refresh_token.clone();
        let hashed_secret = tokio::task::spawn_blocking(move || issuer.hash_refresh_secret(&secret))
            .await
            .map_err(|e| AuthError::internal(format!("hashing task: {e}")))?
            .map_err(|e| e.context("hash refresh token"))?;

        Ok(MintedPair {
            tokens: TokenPair {
                access_token,
                refresh_token,
                expires_in: self.issuer.access_ttl().num_seconds(),
            },
            record: NewRefreshRecord {
                user_id: user_id.to_string(),
                hashed_secret,
                bound_token_id: claims.token_id,
                client_ip: client_ip.to_string(),
                expires_at,
            },
        })
    }

    async fn persist_pair(&self, minted: MintedPair) -> Result<TokenPair> {
        self.store
            .insert_refresh_record(minted.record)
            .await
            .map_err(|e| e.context("save refresh token"))?;
        Ok(minted.tokens)
    }
}

/// An address needs a non-empty local part and domain around the `@`.
fn validate_email(email: &str) -> Result<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::invalid_input("invalid email format")),
    }
}
