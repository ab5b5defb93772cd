//! Authentication domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// Claims embedded in signed access tokens.
///
/// Exists only in transit; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Unique per issuance (JWT `jti`).
    #[serde(rename = "jti")]
    pub token_id: String,
    /// Client address captured at issuance.
    #[serde(rename = "ip")]
    pub bound_ip: String,
    /// Issued at (unix timestamp).
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiry (unix timestamp).
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

/// Refresh token record as stored. Never updated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRecord {
    /// Store-assigned identity, used only for deletion.
    pub id: i64,
    pub user_id: String,
    /// bcrypt hash of the refresh secret.
    pub hashed_secret: String,
    /// `jti` of the access token issued alongside.
    pub bound_token_id: String,
    pub client_ip: String,
    pub expires_at: DateTime<Utc>,
}

/// Refresh token record before the store assigns its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRefreshRecord {
    pub user_id: String,
    pub hashed_secret: String,
    pub bound_token_id: String,
    pub client_ip: String,
    pub expires_at: DateTime<Utc>,
}

impl NewRefreshRecord {
    /// Attach the store-assigned identity.
    pub fn with_id(self, id: i64) -> RefreshRecord {
        RefreshRecord {
            id,
            user_id: self.user_id,
            hashed_secret: self.hashed_secret,
            bound_token_id: self.bound_token_id,
            client_ip: self.client_ip,
            expires_at: self.expires_at,
        }
    }
}

/// A freshly issued access/refresh pair. The refresh secret is plaintext
/// and is handed out exactly once.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub user_id: String,
    pub tokens: TokenPair,
}

/// Security notice raised when a refresh arrives from a different address
/// than the one the access token was bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpChangeNotice {
    pub user_id: String,
    /// Resolved by the delivery task; `None` if the lookup failed.
    pub email: Option<String>,
    pub previous_ip: String,
    pub new_ip: String,
    pub at: DateTime<Utc>,
}
