//! Opaque refresh secrets: generation, bcrypt hashing and binding checks.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{RngCore, rng};

use crate::error::{AuthError, Result};
use crate::models::auth::RefreshRecord;

/// 256 bits of entropy per refresh secret.
const REFRESH_SECRET_BYTES: usize = 32;

/// Generate a random URL-safe refresh secret (43 chars, no padding).
pub fn generate_refresh_secret() -> String {
    let mut buf = [0u8; REFRESH_SECRET_BYTES];
    rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Hash a refresh secret with bcrypt at the given cost.
pub fn hash_refresh_secret(secret: &str, cost: u32) -> Result<String> {
    bcrypt::hash(secret, cost)
        .map_err(|e| AuthError::internal(format!("bcrypt hash: {e}")).with_source(e))
}

/// Check that `secret` was issued alongside the access token `token_id`
/// and matches the stored hash.
///
/// The jti comparison runs first; bcrypt's own comparison is constant-time.
pub fn verify_refresh_binding(record: &RefreshRecord, secret: &str, token_id: &str) -> Result<()> {
    if record.bound_token_id != token_id {
        return Err(AuthError::invalid_token(
            "refresh token is not bound to this access token",
        ));
    }
    match bcrypt::verify(secret, &record.hashed_secret) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthError::invalid_token("refresh token mismatch")),
        // A stored hash we cannot parse can never match.
        Err(e) => Err(AuthError::invalid_token(format!("bcrypt verify: {e}")).with_source(e)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::error::ErrorKind;

    const COST: u32 = 4;

    fn record_for(secret: &str, token_id: &str) -> RefreshRecord {
        RefreshRecord {
            id: 1,
            user_id: "user-1".into(),
            hashed_secret: hash_refresh_secret(secret, COST).unwrap(),
            bound_token_id: token_id.into(),
            client_ip: "1.1.1.1".into(),
            expires_at: Utc::now(),
        }
    }

    #[test]
    fn secrets_are_url_safe_and_unique() {
        let a = generate_refresh_secret();
        let b = generate_refresh_secret();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn hash_is_salted() {
        let secret = generate_refresh_secret();
        let h1 = hash_refresh_secret(&secret, COST).unwrap();
        let h2 = hash_refresh_secret(&secret, COST).unwrap();
        assert_ne!(h1, h2);
        assert_ne!(h1, secret);
    }

    #[test]
    fn binding_accepts_matching_pair() {
        let secret = generate_refresh_secret();
        let record = record_for(&secret, "jti-1");
        assert!(verify_refresh_binding(&record, &secret, "jti-1").is_ok());
    }

    #[test]
    fn binding_rejects_wrong_secret() {
        let record = record_for(&generate_refresh_secret(), "jti-1");
        let err = verify_refresh_binding(&record, "wrong", "jti-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn binding_rejects_wrong_token_id() {
        let secret = generate_refresh_secret();
        let record = record_for(&secret, "jti-1");
        let err = verify_refresh_binding(&record, &secret, "jti-2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn corrupt_stored_hash_is_invalid_token() {
        let mut record = record_for("s", "jti-1");
        record.hashed_secret = "not-a-bcrypt-hash".into();
        let err = verify_refresh_binding(&record, "s", "jti-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }
}
