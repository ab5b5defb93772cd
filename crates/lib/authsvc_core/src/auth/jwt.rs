//! JWT access token generation and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use super::VerifyError;
use crate::error::{AuthError, Result};
use crate::models::auth::AccessClaims;

/// The only accepted signing algorithm.
pub const ALGORITHM: Algorithm = Algorithm::HS512;

/// Generate a signed HS512 access token bound to `client_ip`.
///
/// Returns the encoded token and the claims it carries, including the
/// freshly minted `jti`.
pub fn generate_access_token(
    user_id: &str,
    client_ip: &str,
    secret: &[u8],
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<(String, AccessClaims)> {
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::internal("access token lifetime out of range"))?;
    let claims = AccessClaims {
        user_id: user_id.to_string(),
        token_id: Uuid::new_v4().to_string(),
        bound_ip: client_ip.to_string(),
        issued_at: now.timestamp(),
        expires_at: expires_at.timestamp(),
    };
    let token = encode(
        &Header::new(ALGORITHM),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::internal(format!("jwt encode: {e}")).with_source(e))?;
    Ok((token, claims))
}

/// Verify an access token's signature and algorithm, then its expiry.
///
/// Expiry is checked here rather than by `jsonwebtoken` so that the claims
/// of an expired token can be handed back, and so that a token is already
/// expired at exactly `exp`.
pub fn verify_access_token(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
) -> std::result::Result<AccessClaims, VerifyError> {
    let mut validation = Validation::new(ALGORITHM);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    let claims = decode::<AccessClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| VerifyError::Invalid(format!("jwt decode: {e}")))?
        .claims;

    if claims.user_id.is_empty() || claims.token_id.is_empty() {
        return Err(VerifyError::Invalid("missing subject or jti".into()));
    }
    if now.timestamp() >= claims.expires_at {
        return Err(VerifyError::Expired(claims));
    }
    Ok(claims)
}
