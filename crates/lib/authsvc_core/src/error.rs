//! Error taxonomy shared by the issuer, the store and the orchestrator.
//!
//! Callers match on [`ErrorKind`] rather than on individual error values.
//! The message carries operation context; the source (if any) carries the
//! underlying library error.

use std::fmt;

use thiserror::Error;

/// Convenience alias for core results.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Boxed underlying cause.
type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Kind of failure, stable across layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed request data.
    InvalidInput,
    /// Uniqueness violation (e.g. duplicate email).
    Conflict,
    /// Referenced entity absent.
    NotFound,
    /// Signature, binding or lookup failure on access/refresh material.
    InvalidToken,
    /// Access token past its expiry. Consumed by the refresh flow.
    TokenExpired,
    /// Storage or cryptographic subsystem failure.
    Internal,
}

impl ErrorKind {
    /// Stable snake_case code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidToken => "invalid_token",
            ErrorKind::TokenExpired => "token_expired",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error: a kind, a contextual message and an optional cause.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AuthError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Cause>,
}

impl AuthError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl Into<Cause>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidToken, message)
    }

    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenExpired, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with operation context. The kind is unchanged.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        let kind = match &e {
            sqlx::Error::RowNotFound => ErrorKind::NotFound,
            sqlx::Error::Database(db) => match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation => ErrorKind::Conflict,
                sqlx::error::ErrorKind::CheckViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation => ErrorKind::InvalidInput,
                _ => ErrorKind::Internal,
            },
            _ => ErrorKind::Internal,
        };
        AuthError::new(kind, e.to_string()).with_source(e)
    }
}

impl From<sqlx::migrate::MigrateError> for AuthError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AuthError::internal(format!("migration failed: {e}")).with_source(e)
    }
}
