//! # authsvc_core
//!
//! Token lifecycle engine: signed access tokens, opaque refresh secrets
//! with hashed storage, and rotation-on-refresh.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod migrate;
pub mod models;
pub mod notify;
pub mod service;
pub mod store;

pub use error::{AuthError, ErrorKind, Result};
pub use service::AuthService;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
