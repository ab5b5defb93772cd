//! Request and response bodies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

/// Body of `PATCH /refresh` and `POST /logout`.
#[derive(Debug, Deserialize)]
pub struct TokenPairRequest {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access: String,
    pub refresh: String,
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
