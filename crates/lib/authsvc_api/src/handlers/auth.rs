//! Authentication request handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use tracing::info;

use crate::AppState;
use crate::client_ip::ClientIp;
use crate::error::{AppError, AppResult};
use crate::json::ApiJson;
use crate::models::{
    LoginQuery, RegisterRequest, RegisterResponse, TokenPairRequest, TokenResponse,
};
use authsvc_core::models::auth::TokenPair;

fn token_response(pair: TokenPair) -> TokenResponse {
    TokenResponse {
        access: pair.access_token,
        refresh: pair.refresh_token,
        expires_in: pair.expires_in,
        token_type: "Bearer".to_string(),
    }
}

/// `POST /register` — create a user and return their first token pair.
pub async fn register_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let reg = state.service.register(&body.email, &ip).await?;
    info!(user_id = %reg.user_id, "user successfully registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: reg.user_id,
            access: reg.tokens.access_token,
            refresh: reg.tokens.refresh_token,
        }),
    ))
}

/// `GET /login?userID=` — issue a token pair for an existing user.
pub async fn login_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Query(query): Query<LoginQuery>,
) -> AppResult<Json<TokenResponse>> {
    let user_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("userID parameter is required".into()))?;
    let pair = state.service.login(&user_id, &ip).await?;
    Ok(Json(token_response(pair)))
}

/// `PATCH /refresh` — exchange a token pair for a new one.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<TokenPairRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state
        .service
        .refresh(&body.access_token, &body.refresh_token, &ip)
        .await?;
    Ok(Json(token_response(pair)))
}

/// `POST /logout` — revoke a token pair.
pub async fn logout_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenPairRequest>,
) -> AppResult<StatusCode> {
    state
        .service
        .revoke(&body.access_token, &body.refresh_token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
