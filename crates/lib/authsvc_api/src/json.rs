//! JSON body extractor whose rejections use the API error body.

use axum::extract::FromRequest;
use axum::extract::rejection::JsonRejection;

use crate::error::AppError;

/// `axum::Json` with malformed bodies reported as `400 validation_error`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
