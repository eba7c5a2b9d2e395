use axum::extract::FromRequest;

use crate::api::error::ApiError;

/// `Json` body extractor whose rejections are reported as [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
