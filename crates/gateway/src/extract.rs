//! Request extractors

use axum::extract::FromRequest;
use paperledger_common::errors::AppError;

/// JSON body whose rejections render as `AppError` (400 `INVALID_FORMAT`)
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
