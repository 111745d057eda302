//! HTTP 边界的错误转换

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::{GenerationError, PreviewError};
use crate::models::ErrorResponse;

/// 处理器错误，统一渲染为 `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Generation(GenerationError),
    Preview(PreviewError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Generation(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Preview(PreviewError::EmptyCode) => StatusCode::BAD_REQUEST,
            Self::Preview(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        Self::Generation(e)
    }
}

impl From<PreviewError> for ApiError {
    fn from(e: PreviewError) -> Self {
        Self::Preview(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            Self::BadRequest(message) => message,
            Self::Generation(e) => e.to_string(),
            Self::Preview(e) => e.to_string(),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}
