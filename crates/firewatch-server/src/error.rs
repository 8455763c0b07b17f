use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use firewatch_core::FirewatchError;
use firewatch_storage::PersistError;
use serde_json::json;
use tracing::error;

/// API 错误
///
/// 内部错误只记录日志，响应体使用固定文案。
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    InternalError(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(detail) => {
                error!(error = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "msg": message,
        }));

        (status, body).into_response()
    }
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<FirewatchError> for ApiError {
    fn from(err: FirewatchError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::InternalError(err.to_string())
        }
    }
}
