use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use domain::ChatError;
use infrastructure::ProvisionError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequest", message)
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        let status = match &error {
            ChatError::InvalidCredentials
            | ChatError::InvalidToken
            | ChatError::Unauthorized => StatusCode::UNAUTHORIZED,
            ChatError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ChatError::EmptyContent => StatusCode::BAD_REQUEST,
            ChatError::RoomNotFound { .. } => StatusCode::NOT_FOUND,
            ChatError::AlreadyBound => StatusCode::CONFLICT,
            // 存储不可用对请求方是可重试的
            ChatError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        ApiError::new(status, error.code(), error.to_string())
    }
}

impl From<ProvisionError> for ApiError {
    fn from(error: ProvisionError) -> Self {
        match &error {
            ProvisionError::UserExists { .. } => {
                ApiError::new(StatusCode::CONFLICT, "UserExists", error.to_string())
            }
            ProvisionError::RoomExists { .. } => {
                ApiError::new(StatusCode::CONFLICT, "RoomExists", error.to_string())
            }
            ProvisionError::Hash(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalError",
                error.to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
