//! 中继错误类型

use axum::{
    extract::rejection::{BytesRejection, FailedToBufferBody},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::API_KEY_VAR;

/// 单次请求内的终止性错误，不影响后续请求
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Method Not Allowed")]
    InvalidMethod,

    #[error("Payload Too Large: request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Bad Request: failed to read request body")]
    UnreadableBody(#[source] BytesRejection),

    /// 请求体不是合法 JSON
    #[error("Bad Request: invalid JSON")]
    MalformedBody(#[source] serde_json::Error),

    /// 合法 JSON，但字段类型不符（如 `messages` 不是数组）
    #[error("Bad Request: {0}")]
    InvalidBody(#[source] serde_json::Error),

    #[error("Missing {}", API_KEY_VAR)]
    MissingCredential,

    #[error("upstream request failed: {0:#}")]
    UpstreamFailure(anyhow::Error),

    /// 仅用于日志和 SSE 错误事件：发生时响应头已发出，不会转换为响应
    #[error("upstream stream interrupted: {0}")]
    StreamInterrupted(#[source] std::io::Error),
}

impl RelayError {
    /// 按 serde_json 的错误类别区分语法错误与字段类型错误
    pub fn from_json(err: serde_json::Error) -> Self {
        if err.is_data() {
            RelayError::InvalidBody(err)
        } else {
            RelayError::MalformedBody(err)
        }
    }

    pub fn from_rejection(rejection: BytesRejection, limit: usize) -> Self {
        match rejection {
            BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
                RelayError::BodyTooLarge { limit }
            }
            other => RelayError::UnreadableBody(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidMethod => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::UnreadableBody(_)
            | RelayError::MalformedBody(_)
            | RelayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            RelayError::MissingCredential
            | RelayError::UpstreamFailure(_)
            | RelayError::StreamInterrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let RelayError::UpstreamFailure(_) = self {
            let error = ErrorResponse {
                error: self.to_string(),
            };
            return (status, Json(error)).into_response();
        }
        (status, self.to_string()).into_response()
    }
}
