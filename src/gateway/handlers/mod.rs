//! HTTP 请求处理器
//!
//! 中继端点只有一个入口，按请求方法分派：
//!
//! | 方法 | 响应 |
//! |---|---|
//! | OPTIONS | 204，仅 CORS 头 |
//! | GET | 200，状态 JSON |
//! | POST | 规范化后转发到上游 |
//! | 其他 | 405 |

pub mod chat;
pub mod status;

pub use chat::handle_chat;
pub use status::{handle_preflight, handle_status};

use axum::{
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::Method,
    response::{IntoResponse, Response},
};

use crate::gateway::{error::RelayError, state::AppState};

/// 中继端点入口
///
/// 只有 POST 会读取请求体（受 `DefaultBodyLimit` 限制），其他方法直接应答。
pub async fn handle_chat_endpoint(State(state): State<AppState>, request: Request) -> Response {
    match request.method().clone() {
        Method::OPTIONS => handle_preflight(),
        Method::GET => handle_status(&state),
        Method::POST => {
            let version = request.version();
            match Bytes::from_request(request, &state).await {
                Ok(body) => handle_chat(&state, version, &body).await,
                Err(rejection) => {
                    let err = RelayError::from_rejection(rejection, state.config().max_body_bytes);
                    tracing::warn!("{err}");
                    err.into_response()
                }
            }
        }
        _ => RelayError::InvalidMethod.into_response(),
    }
}
