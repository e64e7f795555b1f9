//! 状态检查与 CORS 预检处理器

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::gateway::state::AppState;

const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION"));

/// 状态检查响应
#[derive(Serialize)]
struct StatusResponse<'a> {
    ok: bool,
    endpoint: &'a str,
    expects: &'static str,
    stream: bool,
    version: &'static str,
    tip: &'static str,
}

/// GET：返回端点状态，不访问上游
pub fn handle_status(state: &AppState) -> Response {
    let config = state.config();
    let status = StatusResponse {
        ok: true,
        endpoint: &config.endpoint,
        expects: "POST (JSON)",
        stream: config.default_stream,
        version: VERSION,
        tip: "Status check only. Send chat requests from the client with POST.",
    };

    ([(header::CACHE_CONTROL, "no-store")], Json(status)).into_response()
}

/// OPTIONS：CORS 预检，204 无响应体（跨域头由中间件附加）
pub fn handle_preflight() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
