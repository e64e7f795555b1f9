//! Chat 中继处理器

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderName, HeaderValue, Version},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde_json::Value;

use crate::chat::{normalize, ChatRequest, Usage};
use crate::config::StreamErrorMode;
use crate::gateway::{error::RelayError, state::AppState};
use crate::relay;
use crate::upstream::{ByteStream, UpstreamResponse};

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// POST 处理器
pub async fn handle_chat(state: &AppState, version: Version, body: &[u8]) -> Response {
    match relay_chat(state, version, body).await {
        Ok(response) => response,
        Err(err) => {
            match &err {
                RelayError::MalformedBody(source) | RelayError::InvalidBody(source) => {
                    tracing::warn!(error = %source, "rejecting request body")
                }
                other => tracing::error!("{other}"),
            }
            err.into_response()
        }
    }
}

async fn relay_chat(
    state: &AppState,
    version: Version,
    body: &[u8],
) -> Result<Response, RelayError> {
    let request = ChatRequest::from_slice(body).map_err(RelayError::from_json)?;
    let credential = state
        .config()
        .api_key()
        .ok_or(RelayError::MissingCredential)?;

    let payload = normalize(request, state.defaults());
    let upstream = state.upstream();

    tracing::info!(
        upstream = upstream.name(),
        model = %payload.model,
        streaming = payload.stream,
        messages = payload.messages.len(),
        "request"
    );

    let response = upstream
        .send(credential, &payload)
        .await
        .map_err(RelayError::UpstreamFailure)?;

    if payload.stream {
        Ok(stream_response(response, version, state.config().stream_errors))
    } else {
        Ok(json_response(response, &payload.model).await)
    }
}

/// 流式响应：立即返回上游状态码，响应体逐块透传
///
/// `Connection` 是 HTTP/1.x 专用头，HTTP/2 及以上不设置。
fn stream_response(response: UpstreamResponse, version: Version, mode: StreamErrorMode) -> Response {
    let mut out = (
        response.status,
        [
            (header::CONTENT_TYPE, "text/event-stream; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(relay::pipe(response.body, mode)),
    )
        .into_response();

    let http1 = version == Version::HTTP_09
        || version == Version::HTTP_10
        || version == Version::HTTP_11;
    if http1 {
        out.headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    }
    out
}

/// 非流式响应：上游 JSON 原样返回，无法读取或解析时返回 `{}`
async fn json_response(response: UpstreamResponse, model: &str) -> Response {
    let status = response.status;

    let body = match read_to_end(response.body).await {
        Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => {
                if let Some(usage) = Usage::from_response(&value) {
                    tracing::info!(
                        model,
                        %status,
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        total_tokens = usage.total_tokens,
                        "response"
                    );
                }
                Bytes::from(bytes)
            }
            Err(e) => {
                tracing::warn!(error = %e, %status, "upstream body is not JSON, relaying empty object");
                Bytes::from_static(b"{}")
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, %status, "failed to read upstream body, relaying empty object");
            Bytes::from_static(b"{}")
        }
    };

    (
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response()
}

async fn read_to_end(mut body: ByteStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}
