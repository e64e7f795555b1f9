//! 上游抽象层
//!
//! 定义上游 Chat API 的统一接口。Gateway 只依赖 `Upstream` trait，
//! 实际的 HTTP 实现见 [`openai`]。

pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use crate::chat::UpstreamPayload;

pub use openai::OpenAiUpstream;

/// 上游响应体字节流
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// 上游响应：状态码 + 尚未读取的响应体
///
/// 非 2xx 状态不会被转换为错误，由调用方原样转发。
pub struct UpstreamResponse {
    pub status: http::StatusCode,
    pub body: ByteStream,
}

/// Upstream Trait - 所有上游 Chat API 的统一接口
#[async_trait]
pub trait Upstream: Send + Sync {
    /// 上游名称（用于日志）
    fn name(&self) -> &str;

    /// 发送一次请求，`credential` 作为 Bearer token 携带
    ///
    /// 仅在传输层失败（连接、TLS、超时等）时返回 `Err`。
    async fn send(&self, credential: &str, payload: &UpstreamPayload) -> Result<UpstreamResponse>;
}
