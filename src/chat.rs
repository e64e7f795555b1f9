//! 聊天请求模型与规范化
//!
//! 浏览器发来的请求体 (`ChatRequest`) 在这里被转换为上游 Chat Completions API
//! 期望的形状 (`UpstreamPayload`)：补齐 model / temperature / stream 默认值，
//! 并在存在 system 提示词时将其作为首条消息插入。消息顺序保持不变。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";

/// 消息内容：纯文本或任意结构化内容（原样透传）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(Value),
}

/// 单条聊天消息
///
/// `role` 不做枚举校验（`developer`、`tool` 等由上游判断）；`content` 可省略，
/// 例如只带 `tool_calls` 的 assistant 消息。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<MessageContent>,
    /// 其他字段（如 `name`、`tool_calls`）原样透传给上游
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 区分字段缺失与显式 `null`：后者保留为 `Structured(Value::Null)` 以便原样透传
fn present<'de, D>(deserializer: D) -> Result<Option<MessageContent>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    MessageContent::deserialize(deserializer).map(Some)
}

impl Message {
    fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(MessageContent::Text(content)),
            extra: Map::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(ROLE_SYSTEM, content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(ROLE_USER, content.into())
    }
}

/// 入站 POST 请求体，所有字段均可省略
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    pub system: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub stream: Option<bool>,
}

impl ChatRequest {
    /// 解析请求体，空请求体按 `{}` 处理
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
    }
}

/// 发送给上游的请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamPayload {
    pub model: String,
    pub temperature: f64,
    pub stream: bool,
    pub messages: Vec<Message>,
}

/// 请求体缺省字段的默认值
#[derive(Debug, Clone)]
pub struct PayloadDefaults {
    pub model: String,
    pub temperature: f64,
    pub stream: bool,
}

impl From<&crate::config::Config> for PayloadDefaults {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            stream: config.default_stream,
        }
    }
}

/// 将入站请求规范化为上游请求体
///
/// 非空的 `system` 会作为 `{role: "system"}` 消息插入到最前面，
/// 其余消息保持调用方给出的顺序。
pub fn normalize(request: ChatRequest, defaults: &PayloadDefaults) -> UpstreamPayload {
    let system = request.system.filter(|s| !s.is_empty());

    let mut messages = Vec::with_capacity(request.messages.len() + usize::from(system.is_some()));
    if let Some(system) = system {
        messages.push(Message::system(system));
    }
    messages.extend(request.messages);

    UpstreamPayload {
        model: request.model.unwrap_or_else(|| defaults.model.clone()),
        temperature: request.temperature.unwrap_or(defaults.temperature),
        stream: request.stream.unwrap_or(defaults.stream),
        messages,
    }
}

/// 上游响应中的 token 用量（仅用于日志）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// 从 Chat Completions 响应的 `usage` 字段解析，字段缺失时返回 `None`
    pub fn from_response(response: &Value) -> Option<Self> {
        let usage = response.get("usage")?;
        let get = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);

        Some(Self {
            prompt_tokens: get("prompt_tokens"),
            completion_tokens: get("completion_tokens"),
            total_tokens: get("total_tokens"),
        })
    }
}
