//! 应用配置模块
//!
//! 启动时从环境变量一次性加载所有配置，之后以 `Arc<Config>` 注入到 Gateway，
//! 请求处理过程中不再读取进程环境。包括：
//! - 服务器监听地址、端口和端点路径
//! - 上游 API 地址与密钥
//! - 请求体默认值（model / temperature / stream）
//! - 流式错误处理方式与超时

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_ENDPOINT: &str = "/api/chat";

/// 上游密钥对应的环境变量名（同时用于错误信息）
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// 上游流在中途出错时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamErrorMode {
    /// 直接结束输出流
    #[default]
    Close,
    /// 先写出一个 `data: {"error": ...}` 事件再结束
    Event,
}

impl FromStr for StreamErrorMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "close" => Ok(Self::Close),
            "event" => Ok(Self::Event),
            other => anyhow::bail!("unknown stream error mode: {other} (expected close or event)"),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器监听地址（如 "0.0.0.0" 或 "127.0.0.1"）
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
    /// 中继端点路径
    pub endpoint: String,
    /// 上游 API 密钥；缺失时所有 POST 请求返回 500
    pub api_key: Option<String>,
    pub upstream_url: String,
    pub default_model: String,
    pub default_temperature: f64,
    pub default_stream: bool,
    pub stream_errors: StreamErrorMode,
    /// 入站请求在产生响应头之前的超时
    pub request_timeout: Duration,
    /// 上游 HTTP 客户端超时
    pub upstream_timeout: Duration,
    /// 是否禁用 TLS 验证（用于调试 mitmproxy 等场景）
    pub disable_tls_verify: bool,
    /// POST 请求体上限（字节），超出返回 413
    pub max_body_bytes: usize,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// # 环境变量
    ///
    /// - `RELAY_HOST`: 监听地址（默认: "0.0.0.0"）
    /// - `RELAY_PORT`: 监听端口（默认: 8080）
    /// - `RELAY_ENDPOINT`: 端点路径（默认: "/api/chat"）
    /// - `OPENAI_API_KEY`: 上游密钥（可选，缺失时 POST 返回 500）
    /// - `RELAY_UPSTREAM_URL`: 上游地址
    /// - `RELAY_DEFAULT_MODEL` / `RELAY_DEFAULT_TEMPERATURE` / `RELAY_DEFAULT_STREAM`
    /// - `RELAY_STREAM_ERRORS`: `close` 或 `event`
    /// - `RELAY_REQUEST_TIMEOUT_SECS` / `RELAY_UPSTREAM_TIMEOUT_SECS`
    /// - `RELAY_DISABLE_TLS_VERIFY`
    /// - `RELAY_MAX_BODY_BYTES`: POST 请求体上限（默认: 32 MiB）
    ///
    /// # 错误
    ///
    /// 任一数值或枚举类变量无法解析时返回错误
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意查找函数加载配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get("RELAY_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = get("RELAY_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .context("RELAY_PORT must be a valid port number")?;

        let endpoint = get("RELAY_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        if !endpoint.starts_with('/') {
            anyhow::bail!("RELAY_ENDPOINT must start with '/', got {endpoint:?}");
        }

        let default_temperature = match get("RELAY_DEFAULT_TEMPERATURE") {
            Some(v) => v
                .parse()
                .context("RELAY_DEFAULT_TEMPERATURE must be a number")?,
            None => DEFAULT_TEMPERATURE,
        };

        let default_stream = match get("RELAY_DEFAULT_STREAM") {
            Some(v) => parse_bool(&v).context("RELAY_DEFAULT_STREAM must be a boolean")?,
            None => true,
        };

        let stream_errors = match get("RELAY_STREAM_ERRORS") {
            Some(v) => v.parse().context("Invalid RELAY_STREAM_ERRORS")?,
            None => StreamErrorMode::default(),
        };

        let disable_tls_verify = match get("RELAY_DISABLE_TLS_VERIFY") {
            Some(v) => parse_bool(&v).context("RELAY_DISABLE_TLS_VERIFY must be a boolean")?,
            None => false,
        };

        let max_body_bytes = match get("RELAY_MAX_BODY_BYTES") {
            Some(v) => v
                .parse()
                .context("RELAY_MAX_BODY_BYTES must be a whole number of bytes")?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Self {
            host,
            port,
            endpoint,
            api_key: get(API_KEY_VAR),
            upstream_url: get("RELAY_UPSTREAM_URL")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
            default_model: get("RELAY_DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            default_temperature,
            default_stream,
            stream_errors,
            request_timeout: secs(get("RELAY_REQUEST_TIMEOUT_SECS"), "RELAY_REQUEST_TIMEOUT_SECS")?,
            upstream_timeout: secs(
                get("RELAY_UPSTREAM_TIMEOUT_SECS"),
                "RELAY_UPSTREAM_TIMEOUT_SECS",
            )?,
            disable_tls_verify,
            max_body_bytes,
        })
    }

    /// 获取上游密钥（空字符串视为缺失）
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean: {other}"),
    }
}

fn secs(value: Option<String>, name: &str) -> Result<Duration> {
    let secs = match value {
        Some(v) => v
            .parse()
            .with_context(|| format!("{name} must be a whole number of seconds"))?,
        None => DEFAULT_TIMEOUT_SECS,
    };
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.endpoint, "/api/chat");
        assert_eq!(config.api_key(), None);
        assert_eq!(config.upstream_url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.default_temperature, 0.7);
        assert!(config.default_stream);
        assert_eq!(config.stream_errors, StreamErrorMode::Close);
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert!(!config.disable_tls_verify);
        assert_eq!(config.max_body_bytes, 32 * 1024 * 1024);
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("RELAY_PORT", "9000"),
            ("RELAY_ENDPOINT", "/chat"),
            ("OPENAI_API_KEY", "sk-test"),
            ("RELAY_DEFAULT_MODEL", "gpt-4o"),
            ("RELAY_DEFAULT_TEMPERATURE", "0.2"),
            ("RELAY_DEFAULT_STREAM", "false"),
            ("RELAY_STREAM_ERRORS", "event"),
            ("RELAY_UPSTREAM_TIMEOUT_SECS", "12"),
            ("RELAY_MAX_BODY_BYTES", "1024"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.endpoint, "/chat");
        assert_eq!(config.api_key(), Some("sk-test"));
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.default_temperature, 0.2);
        assert!(!config.default_stream);
        assert_eq!(config.stream_errors, StreamErrorMode::Event);
        assert_eq!(config.upstream_timeout, Duration::from_secs(12));
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn empty_api_key_counts_as_missing() {
        let config = load(&[("OPENAI_API_KEY", "")]).unwrap();
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("RELAY_PORT", "http")]).is_err());
        assert!(load(&[("RELAY_ENDPOINT", "api/chat")]).is_err());
        assert!(load(&[("RELAY_STREAM_ERRORS", "retry")]).is_err());
        assert!(load(&[("RELAY_DEFAULT_STREAM", "maybe")]).is_err());
        assert!(load(&[("RELAY_MAX_BODY_BYTES", "lots")]).is_err());
    }
}
