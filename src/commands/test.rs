//! Test 命令 - 发送测试请求到本地服务器
//!
//! 向本地运行的中继发送一条聊天消息，流式模式下边收边打印，
//! 用于验证服务和上游密钥是否可用。

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::chat::Message;
use crate::config::Config;

/// 执行测试命令
///
/// # 参数
///
/// * `config` - 应用配置，用于获取服务器地址和端点路径
/// * `message` - 发送的用户消息
/// * `stream` - 是否请求流式响应
pub async fn test_command(config: Config, message: String, stream: bool) -> Result<()> {
    println!("Sending test request to local server...");

    let test_body = serde_json::json!({
        "stream": stream,
        "messages": [Message::user(message)]
    });

    // 0.0.0.0 不能作为目标地址
    let host = if config.host == "0.0.0.0" {
        "127.0.0.1"
    } else {
        config.host.as_str()
    };
    let url = format!("http://{}:{}{}", host, config.port, config.endpoint);

    println!("Request URL: {}", url);

    let response = reqwest::Client::new()
        .post(&url)
        .json(&test_body)
        .send()
        .await
        .context("Request failed. Make sure the server is running.")?;

    let status = response.status();
    println!("Response status: {}", status);

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Request failed: {}", body);
    }

    println!("Response:");

    let mut stdout = tokio::io::stdout();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("Failed to read response body")?;
        stdout.write_all(&chunk).await?;
        stdout.flush().await?;
    }
    stdout.write_all(b"\n").await?;

    Ok(())
}
