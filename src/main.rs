//! chat-relay - Chat Completions 中继服务
//!
//! 接收浏览器发来的聊天请求，规范化为上游 Chat Completions API 的格式后转发，
//! 并将上游响应（JSON 或 SSE 流）原样返回，同时处理 CORS 预检。
//!
//! # 功能特性
//!
//! - 单一端点按方法分派：OPTIONS / GET / POST
//! - system 提示词前置、model / temperature / stream 默认值
//! - 流式响应逐块透传，客户端断开时立即释放上游连接
//! - 上游非 2xx 状态原样转发
//!
//! # 命令行接口
//!
//! - `serve`: 启动中继服务器
//! - `test`: 向本地服务器发送测试请求

mod chat;
mod commands;
mod config;
mod gateway;
mod relay;
mod upstream;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// chat-relay CLI
#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "CORS-enabled relay for chat completion APIs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// 可用的命令
#[derive(Subcommand)]
enum Commands {
    /// 启动中继服务器
    Serve,
    /// 向本地服务器发送测试请求
    Test {
        /// 发送的用户消息
        #[arg(short, long, default_value = "Hello! Reply with one short sentence.")]
        message: String,
        /// 请求非流式响应
        #[arg(long)]
        no_stream: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    if let Ok(dotenv_path) = std::env::var("RELAY_ENV_FILE") {
        dotenvy::from_path(&dotenv_path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve => commands::serve_command(config).await,
        Commands::Test { message, no_stream } => {
            commands::test_command(config, message, !no_stream).await
        }
    }
}

/// 初始化日志系统，`RELAY_LOG_FORMAT=json` 时输出 JSON
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "chat_relay=info".into());

    let json = std::env::var("RELAY_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();
    }
}
