//! Serve 命令 - 启动中继服务器

use anyhow::Result;

use crate::config::Config;
use crate::gateway;

/// 执行服务器启动命令
///
/// 构建上游客户端和路由，启动服务器并等待关闭信号（Ctrl+C 或 SIGTERM）。
pub async fn serve_command(config: Config) -> Result<()> {
    gateway::serve(config).await
}
