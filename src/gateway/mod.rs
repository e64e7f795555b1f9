//! Gateway 应用层
//!
//! HTTP 服务器和请求处理

mod error;
mod handlers;
mod middleware;
mod state;


pub use error::RelayError;
pub use state::AppState;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit, http::StatusCode, middleware as axum_middleware, routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{Config, API_KEY_VAR};
use crate::upstream::OpenAiUpstream;

pub async fn serve(config: Config) -> Result<()> {
    let upstream = OpenAiUpstream::from_config(&config)?;
    if config.api_key().is_none() {
        tracing::warn!("{API_KEY_VAR} is not set, every POST will be answered with 500");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid listen address")?;
    tracing::info!(
        endpoint = %config.endpoint,
        upstream = upstream.url(),
        "Starting server on http://{}",
        addr
    );

    let state = AppState::new(config, Arc::new(upstream));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 构建路由：中继端点同时挂载在配置路径和 `/` 上
pub fn build_router(state: AppState) -> Router {
    let endpoint = state.config().endpoint.clone();
    let request_timeout = state.config().request_timeout;
    let max_body_bytes = state.config().max_body_bytes;

    let mut router = Router::new().route(&endpoint, any(handlers::handle_chat_endpoint));
    if endpoint != "/" {
        router = router.route("/", any(handlers::handle_chat_endpoint));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::cors_headers))
                .layer(axum_middleware::from_fn(middleware::request_logger))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    tokio::select! {
        _ = ctrl_c => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
