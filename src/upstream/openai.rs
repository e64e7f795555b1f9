//! OpenAI Chat Completions 上游
//!
//! 基于 reqwest 的实现，每次调用只发出一个 HTTP 请求，不做重试。

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use http::{header, HeaderValue};
use reqwest::Client;
use std::time::Duration;

use crate::chat::UpstreamPayload;
use crate::config::Config;
use crate::upstream::{Upstream, UpstreamResponse};

const CONNECT_TIMEOUT_SECS: u64 = 10;

pub struct OpenAiUpstream {
    client: Client,
    url: String,
}

impl OpenAiUpstream {
    pub fn new(url: impl Into<String>, timeout: Duration, disable_tls_verify: bool) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(10);

        if disable_tls_verify {
            tracing::warn!("TLS certificate verification is DISABLED - for debugging only!");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().context("Failed to create upstream HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.upstream_url.clone(),
            config.upstream_timeout,
            config.disable_tls_verify,
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Upstream for OpenAiUpstream {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, credential: &str, payload: &UpstreamPayload) -> Result<UpstreamResponse> {
        let accept = if payload.stream {
            "text/event-stream"
        } else {
            "application/json"
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(credential)
            .header(header::ACCEPT, HeaderValue::from_static(accept))
            .json(payload)
            .send()
            .await
            .context("Failed to send request to upstream API")?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(upstream = self.name(), %status, "upstream returned error status");
        }

        let body = response.bytes_stream().map_err(std::io::Error::other);

        Ok(UpstreamResponse {
            status,
            body: Box::pin(body),
        })
    }
}
