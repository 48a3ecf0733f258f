use super::{Transport, TransportResponse};
use crate::{ErrorContext, Result};
use async_trait::async_trait;
use reqwest::Proxy;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

const PROXY_ENV: &str = "VMETRICS_PROXY_URL";

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let timeout_secs = env_u64("VMETRICS_HTTP_TIMEOUT_SECS").unwrap_or(30);

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(
                env::var("VMETRICS_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(8),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env_u64("VMETRICS_HTTP_POOL_IDLE_TIMEOUT_SECS").unwrap_or(90),
            )))
            .user_agent(concat!("vmetrics/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = proxy_from(env::var(PROXY_ENV).ok().as_deref())? {
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client })
    }

    /// Wrap an already configured reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn proxy_from(url: Option<&str>) -> Result<Option<Proxy>> {
    let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
        return Ok(None);
    };
    Proxy::all(url).map(Some).map_err(|e| {
        crate::Error::configuration_with_context(
            format!("invalid proxy URL: {url}"),
            ErrorContext::new()
                .with_field_path(PROXY_ENV)
                .with_details(e.to_string())
                .with_source("http_transport"),
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|s| s.parse::<u64>().ok())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, headers: &HashMap<String, String>) -> Result<TransportResponse> {
        let mut request = self.client.get(url).header("accept", "application/json");

        for (k, v) in headers {
            request = request.header(k, v);
        }

        let response = request
            .send()
            .await
            .map_err(|e| crate::Error::Transport(TransportError::Http(e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| crate::Error::Transport(TransportError::Http(e)))?;

        Ok(TransportResponse { status, body })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
