//! 入站 HTTP 路由层：参数校验、缓存、入队、漏斗投影与 JSON 响应。
//!
//! # Inbound Route Layer
//!
//! Thin axum handlers in front of the shared [`RequestQueue`]. Every report
//! handler follows the same shape: validate, consult the endpoint cache
//! (honoring `_t`), enqueue upstream calls, optionally project, cache, respond.
//!
//! | Route | Upstream calls | Response |
//! |-------|----------------|----------|
//! | `GET /health` | none | `{status, queue, caches}` |
//! | `GET /api/funnel` | conversions + tracks | [`FunnelResult`](crate::funnel::FunnelResult) |
//! | `GET /api/conversions` | conversions | `{items, total}` |
//! | `GET /api/campaigns` | campaigns | `[...]` |
//!
//! Status codes: 200 on success (degraded empty results included), 401 when
//! no API key is supplied, 400 for malformed parameters, the upstream status
//! for non-429 upstream errors and 500 for everything else.

mod error;
mod handlers;
mod params;

pub use error::ApiError;

use crate::cache::{CacheBackend, CacheConfig, CacheManager, MemoryCache, NullCache};
use crate::config::{CacheSettings, Config};
use crate::funnel::FunnelProjector;
use crate::queue::RequestQueue;
use crate::redtrack::RedTrackClient;
use crate::transport::{HttpTransport, Transport};
use crate::Result;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// One cache per endpoint, each with its own TTL.
pub struct EndpointCaches {
    pub funnel: CacheManager,
    pub conversions: CacheManager,
    pub campaigns: CacheManager,
}

impl EndpointCaches {
    pub fn new(settings: &CacheSettings) -> Self {
        let cache = |prefix: &str, ttl_secs: u64| {
            let backend: Box<dyn CacheBackend> = if settings.enabled {
                Box::new(MemoryCache::new(settings.max_entries))
            } else {
                Box::new(NullCache)
            };
            CacheManager::new(
                CacheConfig::new()
                    .with_ttl(Duration::from_secs(ttl_secs))
                    .with_key_prefix(prefix),
                backend,
            )
        };
        Self {
            funnel: cache("funnel", settings.funnel_ttl_secs),
            conversions: cache("conversions", settings.conversions_ttl_secs),
            campaigns: cache("campaigns", settings.campaigns_ttl_secs),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub redtrack: RedTrackClient,
    pub projector: Arc<FunnelProjector>,
    pub caches: Arc<EndpointCaches>,
}

impl AppState {
    pub fn new(redtrack: RedTrackClient, cache: &CacheSettings) -> Self {
        Self {
            redtrack,
            projector: Arc::new(FunnelProjector::default()),
            caches: Arc::new(EndpointCaches::new(cache)),
        }
    }

    /// Wire a queue, client and caches from `config` over `transport`.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let queue = RequestQueue::new(transport, config.queue_config());
        let redtrack = RedTrackClient::new(&config.redtrack_base_url, queue)?;
        Ok(Self::new(redtrack, &config.cache))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(params::API_KEY_HEADER),
        ]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/funnel", get(handlers::funnel))
        .route("/api/conversions", get(handlers::conversions))
        .route("/api/campaigns", get(handlers::campaigns))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: Config) -> Result<()> {
    let transport = Arc::new(HttpTransport::new()?);
    let state = AppState::from_config(&config, transport)?;
    let queue = config.queue_config();
    info!(
        min_interval_ms = queue.min_interval.as_millis() as u64,
        rate_limit_backoff_ms = queue.rate_limit_backoff.as_millis() as u64,
        rate_limit_retries = queue.rate_limit_retries,
        upstream = %config.redtrack_base_url,
        "request queue ready"
    );

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
