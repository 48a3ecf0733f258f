//! # vmetrics
//!
//! 面向 RedTrack 的单飞限速请求队列与转化漏斗投影服务。
//!
//! A small metrics backend for affiliate dashboards. Every call to the
//! RedTrack reporting API goes through one process-wide queue that keeps at
//! most one request in flight, spaces calls apart and absorbs rate limiting;
//! funnel endpoints then project conversions and tracks into ordered stages.
//!
//! ## Overview
//!
//! - **Single-flight**: [`queue::RequestQueue`] issues upstream calls strictly
//!   one at a time, in FIFO order, with a minimum gap between them
//! - **Rate-limit tolerant**: HTTP 429 is retried after a fixed backoff and then
//!   degrades to an explicit, per-call-site [`queue::Fallback`]
//! - **Data-driven funnel**: [`funnel::FunnelProjector`] derives stages from a
//!   list of [`funnel::StageDefinition`]s, skipping empty ones
//! - **Cached routes**: [`api`] handlers cache reshaped responses per endpoint
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vmetrics::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> vmetrics::Result<()> {
//!     let config = Config::load()?;
//!     vmetrics::api::serve(config).await
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`queue`] | Single-flight, rate-limited upstream request queue |
//! | [`funnel`] | Funnel stage projection over conversions and tracks |
//! | [`redtrack`] | RedTrack URL building, query validation, page parsing |
//! | [`transport`] | HTTP transport abstraction over reqwest |
//! | [`cache`] | TTL response cache with pluggable backends |
//! | [`api`] | axum route layer |
//! | [`config`] | YAML and environment configuration |

pub mod api;
pub mod cache;
pub mod config;
pub mod funnel;
pub mod queue;
pub mod redtrack;
pub mod transport;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
