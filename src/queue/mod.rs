//! 请求队列模块：对上游 API 的单飞、限速、FIFO 请求队列。
//!
//! # Outbound Request Queue
//!
//! RedTrack enforces a strict per-key rate limit. Every upstream call made by
//! the dashboard backend goes through one shared [`RequestQueue`], which:
//!
//! - serves requests strictly in FIFO order
//! - keeps at most one upstream call in flight
//! - waits at least [`QueueConfig::min_interval`] between the completion of
//!   one call and the start of the next
//! - retries an HTTP 429 after a fixed backoff, then resolves with the
//!   caller-supplied [`Fallback`] instead of failing
//!
//! Any other non-2xx status and transport failures are returned to the caller
//! unchanged so the route layer can pick the user-visible status.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vmetrics::queue::{Fallback, QueueConfig, RequestQueue, UpstreamRequest};
//! use vmetrics::transport::HttpTransport;
//!
//! # async fn run() -> vmetrics::Result<()> {
//! let queue = RequestQueue::new(Arc::new(HttpTransport::new()?), QueueConfig::default());
//! let body = queue
//!     .enqueue(
//!         UpstreamRequest::new("https://api.redtrack.io/campaigns?api_key=KEY"),
//!         Fallback::EmptyList,
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod fallback;
mod request_queue;

pub use fallback::Fallback;
pub use request_queue::{QueueConfig, QueueSnapshot, RequestQueue, UpstreamRequest};
