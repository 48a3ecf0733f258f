//! 传输层模块：对上游 REST API 发起 HTTP GET 请求的抽象。
//!
//! # Transport Module
//!
//! The outbound HTTP seam used by the request queue. The queue only reads a
//! status code and the raw body; tests swap in scripted transports.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Transport`] | Async trait issuing a single GET |
//! | [`HttpTransport`] | reqwest-backed production implementation |
//! | [`TransportResponse`] | Status code plus raw body bytes |

mod http;

pub use http::{HttpTransport, TransportError};

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

/// Raw upstream response, before any JSON decoding.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one GET. Non-2xx statuses are returned, not raised; only
    /// connection-level failures become `Err`.
    async fn get(&self, url: &str, headers: &HashMap<String, String>) -> Result<TransportResponse>;
}
