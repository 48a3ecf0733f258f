//! RedTrack 上游模块：构建上游请求 URL 并解析分页结果。
//!
//! # RedTrack Upstream Client
//!
//! Thin typed layer over the RedTrack REST API. Every call goes through the
//! shared [`RequestQueue`](crate::queue::RequestQueue) with an explicit
//! rate-limit fallback per endpoint:
//!
//! | Endpoint | Method | Fallback |
//! |----------|--------|----------|
//! | `/conversions` | [`RedTrackClient::conversions`] | `{"items": [], "total": 0}` |
//! | `/tracks` | [`RedTrackClient::tracks`] | `{"items": [], "total": 0}` |
//! | `/campaigns` | [`RedTrackClient::campaigns`] | `[]` |

mod client;
mod page;
mod query;

pub use client::RedTrackClient;
pub use page::Page;
pub use query::ReportQuery;
