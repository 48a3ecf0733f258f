use super::Fallback;
use crate::transport::{Transport, TransportResponse};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

/// Longest slice of a non-JSON error body echoed back in an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Minimum gap between the completion of one upstream call and the start of the next.
    pub min_interval: Duration,
    /// Fixed wait after an HTTP 429 before the request is tried again.
    pub rate_limit_backoff: Duration,
    /// How many times a rate-limited request is retried before degrading to its fallback.
    pub rate_limit_retries: u32,
}

impl QueueConfig {
    pub fn new() -> Self {
        Self {
            min_interval: Duration::from_millis(1_000),
            rate_limit_backoff: Duration::from_millis(5_000),
            rate_limit_retries: 1,
        }
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_rate_limit_backoff(mut self, backoff: Duration) -> Self {
        self.rate_limit_backoff = backoff;
        self
    }

    pub fn with_rate_limit_retries(mut self, retries: u32) -> Self {
        self.rate_limit_retries = retries;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One outbound GET. Immutable once built.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    url: String,
    headers: HashMap<String, String>,
}

impl UpstreamRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// URL safe to log: the `api_key` query value is masked.
    pub fn redacted_url(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(mut parsed) => {
                let pairs: Vec<(String, String)> = parsed
                    .query_pairs()
                    .map(|(k, v)| {
                        let v = if k == "api_key" { "***".to_string() } else { v.into_owned() };
                        (k.into_owned(), v)
                    })
                    .collect();
                if !pairs.is_empty() {
                    parsed.query_pairs_mut().clear().extend_pairs(pairs);
                }
                parsed.to_string()
            }
            Err(_) => "<unparseable url>".to_string(),
        }
    }
}

/// Point-in-time facts about a queue, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub pending: usize,
    pub draining: bool,
    /// Upstream calls completed so far, retries included.
    pub completed_calls: u64,
}

struct QueuedRequest {
    request: UpstreamRequest,
    fallback: Fallback,
    reply: oneshot::Sender<Result<Value>>,
}

struct State {
    pending: VecDeque<QueuedRequest>,
    draining: bool,
    last_request_at: Option<Instant>,
    completed_calls: u64,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: QueueConfig,
    state: Mutex<State>,
}

/// Single-flight FIFO queue in front of the upstream API.
///
/// Cloning is cheap and every clone feeds the same queue, so one instance per
/// upstream credential gives a global rate limit across all route handlers.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<Inner>,
}

impl RequestQueue {
    pub fn new(transport: Arc<dyn Transport>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(State {
                    pending: VecDeque::new(),
                    draining: false,
                    last_request_at: None,
                    completed_calls: 0,
                }),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Queue a GET and wait for its outcome.
    ///
    /// Resolves with the parsed JSON body, or with `fallback` once rate-limit
    /// retries are exhausted. Fails with [`Error::Remote`] for any other
    /// non-2xx status and with [`Error::Transport`] for connection failures.
    pub async fn enqueue(&self, request: UpstreamRequest, fallback: Fallback) -> Result<Value> {
        let (reply, outcome) = oneshot::channel();

        let start_drain = {
            let mut st = self.inner.state.lock().await;
            st.pending.push_back(QueuedRequest {
                request,
                fallback,
                reply,
            });
            if st.draining {
                false
            } else {
                st.draining = true;
                true
            }
        };

        if start_drain {
            tokio::spawn(Arc::clone(&self.inner).supervise());
        }

        outcome
            .await
            .map_err(|_| Error::runtime("request queue dropped a pending request"))?
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let st = self.inner.state.lock().await;
        QueueSnapshot {
            pending: st.pending.len(),
            draining: st.draining,
            completed_calls: st.completed_calls,
        }
    }
}

impl Inner {
    /// Run the drain, restarting it if a request panics mid-dispatch.
    /// `draining` stays set across the restart; the panicked request's caller
    /// sees its reply channel dropped.
    async fn supervise(self: Arc<Self>) {
        loop {
            match tokio::spawn(Arc::clone(&self).drain()).await {
                Err(e) if e.is_panic() => {
                    error!("request queue drain panicked, resuming with the next request");
                }
                _ => return,
            }
        }
    }

    async fn drain(self: Arc<Self>) {
        loop {
            // Popping and clearing the flag share one critical section, so an
            // enqueue racing with the end of the drain always starts a new one.
            let next = {
                let mut st = self.state.lock().await;
                match st.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        st.draining = false;
                        return;
                    }
                }
            };

            let QueuedRequest {
                request,
                fallback,
                reply,
            } = next;

            let outcome = self.dispatch(&request, fallback).await;
            if reply.send(outcome).is_err() {
                debug!(url = %request.redacted_url(), "caller went away before its request settled");
            }
        }
    }

    async fn dispatch(&self, request: &UpstreamRequest, fallback: Fallback) -> Result<Value> {
        self.pace(Duration::ZERO).await;
        debug!(url = %request.redacted_url(), "dispatching upstream request");

        let response = self.call(request).await?;
        if !response.is_rate_limited() {
            return decode(response);
        }

        let backoff = self.config.rate_limit_backoff;
        for attempt in 1..=self.config.rate_limit_retries {
            warn!(
                url = %request.redacted_url(),
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "upstream rate limited, backing off"
            );
            self.pace(backoff).await;

            match self.call(request).await {
                Ok(resp) if resp.is_success() => return parse_body(&resp),
                Ok(resp) => debug!(status = resp.status, attempt, "rate limit retry failed"),
                Err(e) => debug!(error = %e, attempt, "rate limit retry failed"),
            }
        }

        warn!(
            url = %request.redacted_url(),
            "rate limit retries exhausted, resolving with fallback payload"
        );
        Ok(fallback.into_value())
    }

    /// Sleep until `min_interval` has passed since the last completed call,
    /// and for at least `at_least`.
    async fn pace(&self, at_least: Duration) {
        let spacing = {
            let st = self.state.lock().await;
            st.last_request_at
                .map(|last| self.config.min_interval.saturating_sub(last.elapsed()))
                .unwrap_or(Duration::ZERO)
        };

        let wait = spacing.max(at_least);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn call(&self, request: &UpstreamRequest) -> Result<TransportResponse> {
        let result = self.transport.get(&request.url, &request.headers).await;

        // Spacing is measured from completion, whatever the outcome.
        let mut st = self.state.lock().await;
        st.last_request_at = Some(Instant::now());
        st.completed_calls += 1;

        result
    }
}

fn decode(response: TransportResponse) -> Result<Value> {
    if response.is_success() {
        return parse_body(&response);
    }

    Err(Error::Remote {
        status: response.status,
        message: error_message(&response),
    })
}

fn parse_body(response: &TransportResponse) -> Result<Value> {
    if response.body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&response.body)?)
}

fn error_message(response: &TransportResponse) -> String {
    if let Ok(json) = serde_json::from_slice::<Value>(&response.body) {
        let message = json
            .get("error")
            .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(Value::as_str)))
            .or_else(|| json.get("message").and_then(Value::as_str));
        if let Some(m) = message {
            return m.to_string();
        }
    }

    let text = String::from_utf8_lossy(&response.body);
    let text = text.trim();
    if !text.is_empty() {
        return text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    }

    reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", response.status))
}
