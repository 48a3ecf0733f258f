use super::query::DATE_FORMAT;
use super::{Page, ReportQuery};
use crate::queue::{Fallback, RequestQueue, UpstreamRequest};
use crate::{Error, ErrorContext, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Builds RedTrack URLs and routes every call through the shared queue.
#[derive(Clone)]
pub struct RedTrackClient {
    base_url: Url,
    queue: RequestQueue,
}

impl RedTrackClient {
    pub fn new(base_url: &str, queue: RequestQueue) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid RedTrack base URL: {e}"),
                ErrorContext::new()
                    .with_field_path("redtrack_base_url")
                    .with_details(base_url.to_string())
                    .with_source("redtrack_client"),
            )
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::configuration_with_context(
                "RedTrack base URL cannot carry a path",
                ErrorContext::new()
                    .with_field_path("redtrack_base_url")
                    .with_source("redtrack_client"),
            ));
        }
        Ok(Self { base_url, queue })
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub async fn conversions<T: DeserializeOwned>(&self, query: &ReportQuery) -> Result<Page<T>> {
        let mut url = self.endpoint("conversions", query)?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(ref status) = query.status {
                pairs.append_pair("status", status);
            }
            if let Some(ref event_type) = query.event_type {
                pairs.append_pair("type", event_type);
            }
            if let Some(per) = query.per {
                pairs.append_pair("per", &per.to_string());
            }
        }
        let body = self.queue.enqueue(UpstreamRequest::new(url), Fallback::EmptyPage).await?;
        Page::from_value(body)
    }

    pub async fn tracks<T: DeserializeOwned>(&self, query: &ReportQuery) -> Result<Page<T>> {
        let mut url = self.endpoint("tracks", query)?;
        if let Some(per) = query.per {
            url.query_pairs_mut().append_pair("per", &per.to_string());
        }
        let body = self.queue.enqueue(UpstreamRequest::new(url), Fallback::EmptyPage).await?;
        Page::from_value(body)
    }

    pub async fn campaigns(&self, query: &ReportQuery) -> Result<Vec<Value>> {
        let url = self.endpoint("campaigns", query)?;
        let body = self.queue.enqueue(UpstreamRequest::new(url), Fallback::EmptyList).await?;
        // Some accounts get the paged shape back; flatten it.
        Ok(Page::<Value>::from_value(body)?.items)
    }

    fn endpoint(&self, path: &str, query: &ReportQuery) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::runtime("RedTrack base URL cannot carry a path"))?
            .pop_if_empty()
            .push(path);

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api_key", &query.api_key);
            pairs.append_pair("date_from", &query.date_from.format(DATE_FORMAT).to_string());
            pairs.append_pair("date_to", &query.date_to.format(DATE_FORMAT).to_string());
            if let Some(ref campaign_id) = query.campaign_id {
                pairs.append_pair("campaign_id", campaign_id);
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueConfig;
    use crate::transport::{Transport, TransportResponse};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Answers every GET with the same body and remembers the URLs it saw.
    struct FixedTransport {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn get(&self, url: &str, _: &HashMap<String, String>) -> Result<TransportResponse> {
            self.seen.lock().unwrap().push(url.to_string());
            Ok(TransportResponse::new(self.status, self.body))
        }
    }

    fn client(status: u16, body: &'static str, base: &str) -> (RedTrackClient, Arc<FixedTransport>) {
        let transport = Arc::new(FixedTransport {
            status,
            body,
            seen: Mutex::new(Vec::new()),
        });
        let queue = RequestQueue::new(transport.clone(), QueueConfig::default());
        (RedTrackClient::new(base, queue).unwrap(), transport)
    }

    fn query() -> ReportQuery {
        ReportQuery::parse("key_12345678", "2024-05-01", "2024-05-07").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversions_url_and_parsing() {
        let (client, transport) = client(
            200,
            r#"{"items": [{"type": "conversion", "status": "APPROVED"}], "total": 1}"#,
            "https://api.redtrack.io/",
        );
        let q = query()
            .with_campaign_id(Some("c1".into()))
            .with_event_type(Some("conversion".into()))
            .with_per(Some(1000));

        let page: Page<crate::funnel::ConversionEvent> = client.conversions(&q).await.unwrap();

        assert_eq!(page.total, 1);
        assert!(page.items[0].is_approved());
        assert_eq!(
            transport.seen.lock().unwrap()[0],
            "https://api.redtrack.io/conversions?api_key=key_12345678&date_from=2024-05-01&date_to=2024-05-07&campaign_id=c1&type=conversion&per=1000"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_base_path_is_kept() {
        let (client, transport) = client(200, "[]", "https://proxy.example.com/redtrack");
        client.tracks::<Value>(&query()).await.unwrap();
        assert!(transport.seen.lock().unwrap()[0]
            .starts_with("https://proxy.example.com/redtrack/tracks?api_key="));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_campaigns_degrade_to_empty() {
        let (client, transport) = client(429, "", "https://api.redtrack.io");
        let campaigns = client.campaigns(&query()).await.unwrap();
        assert!(campaigns.is_empty());
        assert_eq!(transport.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_error_is_propagated() {
        let (client, _) = client(403, r#"{"error": "forbidden"}"#, "https://api.redtrack.io");
        let err = client.campaigns(&query()).await.unwrap_err();
        assert_eq!(err.upstream_status(), Some(403));
        assert_eq!(err.to_string(), "Upstream error: HTTP 403: forbidden");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let transport = Arc::new(FixedTransport {
            status: 200,
            body: "",
            seen: Mutex::new(Vec::new()),
        });
        let queue = RequestQueue::new(transport, QueueConfig::default());
        assert!(RedTrackClient::new("not a url", queue.clone()).is_err());
        assert!(RedTrackClient::new("mailto:ops@example.com", queue).is_err());
    }
}
