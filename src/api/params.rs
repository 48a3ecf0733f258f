use super::ApiError;
use crate::cache::CACHE_BUST_PARAM;
use crate::redtrack::ReportQuery;
use axum::http::HeaderMap;
use std::collections::HashMap;

pub(crate) const API_KEY_HEADER: &str = "x-api-key";

/// Validated inbound parameters plus whether the caller asked to bypass the cache.
#[derive(Debug)]
pub(crate) struct ReportParams {
    pub query: ReportQuery,
    pub bust_cache: bool,
}

pub(crate) fn report_params(
    params: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Result<ReportParams, ApiError> {
    let api_key = non_empty(params, "api_key")
        .or_else(|| {
            headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .ok_or_else(|| ApiError::Unauthorized("Missing API key".to_string()))?;

    let date_from = required(params, "date_from")?;
    let date_to = required(params, "date_to")?;

    let per = match non_empty(params, "per") {
        Some(raw) => Some(raw.parse::<u32>().map_err(|_| {
            ApiError::BadRequest(format!("per must be a positive integer, got {raw:?}"))
        })?),
        None => None,
    };

    let query = ReportQuery::parse(api_key, date_from, date_to)?
        .with_campaign_id(non_empty(params, "campaign_id").map(String::from))
        .with_status(non_empty(params, "status").map(String::from))
        .with_event_type(non_empty(params, "type").map(String::from))
        .with_per(per);

    Ok(ReportParams {
        query,
        bust_cache: params.contains_key(CACHE_BUST_PARAM),
    })
}

fn non_empty<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, ApiError> {
    non_empty(params, name)
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required parameter: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_api_key_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("hdr_key_123"));
        let parsed = report_params(
            &params(&[("date_from", "2024-05-01"), ("date_to", "2024-05-02")]),
            &headers,
        )
        .unwrap();
        assert_eq!(parsed.query.api_key, "hdr_key_123");
        assert!(!parsed.bust_cache);
    }

    #[test]
    fn test_query_key_wins_and_filters_apply() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("hdr_key_123"));
        let parsed = report_params(
            &params(&[
                ("api_key", "qry_key_456"),
                ("date_from", "2024-05-01"),
                ("date_to", "2024-05-02"),
                ("campaign_id", ""),
                ("status", "APPROVED"),
                ("per", "500"),
                ("_t", "1715000000"),
            ]),
            &headers,
        )
        .unwrap();
        assert_eq!(parsed.query.api_key, "qry_key_456");
        assert_eq!(parsed.query.campaign_id, None);
        assert_eq!(parsed.query.status.as_deref(), Some("APPROVED"));
        assert_eq!(parsed.query.per, Some(500));
        assert!(parsed.bust_cache);
    }

    #[test]
    fn test_rejections() {
        let none = HeaderMap::new();
        assert!(matches!(
            report_params(&params(&[("date_from", "2024-05-01"), ("date_to", "2024-05-02")]), &none),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            report_params(&params(&[("api_key", "short"), ("date_from", "2024-05-01"), ("date_to", "2024-05-02")]), &none),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            report_params(&params(&[("api_key", "good_key_1"), ("date_to", "2024-05-02")]), &none),
            Err(ApiError::BadRequest(m)) if m == "Missing required parameter: date_from"
        ));
        assert!(matches!(
            report_params(&params(&[("api_key", "good_key_1"), ("date_from", "2024-05-03"), ("date_to", "2024-05-02")]), &none),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            report_params(&params(&[("api_key", "good_key_1"), ("date_from", "2024-05-01"), ("date_to", "2024-05-02"), ("per", "-1")]), &none),
            Err(ApiError::BadRequest(_))
        ));
    }
}
