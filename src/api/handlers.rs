use super::params::{report_params, ReportParams};
use super::{ApiError, AppState};
use crate::cache::{CacheKey, CacheManager};
use crate::funnel::{ConversionEvent, FunnelResult, TrackEvent};
use crate::redtrack::Page;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

/// RedTrack's largest page. Ranges beyond it are projected from the first page.
const FUNNEL_PAGE_SIZE: u32 = 1000;

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let queue = state.redtrack.queue().snapshot().await;
    let caches = &state.caches;
    Ok(Json(json!({
        "status": "ok",
        "queue": queue,
        "caches": {
            "funnel": caches.funnel.report().await?,
            "conversions": caches.conversions.report().await?,
            "campaigns": caches.campaigns.report().await?,
        },
    })))
}

pub async fn funnel(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<FunnelResult>, ApiError> {
    let ReportParams { query, bust_cache } = report_params(&params, &headers)?;
    let key = CacheKey::for_endpoint("funnel", query.cache_params());

    let (redtrack, projector) = (&state.redtrack, &state.projector);
    let result = cached(&state.caches.funnel, &key, bust_cache, || async move {
        let per = query.per.unwrap_or(FUNNEL_PAGE_SIZE);
        let query = query.with_per(Some(per));
        let (conversions, tracks) = tokio::try_join!(
            redtrack.conversions::<ConversionEvent>(&query),
            redtrack.tracks::<TrackEvent>(&query),
        )?;
        for (endpoint, partial, fetched, total) in [
            ("conversions", conversions.is_partial(), conversions.items.len(), conversions.total),
            ("tracks", tracks.is_partial(), tracks.items.len(), tracks.total),
        ] {
            if partial {
                warn!(endpoint, fetched, total, per, "funnel built from a partial page; stages are undercounted");
            }
        }
        Ok::<_, crate::Error>(projector.project(&conversions.items, &tracks.items))
    })
    .await?;

    Ok(Json(result))
}

pub async fn conversions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Page<Value>>, ApiError> {
    let ReportParams { query, bust_cache } = report_params(&params, &headers)?;
    let key = CacheKey::for_endpoint("conversions", query.cache_params());

    let redtrack = &state.redtrack;
    let page = cached(&state.caches.conversions, &key, bust_cache, || async move {
        redtrack.conversions::<Value>(&query).await
    })
    .await?;

    Ok(Json(page))
}

pub async fn campaigns(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let ReportParams { query, bust_cache } = report_params(&params, &headers)?;
    let key = CacheKey::for_endpoint("campaigns", query.cache_params());

    let redtrack = &state.redtrack;
    let campaigns = cached(&state.caches.campaigns, &key, bust_cache, || async move {
        redtrack.campaigns(&query).await
    })
    .await?;

    Ok(Json(campaigns))
}

/// Serve `key` from `cache` unless busted, otherwise run `fetch` and store its result.
///
/// Cache backend failures are logged and never fail the request.
async fn cached<T, F, Fut>(
    cache: &CacheManager,
    key: &CacheKey,
    bust: bool,
    fetch: F,
) -> Result<T, ApiError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    if bust {
        if let Err(e) = cache.delete(key).await {
            warn!(key = %key, error = %e, "cache delete failed");
        }
    } else {
        match cache.get::<T>(key).await {
            Ok(Some(hit)) => {
                debug!(key = %key, "cache hit");
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "cache read failed"),
        }
    }

    let fresh = fetch().await?;
    if let Err(e) = cache.set(key, &fresh).await {
        warn!(key = %key, error = %e, "cache write failed");
    }
    Ok(fresh)
}
