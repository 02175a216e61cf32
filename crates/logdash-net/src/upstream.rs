//! Direct client for the upstream v1 API.
//!
//! Event streams are paged: each page carries `nextPageTimestamp` while more
//! events remain in the requested range, and the client keeps requesting
//! from that timestamp until the range is exhausted. A range that needs more
//! than `MAX_EVENT_PAGES` pages fails instead of returning a partial stream.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use logdash_shared::{QueryDefinition, QueryKind, ReportCode};

use crate::api::{check_status, EventPayload, RawPayload, RemoteApi, ReportMeta, TablePayload};
use crate::error::{NetError, Result};

/// Upper bound on pages fetched for one range.
const MAX_EVENT_PAGES: usize = 500;

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(NetError::BaseUrl(base_url));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
        })
    }

    fn range_params(
        &self,
        start: i64,
        end: i64,
        query: &QueryDefinition,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("api_key", self.api_key.clone()),
        ];
        if !query.filter.trim().is_empty() {
            params.push(("filter", query.filter.clone()));
        }
        if let Some(cutoff) = query.cutoff {
            params.push(("cutoff", cutoff.to_string()));
        }
        params
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = self.http.get(url).query(params).send().await?;
        let body = check_status(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_events(
        &self,
        code: &ReportCode,
        start: i64,
        end: i64,
        query: &QueryDefinition,
    ) -> Result<EventPayload> {
        let url = format!("{}/report/events/{}", self.base_url, code);
        let url = &url;
        let events = collect_pages(start, end, MAX_EVENT_PAGES, move |page_start| {
            let params = self.range_params(page_start, end, query);
            async move { self.get_json::<EventPayload>(url, &params).await }
        })
        .await
        .map_err(|e| {
            if let NetError::PageLimit { .. } = e {
                warn!(report = %code, start, end, error = %e, "event stream truncated");
            }
            e
        })?;
        debug!(report = %code, count = events.len(), "received events");

        Ok(EventPayload {
            events,
            next_page_timestamp: None,
        })
    }
}

/// Request pages from `start` until the range `[start, end]` is exhausted.
/// Hitting `max_pages` is an error so a truncated stream is never cached.
async fn collect_pages<F, Fut>(
    start: i64,
    end: i64,
    max_pages: usize,
    mut fetch: F,
) -> Result<Vec<Value>>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<EventPayload>>,
{
    let mut events = Vec::new();
    let mut page_start = start;
    for _ in 0..max_pages {
        let payload = fetch(page_start).await?;
        events.extend(payload.events);
        match next_page_start(payload.next_page_timestamp, page_start, end) {
            Some(next) => page_start = next,
            None => return Ok(events),
        }
    }
    Err(NetError::PageLimit {
        pages: max_pages,
        resume_at: page_start,
    })
}

/// Where the next page starts, or `None` once the range is exhausted. A
/// timestamp that does not move forward ends paging rather than looping.
fn next_page_start(next: Option<i64>, current: i64, end: i64) -> Option<i64> {
    next.filter(|&ts| ts > current && ts <= end)
}

#[async_trait]
impl RemoteApi for UpstreamClient {
    async fn fetch_report_meta(&self, code: &ReportCode) -> Result<ReportMeta> {
        let url = format!("{}/report/fights/{}", self.base_url, code);
        info!(report = %code, "requesting report fights");
        self.get_json(&url, &[("api_key", self.api_key.clone())])
            .await
    }

    async fn fetch_query_data(
        &self,
        code: &ReportCode,
        start: i64,
        end: i64,
        query: &QueryDefinition,
    ) -> Result<RawPayload> {
        match query.kind {
            QueryKind::Event => self
                .fetch_events(code, start, end, query)
                .await
                .map(RawPayload::Events),
            QueryKind::Table { table } => {
                let url = format!("{}/report/tables/{}/{}", self.base_url, table.as_str(), code);
                let payload: TablePayload = self
                    .get_json(&url, &self.range_params(start, end, query))
                    .await?;
                Ok(RawPayload::Table(payload))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paging_stops_at_range_end() {
        assert_eq!(next_page_start(Some(50), 0, 100), Some(50));
        assert_eq!(next_page_start(Some(150), 0, 100), None);
        assert_eq!(next_page_start(None, 0, 100), None);
    }

    #[test]
    fn paging_stops_when_timestamp_stalls() {
        assert_eq!(next_page_start(Some(40), 40, 100), None);
    }

    fn page(events: &[i64], next: Option<i64>) -> Result<EventPayload> {
        Ok(EventPayload {
            events: events.iter().map(|ts| json!({ "timestamp": ts })).collect(),
            next_page_timestamp: next,
        })
    }

    #[tokio::test]
    async fn pages_are_concatenated() {
        let mut requested = Vec::new();
        let events = collect_pages(0, 100, 10, |from| {
            requested.push(from);
            let result = match from {
                0 => page(&[0, 10], Some(20)),
                20 => page(&[20, 30], Some(40)),
                _ => page(&[40], None),
            };
            std::future::ready(result)
        })
        .await
        .unwrap();
        assert_eq!(requested, vec![0, 20, 40]);
        assert_eq!(events.len(), 5);
    }

    #[tokio::test]
    async fn page_limit_is_an_error() {
        let result =
            collect_pages(0, 100, 3, |from| std::future::ready(page(&[from], Some(from + 1)))).await;
        assert!(matches!(
            result,
            Err(NetError::PageLimit {
                pages: 3,
                resume_at: 3
            })
        ));
    }

    #[test]
    fn range_params_include_cutoff_and_filter() {
        let client = UpstreamClient::new("https://example.test/v1", "key").unwrap();
        let query = QueryDefinition::event("type = 'death'").with_cutoff(2.0);
        let params = client.range_params(5, 10, &query);
        assert!(params.contains(&("cutoff", "2".to_string())));
        assert!(params.contains(&("filter", "type = 'death'".to_string())));
        assert!(params.contains(&("api_key", "key".to_string())));

        let bare = client.range_params(5, 10, &QueryDefinition::event(" "));
        assert!(!bare.iter().any(|(k, _)| *k == "filter" || *k == "cutoff"));
    }
}
