//! Client for the query proxy, which holds the upstream API key on behalf of
//! the dashboard.
//!
//! - `GET  {base}/api/v1/proxy/meta/{code}`
//! - `POST {base}/api/v1/proxy/query` with `{code, start, end, query}`

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use logdash_shared::{QueryDefinition, ReportCode};

use crate::api::{check_status, RawPayload, RemoteApi, ReportMeta};
use crate::error::{NetError, Result};

#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ProxyQuery<'a> {
    code: &'a ReportCode,
    start: i64,
    end: i64,
    query: &'a QueryDefinition,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(NetError::BaseUrl(base_url));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn meta_url(&self, code: &ReportCode) -> String {
        format!("{}/api/v1/proxy/meta/{}", self.base_url, code)
    }

    pub fn query_url(&self) -> String {
        format!("{}/api/v1/proxy/query", self.base_url)
    }
}

#[async_trait]
impl RemoteApi for ProxyClient {
    async fn fetch_report_meta(&self, code: &ReportCode) -> Result<ReportMeta> {
        let url = self.meta_url(code);
        debug!(url = %url, "requesting report metadata");

        let response = check_status(self.http.get(&url).send().await?).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_query_data(
        &self,
        code: &ReportCode,
        start: i64,
        end: i64,
        query: &QueryDefinition,
    ) -> Result<RawPayload> {
        debug!(report = %code, start, end, query_key = %query.key(), "requesting query data");

        let response = self
            .http
            .post(self.query_url())
            .json(&ProxyQuery {
                code,
                start,
                end,
                query,
            })
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        RawPayload::parse(&body)
    }
}
