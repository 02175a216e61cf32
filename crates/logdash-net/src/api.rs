//! The remote API contract and its payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use logdash_shared::{ActorMeta, FightMeta, QueryDefinition, ReportCode};

use crate::error::{NetError, Result};

/// Report metadata returned by the fights endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReportMeta {
    #[serde(default)]
    pub fights: Vec<FightMeta>,
    #[serde(default)]
    pub friendlies: Vec<ActorMeta>,
    #[serde(default)]
    pub enemies: Vec<ActorMeta>,
    #[serde(default)]
    pub title: Option<String>,
    /// Report start, unix epoch millis.
    #[serde(default)]
    pub start: Option<i64>,
}

/// One page of an event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventPayload {
    pub events: Vec<Value>,
    #[serde(
        rename = "nextPageTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub next_page_timestamp: Option<i64>,
}

/// An aggregated table over a time range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TablePayload {
    pub entries: Vec<Value>,
    #[serde(rename = "totalTime", default)]
    pub total_time: i64,
}

/// Raw query data for one time range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawPayload {
    Events(EventPayload),
    Table(TablePayload),
}

impl RawPayload {
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(NetError::from)
    }
}

/// Asynchronous access to report metadata and query data.
///
/// Implementations are expected to be cheap to share; the client layer holds
/// one behind an `Arc` and issues many calls concurrently.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn fetch_report_meta(&self, code: &ReportCode) -> Result<ReportMeta>;

    /// Data for `query` between `start` and `end` (report-relative millis).
    async fn fetch_query_data(
        &self,
        code: &ReportCode,
        start: i64,
        end: i64,
        query: &QueryDefinition,
    ) -> Result<RawPayload>;
}

/// Turn a non-success response into [`NetError::Status`] carrying its body.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.as_u16() >= 300 {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), body = %body, "remote API returned an error");
        return Err(NetError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
