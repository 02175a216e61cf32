//! Fixtures shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use logdash_net::{EventPayload, NetError, RawPayload, RemoteApi, ReportMeta, TablePayload};
use logdash_shared::{ActorMeta, FightId, FightMeta, QueryDefinition, QueryKind, ReportCode};

pub fn report_code() -> ReportCode {
    ReportCode::new("ABC123").unwrap()
}

pub fn fight(id: FightId, boss: i64, start_time: i64, end_time: i64) -> FightMeta {
    FightMeta {
        id,
        boss,
        name: format!("Fight {id}"),
        start_time,
        end_time,
    }
}

/// Three boss fights: 1 `[0,2]`, 2 `[3,7]`, 3 `[8,10]`.
pub fn fixture_meta() -> ReportMeta {
    ReportMeta {
        fights: vec![fight(1, 1, 0, 2), fight(2, 1, 3, 7), fight(3, 1, 8, 10)],
        friendlies: vec![ActorMeta {
            id: 1,
            name: "Alice".into(),
        }],
        enemies: vec![ActorMeta {
            id: 100,
            name: "Boss".into(),
        }],
        title: Some("Fixture raid".into()),
        start: Some(1_600_000_000_000),
    }
}

/// Events at 0, 1, 2 (fight 1), 3, 5, 7 (fight 2) and 8, 10 (fight 3).
pub fn fixture_events() -> Vec<Value> {
    [0, 1, 2, 3, 5, 7, 8, 10]
        .into_iter()
        .map(|ts| json!({ "timestamp": ts, "type": "damage", "sourceID": 1, "targetID": 100 }))
        .collect()
}

/// Scripted remote API serving the fixture report. It counts calls, fails on
/// demand (everything or one range) and can hold query responses until the
/// gate gets permits.
pub struct FakeApi {
    meta: ReportMeta,
    events: Vec<Value>,
    meta_calls: AtomicUsize,
    query_calls: AtomicUsize,
    fail_meta: AtomicBool,
    fail_queries: AtomicBool,
    fail_range: Mutex<Option<(i64, i64)>>,
    gate: Option<Arc<Semaphore>>,
    ranges: Mutex<Vec<(i64, i64)>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            meta: fixture_meta(),
            events: fixture_events(),
            meta_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            fail_meta: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
            fail_range: Mutex::new(None),
            gate: None,
            ranges: Mutex::new(Vec::new()),
        }
    }

    /// Query calls wait for a permit from the returned semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let api = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new()
        };
        (api, gate)
    }

    pub fn meta_calls(&self) -> usize {
        self.meta_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn ranges(&self) -> Vec<(i64, i64)> {
        self.ranges.lock().unwrap().clone()
    }

    pub fn set_fail_meta(&self, fail: bool) {
        self.fail_meta.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Fail only query calls for exactly this time range.
    pub fn set_fail_range(&self, range: Option<(i64, i64)>) {
        *self.fail_range.lock().unwrap() = range;
    }
}

fn server_error() -> NetError {
    NetError::Status {
        status: 500,
        body: "internal error".into(),
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn fetch_report_meta(&self, _code: &ReportCode) -> logdash_net::error::Result<ReportMeta> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_meta.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(self.meta.clone())
    }

    async fn fetch_query_data(
        &self,
        _code: &ReportCode,
        start: i64,
        end: i64,
        query: &QueryDefinition,
    ) -> logdash_net::error::Result<RawPayload> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.ranges.lock().unwrap().push((start, end));
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|_| server_error())?;
        }
        if self.fail_queries.load(Ordering::SeqCst)
            || *self.fail_range.lock().unwrap() == Some((start, end))
        {
            return Err(server_error());
        }
        Ok(match query.kind {
            QueryKind::Event => RawPayload::Events(EventPayload {
                events: self
                    .events
                    .iter()
                    .filter(|event| {
                        event["timestamp"]
                            .as_i64()
                            .is_some_and(|ts| ts >= start && ts <= end)
                    })
                    .cloned()
                    .collect(),
                next_page_timestamp: None,
            }),
            QueryKind::Table { .. } => RawPayload::Table(TablePayload {
                entries: vec![json!({ "name": "Alice", "total": end - start })],
                total_time: end - start,
            }),
        })
    }
}
