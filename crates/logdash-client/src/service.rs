//! The cache service: the one owner of the report cache index, the in-flight
//! markers and the record store.
//!
//! Readers use the pure functions of [`relevance`](crate::relevance) and
//! [`assembler`](crate::assembler) against the current state. Fetched data
//! only reaches the index through the merge at the end of
//! [`CacheService::update_queries`], which applies every pending update,
//! purges and bumps the revision under a single lock, so a reader never sees
//! half of a fetch cycle.
//!
//! The state lives behind a `std::sync::Mutex`; it is never held across an
//! await point.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use logdash_net::RemoteApi;
use logdash_shared::{FightId, Guid, QueryDefinition, QueryKey, RecordId, ReportCode};
use logdash_store::{NewRecord, RecordStore};

use crate::assembler::{self, LoadedRows};
use crate::error::{ClientError, Result};
use crate::events::{Notification, Notifier};
use crate::export;
use crate::format::{split_payload, ReportContext};
use crate::purge::purge;
use crate::regions::{coalesce_regions, Region};
use crate::relevance::{self, in_flight_marker};
use crate::section;
use crate::snapshot::{self, MigrationOutcome, PersistedSnapshot, CURRENT_SNAPSHOT_VERSION};
use crate::state::{AppState, ReportCacheEntry};

/// What one `update_queries` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Queries that had missing fights and were dispatched.
    pub queries: usize,
    pub regions: usize,
    pub failed_regions: usize,
    /// Fight fragments stored and merged into the index.
    pub fragments: usize,
}

/// Fetches planned for one query.
struct QueryJob {
    query: QueryDefinition,
    key: QueryKey,
    regions: Vec<Region>,
}

/// Result of fetching and storing one region.
struct RegionOutcome {
    key: QueryKey,
    stored: Vec<(FightId, RecordId)>,
    failed: bool,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Clone)]
pub struct CacheService {
    state: Arc<Mutex<AppState>>,
    store: RecordStore,
    api: Arc<dyn RemoteApi>,
    notifier: Notifier,
    revision: Arc<watch::Sender<u64>>,
    retention_ms: i64,
}

impl CacheService {
    pub fn new(store: RecordStore, api: Arc<dyn RemoteApi>, retention_ms: i64) -> Self {
        Self::with_state(AppState::new(), store, api, retention_ms)
    }

    pub fn with_state(
        state: AppState,
        store: RecordStore,
        api: Arc<dyn RemoteApi>,
        retention_ms: i64,
    ) -> Self {
        let (revision, _) = watch::channel(state.revision);
        Self {
            state: Arc::new(Mutex::new(state)),
            store,
            api,
            notifier: Notifier::new(),
            revision: Arc::new(revision),
            retention_ms,
        }
    }

    /// A panic while holding the lock leaves the state as it was at that
    /// point, which is still a valid cache.
    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the current state.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        let state = self.lock();
        f(&state)
    }

    /// Run `f` against the state and publish a new revision.
    fn mutate<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let (result, revision) = {
            let mut state = self.lock();
            let result = f(&mut *state);
            state.revision += 1;
            (result, state.revision)
        };
        self.revision.send_replace(revision);
        result
    }

    fn try_mutate<R>(&self, f: impl FnOnce(&mut AppState) -> Result<R>) -> Result<R> {
        let (result, revision) = {
            let mut state = self.lock();
            let result = f(&mut *state)?;
            state.revision += 1;
            (result, state.revision)
        };
        self.revision.send_replace(revision);
        Ok(result)
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// Receives the state revision after every published change.
    pub fn subscribe_revisions(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn relevant_fights(&self, query: &QueryDefinition, code: &ReportCode) -> Vec<FightId> {
        self.read(|state| relevance::relevant_fights(query, code, state))
    }

    pub fn missing_fights(&self, query: &QueryDefinition, code: &ReportCode) -> Vec<FightId> {
        self.read(|state| relevance::missing_fights(query, code, state))
    }

    pub fn should_update(&self, query: &QueryDefinition, code: &ReportCode) -> bool {
        self.read(|state| relevance::should_update(query, code, state))
    }

    pub fn get_data_indices(
        &self,
        query: Option<&QueryDefinition>,
        code: &ReportCode,
    ) -> Vec<RecordId> {
        self.read(|state| assembler::get_data_indices(query, code, state))
    }

    pub fn boss_list(&self) -> BTreeMap<i64, String> {
        self.read(AppState::boss_list)
    }

    pub fn reports_in_use(&self) -> Vec<ReportCode> {
        self.read(AppState::reports_in_use)
    }

    pub fn main_report(&self) -> Option<ReportCode> {
        self.read(|state| state.main_report.clone())
    }

    pub fn report(&self, code: &ReportCode) -> Option<ReportCacheEntry> {
        self.read(|state| state.report(code).cloned())
    }

    /// Report a visualization draws from: its section's report, else the
    /// main report.
    pub fn report_for_visualization(&self, guid: Guid) -> Result<Option<ReportCode>> {
        self.read(|state| {
            let viz = state
                .visualizations
                .get(guid)
                .ok_or(ClientError::UnknownVisualization(guid))?;
            let section_code = viz.section.and_then(|id| {
                state
                    .sections
                    .iter()
                    .find(|section| section.id == id)
                    .and_then(|section| section.code.clone())
            });
            Ok(section_code.or_else(|| state.main_report.clone()))
        })
    }

    /// Load and concatenate the rows behind `ids`. Ids whose record is gone
    /// are dropped from the index so the fight gets fetched again.
    pub async fn load_rows(&self, ids: Vec<RecordId>) -> Result<LoadedRows> {
        let records = self.store.get_many(ids.clone()).await?;
        let loaded = assembler::assemble(&ids, records);
        if !loaded.stale.is_empty() {
            debug!(stale = ?loaded.stale, "index points at missing records");
            self.clear_stale_indices(&loaded.stale);
        }
        Ok(loaded)
    }

    /// Rows of one visualization against the report it draws from.
    pub async fn visualization_data(&self, guid: Guid) -> Result<LoadedRows> {
        let Some(code) = self.report_for_visualization(guid)? else {
            return Ok(LoadedRows::default());
        };
        let ids = self.read(|state| {
            let query = state
                .visualizations
                .get(guid)
                .and_then(|viz| viz.query.as_ref());
            assembler::get_data_indices(query, &code, state)
        });
        if ids.is_empty() {
            return Ok(LoadedRows::default());
        }
        self.load_rows(ids).await
    }

    /// Drop every index entry pointing at one of `ids`.
    pub fn clear_stale_indices(&self, ids: &[RecordId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let removed = self.mutate(|state| state.clear_indices(ids));
        if removed > 0 {
            info!(removed, "cleared stale index entries");
        }
        removed
    }

    /// Empty the record store and every query index.
    pub async fn reset_cache(&self) -> Result<usize> {
        let cleared = self.store.clear().await?;
        self.mutate(AppState::reset_query_indices);
        info!(cleared, "reset record store");
        Ok(cleared)
    }

    // -----------------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------------

    /// Make `code` the main report, stamping the previous one as last used.
    pub fn set_main_report(&self, code: ReportCode) {
        let now = now_ms();
        self.mutate(|state| {
            if let Some(previous) = state.main_report.take() {
                if let Some(report) = state.reports.get_mut(&previous) {
                    report.last_used = Some(now);
                }
            }
            info!(report = %code, "main report selected");
            state.main_report = Some(code);
        });
    }

    /// Fetch report metadata, then bring its query data up to date.
    ///
    /// A request for a report whose metadata is already being fetched is
    /// skipped. Failure is reported as a notification and leaves the cached
    /// entry as it was.
    pub async fn request_meta(&self, code: &ReportCode) -> UpdateSummary {
        let started = self.mutate(|state| {
            if !state.requests.meta.insert(code.clone()) {
                return false;
            }
            state
                .reports
                .entry(code.clone())
                .or_insert_with(|| ReportCacheEntry::empty(code.clone()));
            true
        });
        if !started {
            debug!(report = %code, "metadata request already in flight");
            return UpdateSummary::default();
        }

        let result = self.api.fetch_report_meta(code).await;

        match result {
            Ok(meta) => {
                info!(report = %code, fights = meta.fights.len(), "report metadata received");
                self.mutate(|state| {
                    state.requests.meta.remove(code);
                    state
                        .reports
                        .entry(code.clone())
                        .or_insert_with(|| ReportCacheEntry::empty(code.clone()))
                        .apply_meta(meta);
                });
            }
            Err(e) => {
                self.mutate(|state| {
                    state.requests.meta.remove(code);
                });
                self.notifier.emit(Notification::MetadataFetchFailed {
                    report: code.clone(),
                    message: e.to_string(),
                });
            }
        }

        self.update_queries(code).await
    }

    /// Synchronise every report in use: unknown reports get their metadata
    /// fetched first, known ones only their query data.
    pub async fn sync_reports_in_use(&self) -> Vec<(ReportCode, UpdateSummary)> {
        let mut summaries = Vec::new();
        for code in self.reports_in_use() {
            let known = self.read(|state| {
                state
                    .report(&code)
                    .is_some_and(|report| !report.fights.is_empty())
            });
            let summary = if known {
                self.update_queries(&code).await
            } else {
                self.request_meta(&code).await
            };
            summaries.push((code, summary));
        }
        summaries
    }

    // -----------------------------------------------------------------------
    // Fetch orchestration
    // -----------------------------------------------------------------------

    /// Mark and plan the fetches for every visualization query with missing
    /// fights. Runs under one lock, so a concurrent call sees the markers.
    fn plan(&self, code: &ReportCode) -> Option<(ReportContext, Vec<QueryJob>)> {
        let mut state = self.lock();
        let report = state.report(code)?;
        let ctx = ReportContext::from_entry(report);

        let queries: Vec<QueryDefinition> = state.visualizations.queries().cloned().collect();
        let mut jobs = Vec::new();
        for query in queries {
            if !relevance::should_update(&query, code, &state) {
                continue;
            }
            let missing = relevance::missing_fights(&query, code, &state);
            if missing.is_empty() {
                continue;
            }
            let key = query.key();
            for &fight in &missing {
                state
                    .requests
                    .queries
                    .insert(in_flight_marker(code, &key, fight));
            }
            let regions = coalesce_regions(query.kind, &missing, &ctx.fights);
            debug!(
                report = %code,
                query_key = %key,
                fights = ?missing,
                regions = regions.len(),
                "dispatching query"
            );
            jobs.push(QueryJob {
                query,
                key,
                regions,
            });
        }
        Some((ctx, jobs))
    }

    fn clear_markers(&self, code: &ReportCode, key: &QueryKey, fights: &[FightId]) {
        let mut state = self.lock();
        for &fight in fights {
            state
                .requests
                .queries
                .remove(&in_flight_marker(code, key, fight));
        }
    }

    async fn fetch_and_store(
        &self,
        ctx: &ReportContext,
        query: &QueryDefinition,
        key: &QueryKey,
        region: &Region,
    ) -> Result<Vec<(FightId, RecordId)>> {
        let payload = self
            .api
            .fetch_query_data(&ctx.code, region.start, region.end, query)
            .await?;
        let parts = split_payload(ctx, &region.fights, query, payload)?;

        let mut stored = Vec::with_capacity(parts.len());
        for (fight, rows) in parts {
            let id = self
                .store
                .insert(NewRecord {
                    report: ctx.code.clone(),
                    fight,
                    query_key: key.clone(),
                    rows,
                })
                .await?;
            stored.push((fight, id));
        }
        Ok(stored)
    }

    async fn run_region(
        &self,
        ctx: &ReportContext,
        job: &QueryJob,
        region: &Region,
    ) -> RegionOutcome {
        match self.fetch_and_store(ctx, &job.query, &job.key, region).await {
            Ok(stored) => RegionOutcome {
                key: job.key.clone(),
                stored,
                failed: false,
            },
            Err(e) => {
                self.clear_markers(&ctx.code, &job.key, &region.fights);
                self.notifier.emit(Notification::QueryFetchFailed {
                    report: ctx.code.clone(),
                    query_key: job.key.clone(),
                    filter: job.query.filter.clone(),
                    fights: region.fights.clone(),
                    message: e.to_string(),
                });
                RegionOutcome {
                    key: job.key.clone(),
                    stored: Vec::new(),
                    failed: true,
                }
            }
        }
    }

    /// Fetch everything the visualizations still miss for `code`.
    ///
    /// Missing fights are marked in flight before the first remote call, so
    /// a concurrent call for the same report does not fetch them again.
    /// Regions run concurrently and independently; once all have settled
    /// their results are merged into the index in one step, followed by a
    /// purge. Errors never escape: failed regions are notified and their
    /// fights stay missing.
    pub async fn update_queries(&self, code: &ReportCode) -> UpdateSummary {
        let Some((ctx, jobs)) = self.plan(code) else {
            debug!(report = %code, "no metadata for report yet");
            return UpdateSummary::default();
        };
        if jobs.is_empty() {
            return UpdateSummary::default();
        }

        let mut summary = UpdateSummary {
            queries: jobs.len(),
            ..UpdateSummary::default()
        };
        let ctx = &ctx;
        let fetches = jobs.iter().flat_map(|job| {
            job.regions
                .iter()
                .map(move |region| self.run_region(ctx, job, region))
        });
        let outcomes = join_all(fetches).await;
        summary.regions = outcomes.len();
        summary.failed_regions = outcomes.iter().filter(|o| o.failed).count();

        let now = now_ms();
        let (revision, dropped) = {
            let mut state = self.lock();
            for outcome in outcomes.iter().filter(|o| !o.failed) {
                for (fight, _) in &outcome.stored {
                    state
                        .requests
                        .queries
                        .remove(&in_flight_marker(code, &outcome.key, *fight));
                }
                let Some(report) = state.reports.get_mut(code) else {
                    continue;
                };
                for &(fight, id) in &outcome.stored {
                    if !report.has_fight(fight) {
                        continue;
                    }
                    report
                        .queries
                        .entry(outcome.key.clone())
                        .or_default()
                        .insert(fight.to_string(), id);
                    summary.fragments += 1;
                }
            }
            if let Some(report) = state.reports.get_mut(code) {
                report.last_used = Some(now);
            }
            let dropped = purge(&mut state, now, self.retention_ms);
            state.revision += 1;
            (state.revision, dropped)
        };
        self.revision.send_replace(revision);

        info!(
            report = %code,
            queries = summary.queries,
            regions = summary.regions,
            failed = summary.failed_regions,
            fragments = summary.fragments,
            purged = dropped.len(),
            revision,
            "merged query updates"
        );
        self.notifier.emit(Notification::QueriesMerged {
            report: code.clone(),
            fragments: summary.fragments,
            revision,
        });
        summary
    }

    // -----------------------------------------------------------------------
    // Visualizations and sections
    // -----------------------------------------------------------------------

    pub fn create_visualization(&self, spec: Value) -> Guid {
        self.mutate(|state| state.visualizations.create(spec))
    }

    pub fn set_visualization_spec(&self, guid: Guid, spec: Value) -> Result<()> {
        self.try_mutate(|state| state.visualizations.set_spec(guid, spec))
    }

    /// Bind a query; call [`update_queries`](Self::update_queries) to fetch
    /// its data.
    pub fn set_visualization_query(&self, guid: Guid, query: Option<QueryDefinition>) -> Result<()> {
        self.try_mutate(|state| state.visualizations.set_query(guid, query))
    }

    pub fn set_visualization_section(&self, guid: Guid, section: Option<Guid>) -> Result<()> {
        self.try_mutate(|state| {
            if let Some(id) = section {
                if !snapshot::section_exists(&state.sections, Some(id)) {
                    return Err(ClientError::UnknownSection(id));
                }
            }
            state.visualizations.set_section(guid, section)
        })
    }

    pub fn duplicate_visualization(&self, guid: Guid) -> Result<Guid> {
        self.try_mutate(|state| state.visualizations.duplicate(guid))
    }

    pub fn delete_visualization(&self, guid: Guid) -> Result<()> {
        self.try_mutate(|state| state.visualizations.delete(guid).map(|_| ()))
    }

    pub fn reorder_visualizations(&self, old_index: usize, new_index: usize) -> Result<()> {
        self.try_mutate(|state| state.visualizations.reorder(old_index, new_index))
    }

    pub fn create_section(&self) -> Guid {
        self.mutate(|state| section::create(&mut state.sections))
    }

    /// Visualizations of a deleted section fall back to no section.
    pub fn delete_section(&self, id: Guid) -> Result<()> {
        self.try_mutate(|state| {
            section::delete(&mut state.sections, id)?;
            state.visualizations.clear_section(id);
            Ok(())
        })
    }

    pub fn set_section_title(&self, id: Guid, title: impl Into<String>) -> Result<()> {
        let title = title.into();
        self.try_mutate(|state| section::set_title(&mut state.sections, id, title))
    }

    pub fn set_section_code(&self, id: Guid, code: Option<ReportCode>) -> Result<()> {
        self.try_mutate(|state| section::set_code(&mut state.sections, id, code))
    }

    pub fn reorder_sections(&self, old_index: usize, new_index: usize) -> Result<()> {
        self.try_mutate(|state| section::reorder(&mut state.sections, old_index, new_index))
    }

    // -----------------------------------------------------------------------
    // Export / import
    // -----------------------------------------------------------------------

    pub fn export_view(&self, guid: Guid) -> Result<String> {
        self.read(|state| {
            let viz = state
                .visualizations
                .get(guid)
                .ok_or(ClientError::UnknownVisualization(guid))?;
            export::export_view(viz)
        })
    }

    pub fn bulk_export(&self) -> Result<String> {
        self.read(|state| export::bulk_export(&state.visualizations))
    }

    pub fn import_view(&self, text: &str) -> Result<Guid> {
        let viz = export::decode_view(text)?;
        Ok(self.mutate(|state| export::import_into(state, viz)))
    }

    /// Import every view of a bulk export. Nothing is imported when any line
    /// fails to decode.
    pub fn import_bulk(&self, text: &str) -> Result<Vec<Guid>> {
        let vizs = export::decode_bulk(text)?;
        Ok(self.mutate(|state| {
            vizs.into_iter()
                .map(|viz| export::import_into(state, viz))
                .collect()
        }))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Save the current snapshot to the store.
    pub async fn persist(&self) -> Result<()> {
        let snapshot = self.read(PersistedSnapshot::from_state);
        let json = serde_json::to_string(&snapshot)?;
        self.store.save_snapshot(CURRENT_SNAPSHOT_VERSION, json).await?;
        debug!(reports = snapshot.reports.len(), "persisted snapshot");
        Ok(())
    }

    /// Replace the state with the stored snapshot, migrating it first.
    /// Returns `false` when nothing was stored.
    pub async fn restore(&self) -> Result<bool> {
        let Some(row) = self.store.load_snapshot().await? else {
            return Ok(false);
        };
        let raw: Value = serde_json::from_str(&row.json)
            .map_err(|e| ClientError::MalformedPersistedState(e.to_string()))?;

        match snapshot::migrate(Some(row.version), raw)? {
            MigrationOutcome::Unsupported { found } => Err(ClientError::UnsupportedSnapshotVersion {
                found,
                supported: CURRENT_SNAPSHOT_VERSION,
            }),
            MigrationOutcome::Ready {
                snapshot,
                wipe_records,
            } => {
                if wipe_records {
                    let cleared = self.store.clear().await?;
                    warn!(cleared, "persisted cache format changed, cleared record store");
                }
                info!(
                    reports = snapshot.reports.len(),
                    visualizations = snapshot.visualizations.len(),
                    sections = snapshot.sections.len(),
                    "restored snapshot"
                );
                self.mutate(|state| {
                    let requests = std::mem::take(&mut state.requests);
                    let revision = state.revision;
                    *state = AppState {
                        requests,
                        revision,
                        ..snapshot.into_state()
                    };
                });
                Ok(true)
            }
        }
    }
}
