//! In-memory application state.
//!
//! [`AppState`] owns the cache index (which fights of which query have been
//! fetched for which report, and under which record id), the in-flight
//! markers, and the visualization/section configuration. It is wrapped in
//! `Arc<Mutex<>>` by [`CacheService`](crate::CacheService), which is the only
//! writer.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use logdash_net::ReportMeta;
use logdash_shared::{ActorMeta, FightId, FightMeta, QueryKey, RecordId, ReportCode};

use crate::section::Section;
use crate::visualization::Visualizations;

/// Fight id (as a string) to the record holding that fight's rows.
pub type FightIndex = BTreeMap<String, RecordId>;

/// Cached metadata and query index for one report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportCacheEntry {
    pub code: ReportCode,
    /// Unix epoch millis of the last time this report was in use.
    #[serde(default, alias = "lastUsed")]
    pub last_used: Option<i64>,
    #[serde(default)]
    pub fights: Vec<FightMeta>,
    #[serde(default)]
    pub friendlies: Vec<ActorMeta>,
    #[serde(default)]
    pub enemies: Vec<ActorMeta>,
    #[serde(default)]
    pub queries: BTreeMap<QueryKey, FightIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
}

impl ReportCacheEntry {
    pub fn empty(code: ReportCode) -> Self {
        Self {
            code,
            last_used: None,
            fights: Vec::new(),
            friendlies: Vec::new(),
            enemies: Vec::new(),
            queries: BTreeMap::new(),
            title: None,
            start: None,
        }
    }

    pub fn fight(&self, id: FightId) -> Option<&FightMeta> {
        self.fights.iter().find(|fight| fight.id == id)
    }

    pub fn has_fight(&self, id: FightId) -> bool {
        self.fight(id).is_some()
    }

    /// Take over freshly fetched metadata. The query index is kept, minus
    /// entries for fights the report no longer lists.
    pub fn apply_meta(&mut self, meta: ReportMeta) {
        self.fights = meta.fights;
        self.friendlies = meta.friendlies;
        self.enemies = meta.enemies;
        if meta.title.is_some() {
            self.title = meta.title;
        }
        if meta.start.is_some() {
            self.start = meta.start;
        }
        self.prune_unknown_fights();
    }

    /// Drop index entries whose fight is not part of this report.
    pub fn prune_unknown_fights(&mut self) {
        let known: HashSet<String> = self.fights.iter().map(|f| f.id.to_string()).collect();
        for index in self.queries.values_mut() {
            index.retain(|fight, _| known.contains(fight));
        }
    }

    /// Record id of a fight's rows for a query, if cached.
    pub fn record_for(&self, key: &QueryKey, fight: FightId) -> Option<RecordId> {
        self.queries
            .get(key)
            .and_then(|index| index.get(&fight.to_string()))
            .copied()
    }

    /// Whether any query still has cached fights.
    pub fn has_cached_data(&self) -> bool {
        self.queries.values().any(|index| !index.is_empty())
    }
}

/// Requests currently in progress. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct Requests {
    /// Reports whose metadata is being fetched.
    pub meta: HashSet<ReportCode>,
    /// `report__querykey__fight` markers of query fetches in progress.
    pub queries: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub main_report: Option<ReportCode>,
    pub reports: BTreeMap<ReportCode, ReportCacheEntry>,
    pub visualizations: Visualizations,
    pub sections: Vec<Section>,
    pub requests: Requests,
    /// Bumped every time a batch of changes is published.
    pub revision: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, code: &ReportCode) -> Option<&ReportCacheEntry> {
        self.reports.get(code)
    }

    /// Boss id to encounter name over every cached report.
    pub fn boss_list(&self) -> BTreeMap<i64, String> {
        self.reports
            .values()
            .flat_map(|report| report.fights.iter())
            .filter(|fight| fight.is_boss())
            .map(|fight| (fight.boss, fight.name.clone()))
            .collect()
    }

    /// The main report followed by every report a section points at.
    pub fn reports_in_use(&self) -> Vec<ReportCode> {
        let mut codes: Vec<ReportCode> = Vec::new();
        let section_codes = self.sections.iter().filter_map(|s| s.code.clone());
        for code in self.main_report.clone().into_iter().chain(section_codes) {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes
    }

    /// Remove every entry pointing at one of `ids`. Returns how many entries
    /// were dropped.
    pub fn clear_indices(&mut self, ids: &[RecordId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let mut removed = 0;
        for report in self.reports.values_mut() {
            for index in report.queries.values_mut() {
                let before = index.len();
                index.retain(|_, id| !ids.contains(id));
                removed += before - index.len();
            }
        }
        removed
    }

    /// Empty every report's query index.
    pub fn reset_query_indices(&mut self) {
        for report in self.reports.values_mut() {
            report.queries.clear();
        }
    }
}
