//! Eviction of cached reports and of index entries for queries no
//! visualization uses any more.
//!
//! Losing a cached report only means it is fetched again later; the record
//! fragments left behind by dropped index entries are never read again.

use std::collections::HashSet;

use tracing::debug;

use logdash_shared::{QueryKey, ReportCode};

use crate::state::AppState;

/// Drop inactive query indices, then every report that is neither the main
/// report nor recently used with cached data. Returns the dropped reports.
pub fn purge(state: &mut AppState, now_ms: i64, retention_ms: i64) -> Vec<ReportCode> {
    let active: HashSet<QueryKey> = state.visualizations.active_query_keys();

    for report in state.reports.values_mut() {
        report.queries.retain(|key, _| active.contains(key));
    }

    let cutoff = now_ms.saturating_sub(retention_ms);
    let main = state.main_report.clone();
    let mut dropped = Vec::new();

    state.reports.retain(|code, report| {
        let keep = main.as_ref() == Some(code)
            || (report.has_cached_data() && report.last_used.is_some_and(|ts| ts >= cutoff));
        if !keep {
            dropped.push(code.clone());
        }
        keep
    });

    if !dropped.is_empty() {
        debug!(reports = ?dropped, "purged cached reports");
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ReportCacheEntry;
    use crate::test_support::fight;
    use logdash_shared::QueryDefinition;

    const DAY_MS: i64 = 86_400_000;
    const RETENTION_MS: i64 = 300_000_000;

    fn code(s: &str) -> ReportCode {
        ReportCode::new(s).unwrap()
    }

    fn cached_entry(c: &str, key: &QueryKey, last_used: Option<i64>) -> ReportCacheEntry {
        let mut entry = ReportCacheEntry::empty(code(c));
        entry.fights = vec![fight(1, 1, 0, 10)];
        entry.last_used = last_used;
        entry.queries.insert(key.clone(), [("1".to_string(), 1)].into());
        entry
    }

    fn state_with_active(query: &QueryDefinition) -> AppState {
        let mut state = AppState::new();
        let guid = state.visualizations.create(serde_json::json!({}));
        state.visualizations.set_query(guid, Some(query.clone())).unwrap();
        state
    }

    #[test]
    fn test_main_report_is_never_purged() {
        let query = QueryDefinition::event("");
        let mut state = AppState::new();
        state.main_report = Some(code("MAIN"));
        state
            .reports
            .insert(code("MAIN"), cached_entry("MAIN", &query.key(), Some(0)));

        let dropped = purge(&mut state, 100 * DAY_MS, RETENTION_MS);
        assert!(dropped.is_empty());
        assert!(state.reports.contains_key(&code("MAIN")));
        // no visualization uses the query, so its index is gone
        assert!(!state.reports[&code("MAIN")].has_cached_data());
    }

    #[test]
    fn test_stale_report_is_purged() {
        let query = QueryDefinition::event("");
        let mut state = state_with_active(&query);
        let now = 100 * DAY_MS;
        state
            .reports
            .insert(code("OLD"), cached_entry("OLD", &query.key(), Some(now - 4 * DAY_MS)));
        state
            .reports
            .insert(code("FRESH"), cached_entry("FRESH", &query.key(), Some(now - DAY_MS)));

        let dropped = purge(&mut state, now, RETENTION_MS);
        assert_eq!(dropped, vec![code("OLD")]);
        assert!(state.reports.contains_key(&code("FRESH")));
    }

    #[test]
    fn test_recent_report_without_active_queries_is_purged() {
        let query = QueryDefinition::event("");
        let mut state = AppState::new();
        let now = 10 * DAY_MS;
        state
            .reports
            .insert(code("IDLE"), cached_entry("IDLE", &query.key(), Some(now)));

        assert_eq!(purge(&mut state, now, RETENTION_MS), vec![code("IDLE")]);
    }

    #[test]
    fn test_inactive_query_indices_are_dropped() {
        let active = QueryDefinition::event("a");
        let inactive = QueryDefinition::event("b");
        let mut state = state_with_active(&active);
        state.main_report = Some(code("MAIN"));
        let mut entry = cached_entry("MAIN", &active.key(), Some(0));
        entry
            .queries
            .insert(inactive.key(), [("1".to_string(), 2)].into());
        state.reports.insert(code("MAIN"), entry);

        purge(&mut state, 0, RETENTION_MS);
        let entry = &state.reports[&code("MAIN")];
        assert!(entry.queries.contains_key(&active.key()));
        assert!(!entry.queries.contains_key(&inactive.key()));
    }
}
