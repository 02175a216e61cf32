//! Which fights a query needs, and which of those are not cached yet.

use logdash_shared::constants::IN_FLIGHT_SEPARATOR;
use logdash_shared::{FightId, QueryDefinition, QueryKey, ReportCode};

use crate::state::AppState;

/// Marker held while a fetch for `(report, query, fight)` is in progress.
pub fn in_flight_marker(code: &ReportCode, key: &QueryKey, fight: FightId) -> String {
    format!(
        "{code}{sep}{key}{sep}{fight}",
        sep = IN_FLIGHT_SEPARATOR
    )
}

/// Boss fights of the report that pass the query's boss filter and are not
/// currently being fetched, ascending by fight id. Empty for an unknown
/// report.
pub fn relevant_fights(query: &QueryDefinition, code: &ReportCode, state: &AppState) -> Vec<FightId> {
    let Some(report) = state.report(code) else {
        return Vec::new();
    };
    let key = query.key();

    let mut fights: Vec<FightId> = report
        .fights
        .iter()
        .filter(|fight| fight.is_boss())
        .filter(|fight| query.matches_boss(fight.boss))
        .map(|fight| fight.id)
        .filter(|&id| {
            !state
                .requests
                .queries
                .contains(&in_flight_marker(code, &key, id))
        })
        .collect();
    fights.sort_unstable();
    fights.dedup();
    fights
}

/// Relevant fights with no entry in the report's index for this query.
pub fn missing_fights(query: &QueryDefinition, code: &ReportCode, state: &AppState) -> Vec<FightId> {
    let relevant = relevant_fights(query, code, state);
    let Some(index) = state
        .report(code)
        .and_then(|report| report.queries.get(&query.key()))
    else {
        return relevant;
    };
    relevant
        .into_iter()
        .filter(|fight| !index.contains_key(&fight.to_string()))
        .collect()
}

/// Whether `update_queries` has anything to do for this query.
pub fn should_update(query: &QueryDefinition, code: &ReportCode, state: &AppState) -> bool {
    match state.report(code) {
        None => true,
        Some(report) if !report.queries.contains_key(&query.key()) => true,
        Some(_) => !missing_fights(query, code, state).is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ReportCacheEntry;
    use crate::test_support::{fight, report_code};

    fn state_with_fights() -> AppState {
        let mut entry = ReportCacheEntry::empty(report_code());
        entry.fights = vec![
            fight(3, 7, 20, 30),
            fight(1, 5, 0, 10),
            fight(2, 0, 11, 19),
            fight(4, 5, 31, 40),
        ];
        let mut state = AppState::new();
        state.reports.insert(report_code(), entry);
        state
    }

    #[test]
    fn test_marker_format() {
        let key = QueryDefinition::event("x").key();
        assert_eq!(
            in_flight_marker(&report_code(), &key, 4),
            "ABC123__x::event::none__4"
        );
    }

    #[test]
    fn test_relevant_skips_trash_and_sorts_by_id() {
        let state = state_with_fights();
        let query = QueryDefinition::event("");
        assert_eq!(relevant_fights(&query, &report_code(), &state), vec![1, 3, 4]);
    }

    #[test]
    fn test_relevant_applies_boss_filter() {
        let state = state_with_fights();
        let query = QueryDefinition::event("").with_boss("5");
        assert_eq!(relevant_fights(&query, &report_code(), &state), vec![1, 4]);
    }

    #[test]
    fn test_relevant_excludes_in_flight() {
        let mut state = state_with_fights();
        let query = QueryDefinition::event("");
        state
            .requests
            .queries
            .insert(in_flight_marker(&report_code(), &query.key(), 3));

        assert_eq!(relevant_fights(&query, &report_code(), &state), vec![1, 4]);
        // a different query is not affected by the marker
        let other = QueryDefinition::event("y");
        assert_eq!(relevant_fights(&other, &report_code(), &state), vec![1, 3, 4]);
    }

    #[test]
    fn test_unknown_report() {
        let state = AppState::new();
        let query = QueryDefinition::event("");
        assert!(relevant_fights(&query, &report_code(), &state).is_empty());
        assert!(missing_fights(&query, &report_code(), &state).is_empty());
        assert!(should_update(&query, &report_code(), &state));
    }

    #[test]
    fn test_missing_equals_relevant_without_index() {
        let state = state_with_fights();
        let query = QueryDefinition::event("");
        assert_eq!(
            missing_fights(&query, &report_code(), &state),
            relevant_fights(&query, &report_code(), &state)
        );
        assert!(should_update(&query, &report_code(), &state));
    }

    #[test]
    fn test_missing_subtracts_cached_fights() {
        let mut state = state_with_fights();
        let query = QueryDefinition::event("");
        state
            .reports
            .get_mut(&report_code())
            .unwrap()
            .queries
            .insert(query.key(), [("1".to_string(), 10), ("4".to_string(), 11)].into());

        assert_eq!(missing_fights(&query, &report_code(), &state), vec![3]);
        assert!(should_update(&query, &report_code(), &state));

        state
            .reports
            .get_mut(&report_code())
            .unwrap()
            .queries
            .get_mut(&query.key())
            .unwrap()
            .insert("3".to_string(), 12);
        assert!(missing_fights(&query, &report_code(), &state).is_empty());
        assert!(!should_update(&query, &report_code(), &state));
    }

    #[test]
    fn test_boss_filter_reads_shared_index() {
        let mut state = state_with_fights();
        let any = QueryDefinition::event("");
        state
            .reports
            .get_mut(&report_code())
            .unwrap()
            .queries
            .insert(any.key(), [("1".to_string(), 10), ("4".to_string(), 11)].into());

        let boss = QueryDefinition::event("").with_boss("5");
        assert!(missing_fights(&boss, &report_code(), &state).is_empty());
    }
}
