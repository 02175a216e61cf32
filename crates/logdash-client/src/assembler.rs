//! Reading a visualization's rows back out of the record store.

use logdash_shared::{QueryDefinition, RecordId, ReportCode, RowSet};
use logdash_store::StoredRecord;

use crate::relevance::{missing_fights, relevant_fights};
use crate::state::AppState;

/// Record ids holding the rows of every relevant fight, in relevance order.
///
/// Empty when there is no query, the report is unknown, or any relevant fight
/// is still missing: partial data is never shown.
pub fn get_data_indices(
    query: Option<&QueryDefinition>,
    code: &ReportCode,
    state: &AppState,
) -> Vec<RecordId> {
    let Some(query) = query else {
        return Vec::new();
    };
    let Some(report) = state.report(code) else {
        return Vec::new();
    };
    if !missing_fights(query, code, state).is_empty() {
        return Vec::new();
    }
    let key = query.key();
    relevant_fights(query, code, state)
        .into_iter()
        .filter_map(|fight| report.record_for(&key, fight))
        .collect()
}

/// Concatenated rows plus the ids that no longer resolve to a record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadedRows {
    pub rows: RowSet,
    pub stale: Vec<RecordId>,
}

/// Concatenate `records` (the lookup result for `ids`, same order).
pub fn assemble(ids: &[RecordId], records: Vec<Option<StoredRecord>>) -> LoadedRows {
    let mut values = Vec::new();
    let mut stale = Vec::new();
    for (id, record) in ids.iter().zip(records) {
        match record {
            Some(record) => values.extend(record.rows.values),
            None => stale.push(*id),
        }
    }
    LoadedRows {
        rows: RowSet::new(values),
        stale,
    }
}

/// Cheap check whether consumers need to recompute: compares the name, the
/// row count and the first and last row timestamps.
pub fn data_changed(new: &RowSet, old: Option<&RowSet>) -> bool {
    let Some(old) = old else {
        return true;
    };
    new.name != old.name
        || new.len() != old.len()
        || new.first_timestamp() != old.first_timestamp()
        || new.last_timestamp() != old.last_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ReportCacheEntry;
    use crate::test_support::{fight, report_code};
    use serde_json::json;

    fn record(id: RecordId, timestamps: &[i64]) -> StoredRecord {
        StoredRecord {
            id,
            report: "ABC123".into(),
            fight: 1,
            query_key: "x".into(),
            rows: RowSet::new(timestamps.iter().map(|ts| json!({ "timestamp": ts })).collect()),
            created_at: chrono::Utc::now(),
        }
    }

    fn cached_state(query: &QueryDefinition) -> AppState {
        let mut entry = ReportCacheEntry::empty(report_code());
        entry.fights = vec![fight(1, 1, 0, 2), fight(2, 2, 3, 7), fight(3, 1, 8, 10)];
        entry.queries.insert(
            query.key(),
            [("1".to_string(), 21), ("2".to_string(), 22), ("3".to_string(), 23)].into(),
        );
        let mut state = AppState::new();
        state.reports.insert(report_code(), entry);
        state
    }

    #[test]
    fn test_indices_follow_relevance() {
        let query = QueryDefinition::event("");
        let state = cached_state(&query);
        assert_eq!(
            get_data_indices(Some(&query), &report_code(), &state),
            vec![21, 22, 23]
        );

        let boss = QueryDefinition::event("").with_boss("1");
        assert_eq!(get_data_indices(Some(&boss), &report_code(), &state), vec![21, 23]);
    }

    #[test]
    fn test_indices_empty_while_anything_missing() {
        let query = QueryDefinition::event("");
        let mut state = cached_state(&query);
        state
            .reports
            .get_mut(&report_code())
            .unwrap()
            .queries
            .get_mut(&query.key())
            .unwrap()
            .remove("2");
        assert!(get_data_indices(Some(&query), &report_code(), &state).is_empty());
        assert!(get_data_indices(None, &report_code(), &state).is_empty());
        assert!(get_data_indices(Some(&query), &ReportCode::new("OTHER").unwrap(), &state).is_empty());
    }

    #[test]
    fn test_assemble_reports_stale_ids() {
        let loaded = assemble(
            &[1, 2, 3],
            vec![Some(record(1, &[0, 1])), None, Some(record(3, &[9]))],
        );
        assert_eq!(loaded.stale, vec![2]);
        let timestamps: Vec<i64> = loaded
            .rows
            .values
            .iter()
            .map(|row| row["timestamp"].as_i64().unwrap())
            .collect();
        assert_eq!(timestamps, vec![0, 1, 9]);
        assert_eq!(loaded.rows.name, "data");
    }

    #[test]
    fn test_data_changed() {
        let a = RowSet::new(vec![json!({"timestamp": 1}), json!({"timestamp": 5})]);
        let same_shape = RowSet::new(vec![json!({"timestamp": 1, "x": 2}), json!({"timestamp": 5})]);
        let longer = RowSet::new(vec![json!({"timestamp": 1}), json!({"timestamp": 5}), json!({"timestamp": 5})]);
        let shifted = RowSet::new(vec![json!({"timestamp": 1}), json!({"timestamp": 6})]);

        assert!(data_changed(&a, None));
        assert!(!data_changed(&same_shape, Some(&a)));
        assert!(data_changed(&longer, Some(&a)));
        assert!(data_changed(&shifted, Some(&a)));
    }
}
