//! Persisted application state and its schema migrations.
//!
//! The snapshot holds the report cache index, visualizations, sections and
//! the main report; row data lives only in the record store. Loading an
//! older snapshot runs every migration newer than its version, in order, on
//! the raw JSON before anything is decoded into typed state. Entries that
//! still fail to decode are dropped: everything cached can be fetched again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use logdash_shared::{Guid, ReportCode};

use crate::error::{ClientError, Result};
use crate::section::{self, Section};
use crate::state::{AppState, ReportCacheEntry};
use crate::visualization::{Visualizations, VizState};

pub const CURRENT_SNAPSHOT_VERSION: u32 = 6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PersistedSnapshot {
    pub version: u32,
    #[serde(default)]
    pub main_report: Option<ReportCode>,
    #[serde(default)]
    pub reports: BTreeMap<ReportCode, ReportCacheEntry>,
    #[serde(default)]
    pub visualizations: Visualizations,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl PersistedSnapshot {
    /// Everything worth persisting; in-flight requests are left out.
    pub fn from_state(state: &AppState) -> Self {
        Self {
            version: CURRENT_SNAPSHOT_VERSION,
            main_report: state.main_report.clone(),
            reports: state.reports.clone(),
            visualizations: state.visualizations.clone(),
            sections: state.sections.clone(),
        }
    }

    /// Fresh in-memory state holding this snapshot.
    pub fn into_state(self) -> AppState {
        AppState {
            main_report: self.main_report,
            reports: self.reports,
            visualizations: self.visualizations,
            sections: self.sections,
            ..AppState::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    Ready {
        snapshot: PersistedSnapshot,
        /// Stored record fragments no longer match the index semantics and
        /// must be cleared before use.
        wipe_records: bool,
    },
    /// Written by a newer version of the application.
    Unsupported { found: u32 },
}

type Migration = fn(&mut Map<String, Value>);

/// `(target version, step)`, ascending. A step runs when the stored version
/// is below its target.
const MIGRATIONS: &[(i64, Migration)] = &[
    (0, assign_viz_indices),
    (2, reset_query_indices),
    (3, reset_query_indices),
    (4, null_api_key),
    (5, drop_api_key),
    (6, introduce_sections),
];

/// Version whose step clears the record store as well as the indices.
const WIPE_RECORDS_AT: i64 = 3;

fn viz_entries(root: &mut Map<String, Value>) -> impl Iterator<Item = &mut Map<String, Value>> {
    root.get_mut("visualizations")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object_mut)
}

fn assign_viz_indices(root: &mut Map<String, Value>) {
    for (position, viz) in viz_entries(root).enumerate() {
        let finite = viz
            .get("index")
            .and_then(Value::as_f64)
            .is_some_and(f64::is_finite);
        if !finite {
            viz.insert("index".to_string(), Value::from(position));
        }
    }
}

fn reset_query_indices(root: &mut Map<String, Value>) {
    let reports = root
        .get_mut("reports")
        .and_then(Value::as_object_mut)
        .into_iter()
        .flat_map(|reports| reports.values_mut())
        .filter_map(Value::as_object_mut);
    for report in reports {
        report.insert("queries".to_string(), Value::Object(Map::new()));
    }
}

fn null_api_key(root: &mut Map<String, Value>) {
    root.insert("api_key".to_string(), Value::Null);
}

fn drop_api_key(root: &mut Map<String, Value>) {
    root.remove("api_key");
}

fn introduce_sections(root: &mut Map<String, Value>) {
    root.insert("sections".to_string(), Value::Array(Vec::new()));
    for viz in viz_entries(root) {
        viz.insert("section".to_string(), Value::Null);
    }
}

/// Older snapshots keyed visualizations by guid; turn that into a list.
fn visualizations_as_list(root: &mut Map<String, Value>) {
    if let Some(Value::Object(by_guid)) = root.get("visualizations") {
        let list: Vec<Value> = by_guid.values().cloned().collect();
        root.insert("visualizations".to_string(), Value::Array(list));
    }
}

fn decode_list<T: serde::de::DeserializeOwned>(value: Option<Value>, what: &str) -> Vec<T> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(error = %e, "dropping undecodable persisted {what}");
                None
            }
        })
        .collect()
}

fn decode_reports(value: Option<Value>) -> BTreeMap<ReportCode, ReportCacheEntry> {
    let Some(Value::Object(reports)) = value else {
        return BTreeMap::new();
    };
    reports
        .into_iter()
        .filter_map(|(code, entry)| {
            let decoded = ReportCode::new(code.as_str())
                .map_err(|e| e.to_string())
                .and_then(|code| {
                    serde_json::from_value::<ReportCacheEntry>(entry)
                        .map(|entry| (code, entry))
                        .map_err(|e| e.to_string())
                });
            match decoded {
                Ok((code, mut entry)) => {
                    entry.code = code.clone();
                    entry.prune_unknown_fights();
                    Some((code, entry))
                }
                Err(e) => {
                    warn!(report = %code, error = %e, "dropping undecodable cached report");
                    None
                }
            }
        })
        .collect()
}

/// Bring a stored snapshot up to [`CURRENT_SNAPSHOT_VERSION`].
///
/// `version` is the schema version the snapshot was written with, `None`
/// when unversioned (every migration runs). Fails only when `raw` is not a
/// JSON object at all.
pub fn migrate(version: Option<u32>, raw: Value) -> Result<MigrationOutcome> {
    if let Some(found) = version.filter(|&v| v > CURRENT_SNAPSHOT_VERSION) {
        warn!(found, supported = CURRENT_SNAPSHOT_VERSION, "persisted state is too new");
        return Ok(MigrationOutcome::Unsupported { found });
    }

    let Value::Object(mut root) = raw else {
        return Err(ClientError::MalformedPersistedState(
            "snapshot is not a JSON object".to_string(),
        ));
    };

    visualizations_as_list(&mut root);

    let from = version.map_or(-1, i64::from);
    let mut wipe_records = false;
    for (target, step) in MIGRATIONS.iter().filter(|(target, _)| *target > from) {
        debug!(version = target, "applying snapshot migration");
        step(&mut root);
        wipe_records |= *target == WIPE_RECORDS_AT;
    }
    if from < i64::from(CURRENT_SNAPSHOT_VERSION) {
        info!(
            from = ?version,
            to = CURRENT_SNAPSHOT_VERSION,
            wipe_records,
            "migrated persisted state"
        );
    }

    let main_report = match root.remove("main_report") {
        Some(Value::String(code)) => match ReportCode::new(code) {
            Ok(code) => Some(code),
            Err(e) => {
                warn!(error = %e, "ignoring persisted main report");
                None
            }
        },
        _ => None,
    };

    let reports = decode_reports(root.remove("reports"));
    let mut sections: Vec<Section> = decode_list(root.remove("sections"), "section");
    section::normalize(&mut sections);

    let mut vizs: Vec<VizState> = decode_list(root.remove("visualizations"), "visualization");
    for viz in vizs.iter_mut() {
        if !section_exists(&sections, viz.section) {
            viz.section = None;
        }
    }

    Ok(MigrationOutcome::Ready {
        snapshot: PersistedSnapshot {
            version: CURRENT_SNAPSHOT_VERSION,
            main_report,
            reports,
            visualizations: Visualizations::from_vec(vizs),
            sections,
        },
        wipe_records,
    })
}

/// `None` always exists; `Some(id)` must name a known section.
pub(crate) fn section_exists(sections: &[Section], id: Option<Guid>) -> bool {
    id.map_or(true, |id| sections.iter().any(|section| section.id == id))
}
