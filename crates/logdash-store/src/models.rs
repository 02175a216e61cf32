//! Records persisted in the local SQLite database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use logdash_shared::{FightId, QueryKey, RecordId, ReportCode, RowSet};

// ---------------------------------------------------------------------------
// Record fragment
// ---------------------------------------------------------------------------

/// Rows of one fight for one query, as fetched from the remote API.
///
/// Fragments are append-only: a refetch inserts a new fragment under a new
/// id rather than updating an existing one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub report: String,
    pub fight: FightId,
    pub query_key: String,
    pub rows: RowSet,
    pub created_at: DateTime<Utc>,
}

/// A fragment about to be inserted.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub report: ReportCode,
    pub fight: FightId,
    pub query_key: QueryKey,
    pub rows: RowSet,
}

// ---------------------------------------------------------------------------
// Application snapshot
// ---------------------------------------------------------------------------

/// Raw persisted application state. `json` is interpreted (and migrated) by
/// the client layer according to `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub version: u32,
    pub json: String,
    pub saved_at: DateTime<Utc>,
}
