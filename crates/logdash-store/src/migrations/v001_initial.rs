//! v001 -- Initial schema creation.
//!
//! Creates the `records` table holding one row set per
//! (report, fight, query key).

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
///
/// `AUTOINCREMENT` keeps ids from being reused after deletes or a clear, so a
/// stale index entry can never resolve to someone else's rows.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    report     TEXT NOT NULL,                 -- report code
    fight      INTEGER NOT NULL,              -- fight id within the report
    query_key  TEXT NOT NULL,                 -- filter::kind::cutoff
    data       TEXT NOT NULL,                 -- JSON row set
    created_at TEXT NOT NULL                  -- RFC-3339
);

CREATE INDEX IF NOT EXISTS idx_records_lookup
    ON records(report, fight, query_key);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
