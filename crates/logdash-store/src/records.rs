//! CRUD operations for [`StoredRecord`] fragments.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use logdash_shared::{FightId, RecordId, RowSet};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewRecord, StoredRecord};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a fragment and return its newly assigned id.
    pub fn insert_record(&self, record: &NewRecord) -> Result<RecordId> {
        let data = serde_json::to_string(&record.rows)?;
        self.conn().execute(
            "INSERT INTO records (report, fight, query_key, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.report.as_str(),
                record.fight,
                record.query_key.as_str(),
                data,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single fragment by id.
    pub fn get_record(&self, id: RecordId) -> Result<StoredRecord> {
        self.conn()
            .query_row(
                "SELECT id, report, fight, query_key, data, created_at
                 FROM records WHERE id = ?1",
                params![id],
                row_to_record,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Bulk lookup preserving input order. Ids with no stored fragment map to
    /// `None` instead of failing the whole lookup. A fragment whose row data
    /// no longer decodes is deleted and also maps to `None`.
    pub fn get_records(&self, ids: &[RecordId]) -> Result<Vec<Option<StoredRecord>>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT id, report, fight, query_key, data, created_at
             FROM records WHERE id = ?1",
        )?;

        let mut records = Vec::with_capacity(ids.len());
        for &id in ids {
            let record = match stmt.query_row(params![id], row_to_record).optional() {
                Ok(record) => record,
                Err(rusqlite::Error::FromSqlConversionFailure(column, _, e)) => {
                    tracing::warn!(id, column, error = %e, "dropping undecodable record");
                    self.delete_record(id)?;
                    None
                }
                Err(e) => return Err(e.into()),
            };
            records.push(record);
        }
        Ok(records)
    }

    pub fn count_records(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    pub fn delete_record(&self, id: RecordId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM records WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Remove every fragment. Ids already handed out are never reassigned.
    pub fn clear_records(&self) -> Result<usize> {
        let affected = self.conn().execute("DELETE FROM records", [])?;
        tracing::info!(removed = affected, "cleared record store");
        Ok(affected)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRecord> {
    let id: RecordId = row.get(0)?;
    let report: String = row.get(1)?;
    let fight: FightId = row.get(2)?;
    let query_key: String = row.get(3)?;
    let data: String = row.get(4)?;
    let created_str: String = row.get(5)?;

    let rows: RowSet = serde_json::from_str(&data).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(StoredRecord {
        id,
        report,
        fight,
        query_key,
        rows,
        created_at,
    })
}
