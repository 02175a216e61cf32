use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;
use crate::models::SnapshotRow;

impl Database {
    /// Replace the persisted application snapshot.
    pub fn save_snapshot(&self, version: u32, json: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO app_snapshot (id, version, json, saved_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                version = excluded.version,
                json = excluded.json,
                saved_at = excluded.saved_at",
            params![version, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// The persisted application snapshot, if one was ever saved.
    pub fn load_snapshot(&self) -> Result<Option<SnapshotRow>> {
        let row = self
            .conn()
            .query_row(
                "SELECT version, json, saved_at FROM app_snapshot WHERE id = 1",
                [],
                |row| {
                    let version: u32 = row.get(0)?;
                    let json: String = row.get(1)?;
                    let saved_str: String = row.get(2)?;
                    Ok((version, json, saved_str))
                },
            )
            .optional()?;

        let Some((version, json, saved_str)) = row else {
            return Ok(None);
        };

        // an unreadable timestamp is not worth losing the snapshot over
        let saved_at = DateTime::parse_from_rfc3339(&saved_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(SnapshotRow {
            version,
            json,
            saved_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_database_has_no_snapshot() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let db = Database::open_in_memory().unwrap();
        db.save_snapshot(3, "{\"a\":1}").unwrap();
        db.save_snapshot(6, "{\"b\":2}").unwrap();

        let snapshot = db.load_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.version, 6);
        assert_eq!(snapshot.json, "{\"b\":2}");
    }
}
