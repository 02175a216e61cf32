//! Async access to the [`Database`].
//!
//! SQLite calls block, so every call runs on tokio's blocking pool with the
//! connection behind a mutex. The handle is cheap to clone and is shared by
//! every task that reads or writes record fragments.

use std::path::Path;
use std::sync::{Arc, Mutex};

use logdash_shared::RecordId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewRecord, SnapshotRow, StoredRecord};

#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Mutex<Database>>,
}

impl RecordStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Database::open_at(path).map(Self::new)
    }

    pub fn open_in_memory() -> Result<Self> {
        Database::open_in_memory().map(Self::new)
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await?
    }

    pub async fn insert(&self, record: NewRecord) -> Result<RecordId> {
        self.run(move |db| db.insert_record(&record)).await
    }

    /// Bulk lookup by id, `None` for ids that are no longer stored.
    pub async fn get_many(&self, ids: Vec<RecordId>) -> Result<Vec<Option<StoredRecord>>> {
        self.run(move |db| db.get_records(&ids)).await
    }

    pub async fn delete(&self, id: RecordId) -> Result<bool> {
        self.run(move |db| db.delete_record(id)).await
    }

    pub async fn clear(&self) -> Result<usize> {
        self.run(|db| db.clear_records()).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.run(|db| db.count_records()).await
    }

    pub async fn save_snapshot(&self, version: u32, json: String) -> Result<()> {
        self.run(move |db| db.save_snapshot(version, &json)).await
    }

    pub async fn load_snapshot(&self) -> Result<Option<SnapshotRow>> {
        self.run(|db| db.load_snapshot()).await
    }
}
