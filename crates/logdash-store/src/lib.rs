//! # logdash-store
//!
//! Local storage for fetched query data, backed by SQLite.
//!
//! Row data for every (report, fight, query) fragment lives in the `records`
//! table under an auto-increment id; the persisted application snapshot,
//! which references those ids, lives in a single-row `app_snapshot` table.
//! [`Database`] is the synchronous handle with typed CRUD helpers and
//! [`RecordStore`] is the cloneable async handle the client layer uses.

pub mod database;
pub mod handle;
pub mod migrations;
pub mod models;
pub mod records;
pub mod snapshots;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use handle::RecordStore;
pub use models::*;
