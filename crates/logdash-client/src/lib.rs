//! # logdash-client
//!
//! Query-to-visualization data pipeline: works out which fights a
//! visualization's query still needs, fetches only those (coalescing
//! contiguous fights into one time range for event queries), stores the rows
//! in the local record store and publishes the resulting index in a single
//! merge. Visualizations then read their rows back through the index.

pub mod assembler;
pub mod config;
pub mod events;
pub mod export;
pub mod format;
pub mod purge;
pub mod regions;
pub mod relevance;
pub mod section;
pub mod service;
pub mod snapshot;
pub mod state;
pub mod visualization;

mod error;

#[cfg(test)]
pub(crate) mod test_support;

pub use assembler::{data_changed, get_data_indices, LoadedRows};
pub use config::{ApiMode, ClientConfig};
pub use error::{ClientError, Result};
pub use events::Notification;
pub use regions::{coalesce_regions, Region};
pub use relevance::{in_flight_marker, missing_fights, relevant_fights, should_update};
pub use section::Section;
pub use service::{CacheService, UpdateSummary};
pub use snapshot::{MigrationOutcome, PersistedSnapshot, CURRENT_SNAPSHOT_VERSION};
pub use state::{AppState, ReportCacheEntry};
pub use visualization::VizState;
