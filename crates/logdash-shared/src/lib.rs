// Value types shared by the store, network and client layers.

pub mod constants;
pub mod error;
pub mod query;
pub mod rows;
pub mod types;

pub use error::SharedError;
pub use query::{QueryDefinition, QueryKey, QueryKind, TableKind};
pub use rows::RowSet;
pub use types::{ActorMeta, FightId, FightMeta, Guid, RecordId, ReportCode};
