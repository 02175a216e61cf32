// Access to the remote analytics API, either through the query proxy or
// directly with an API key.

pub mod api;
pub mod error;
pub mod proxy;
pub mod upstream;

pub use api::{EventPayload, RawPayload, RemoteApi, ReportMeta, TablePayload};
pub use error::NetError;
pub use proxy::ProxyClient;
pub use upstream::UpstreamClient;
