/// Application name
pub const APP_NAME: &str = "logdash";

/// Separator between the fields of a query key
pub const QUERY_KEY_SEPARATOR: &str = "::";

/// Separator between the fields of an in-flight marker
pub const IN_FLIGHT_SEPARATOR: &str = "__";

/// Name given to every row set handed to the chart layer
pub const ROWSET_NAME: &str = "data";

/// Actor name used when an event references an unknown actor id
pub const UNKNOWN_ACTOR: &str = "Unknown";

/// How long a non-main report stays cached after its last use (seconds)
pub const DEFAULT_RETENTION_SECS: u64 = 300_000;

/// Upstream analytics API (v1)
pub const DEFAULT_API_BASE: &str = "https://www.warcraftlogs.com:443/v1";

/// Default location of the query proxy
pub const DEFAULT_PROXY_URL: &str = "http://localhost:8000";

/// Title given to newly created sections
pub const DEFAULT_SECTION_TITLE: &str = "Untitled";
