//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration against a local query proxy.

use std::path::PathBuf;
use std::sync::Arc;

use logdash_net::{ProxyClient, RemoteApi, UpstreamClient};
use logdash_shared::constants::{DEFAULT_API_BASE, DEFAULT_PROXY_URL, DEFAULT_RETENTION_SECS};
use logdash_shared::ReportCode;

use crate::error::{ClientError, Result};

/// How query data reaches the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
    /// Through the query proxy, which holds the API key.
    Proxy,
    /// Straight to the upstream API with our own key.
    Direct,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path of the local record store.
    /// Env: `LOGDASH_DB_PATH`
    /// Default: `None` (platform data directory).
    pub db_path: Option<PathBuf>,

    /// Env: `LOGDASH_API_MODE` (`proxy` / `direct`)
    /// Default: `proxy`
    pub api_mode: ApiMode,

    /// Env: `LOGDASH_PROXY_URL`
    /// Default: `http://localhost:8000`
    pub proxy_url: String,

    /// Upstream API key, required in direct mode.
    /// Env: `LOGDASH_API_KEY`
    pub api_key: Option<String>,

    /// Env: `LOGDASH_API_BASE`
    /// Default: `https://www.warcraftlogs.com:443/v1`
    pub api_base: String,

    /// How long a report that is not the main report stays cached after its
    /// last use.
    /// Env: `LOGDASH_RETENTION_SECS`
    /// Default: `300000`
    pub retention_secs: u64,

    /// Report to attach on startup.
    /// Env: `LOGDASH_REPORT`
    pub report: Option<ReportCode>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            api_mode: ApiMode::Proxy,
            proxy_url: DEFAULT_PROXY_URL.to_string(),
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            retention_secs: DEFAULT_RETENTION_SECS,
            report: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("LOGDASH_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(mode) = lookup("LOGDASH_API_MODE") {
            match mode.trim().to_ascii_lowercase().as_str() {
                "proxy" => config.api_mode = ApiMode::Proxy,
                "direct" => config.api_mode = ApiMode::Direct,
                _ => {
                    tracing::warn!(value = %mode, "Invalid LOGDASH_API_MODE, using proxy");
                }
            }
        }

        if let Some(url) = lookup("LOGDASH_PROXY_URL") {
            config.proxy_url = url;
        }

        if let Some(key) = lookup("LOGDASH_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }

        if let Some(base) = lookup("LOGDASH_API_BASE") {
            config.api_base = base;
        }

        if let Some(val) = lookup("LOGDASH_RETENTION_SECS") {
            match val.trim().parse::<u64>() {
                Ok(secs) => config.retention_secs = secs,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid LOGDASH_RETENTION_SECS, using default");
                }
            }
        }

        if let Some(code) = lookup("LOGDASH_REPORT") {
            match ReportCode::new(code) {
                Ok(code) => config.report = Some(code),
                Err(e) => tracing::warn!(error = %e, "Ignoring LOGDASH_REPORT"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn retention_ms(&self) -> i64 {
        i64::try_from(self.retention_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    /// Build the remote API client selected by `api_mode`.
    pub fn remote_api(&self) -> Result<Arc<dyn RemoteApi>> {
        match self.api_mode {
            ApiMode::Proxy => Ok(Arc::new(ProxyClient::new(self.proxy_url.clone())?)),
            ApiMode::Direct => {
                let key = self.api_key.clone().ok_or_else(|| {
                    ClientError::Config("LOGDASH_API_KEY is required in direct mode".to_string())
                })?;
                Ok(Arc::new(UpstreamClient::new(self.api_base.clone(), key)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_mode, ApiMode::Proxy);
        assert_eq!(config.retention_secs, 300_000);
        assert_eq!(config.retention_ms(), 300_000_000);
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("LOGDASH_API_MODE", "Direct"),
            ("LOGDASH_API_KEY", "secret"),
            ("LOGDASH_RETENTION_SECS", "60"),
            ("LOGDASH_REPORT", "ABC123"),
        ]));
        assert_eq!(config.api_mode, ApiMode::Direct);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.retention_secs, 60);
        assert_eq!(config.report.unwrap().as_str(), "ABC123");
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("LOGDASH_API_MODE", "carrier-pigeon"),
            ("LOGDASH_RETENTION_SECS", "soon"),
            ("LOGDASH_REPORT", "not a code"),
        ]));
        assert_eq!(config.api_mode, ApiMode::Proxy);
        assert_eq!(config.retention_secs, 300_000);
        assert!(config.report.is_none());
    }

    #[test]
    fn test_direct_mode_requires_key() {
        let config = ClientConfig {
            api_mode: ApiMode::Direct,
            ..ClientConfig::default()
        };
        assert!(config.remote_api().is_err());
    }
}
