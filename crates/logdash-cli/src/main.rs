//! # logdash
//!
//! Command-line front end for the dashboard data layer: restores the saved
//! dashboard, attaches a report, brings every visualization's query data up
//! to date and prints what each visualization would draw.
//!
//! ```text
//! logdash [REPORT_CODE]
//! ```
//!
//! Everything else is configured through `LOGDASH_*` environment variables.

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use logdash_client::{CacheService, ClientConfig, Notification};
use logdash_shared::{QueryDefinition, ReportCode, TableKind};
use logdash_store::{Database, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "logdash_cli=info,logdash_client=debug,logdash_store=info,logdash_net=info,warn",
            )
        }))
        .with_target(true)
        .init();

    info!("Starting logdash v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let mut config = ClientConfig::from_env();
    if let Some(arg) = std::env::args().nth(1) {
        config.report = Some(ReportCode::new(arg).context("invalid report code argument")?);
    }
    info!(api_mode = ?config.api_mode, retention_secs = config.retention_secs, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the record store and restore the saved dashboard
    // -----------------------------------------------------------------------
    let store = match &config.db_path {
        Some(path) => RecordStore::open_at(path)?,
        None => RecordStore::new(Database::new()?),
    };
    let api = config.remote_api()?;
    let service = CacheService::new(store, api, config.retention_ms());

    match service.restore().await {
        Ok(true) => info!("Restored saved dashboard"),
        Ok(false) => info!("No saved dashboard, starting fresh"),
        Err(e) => warn!(error = %e, "Could not restore saved dashboard, starting fresh"),
    }

    let mut notifications = service.subscribe_notifications();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            if let Notification::QueryFetchFailed {
                report,
                filter,
                fights,
                message,
                ..
            } = &notification
            {
                error!(%report, %filter, ?fights, %message, "Query failed");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 4. Attach the report and synchronise
    // -----------------------------------------------------------------------
    if let Some(code) = config.report.clone() {
        service.set_main_report(code);
    }
    if service.main_report().is_none() {
        anyhow::bail!("no report selected: pass a report code or set LOGDASH_REPORT");
    }

    if service.read(|state| state.visualizations.is_empty()) {
        let guid = service.create_visualization(serde_json::json!({ "title": "Damage done" }));
        service.set_visualization_query(guid, Some(QueryDefinition::table(TableKind::Damage, "")))?;
    }

    for (code, summary) in service.sync_reports_in_use().await {
        info!(
            report = %code,
            queries = summary.queries,
            regions = summary.regions,
            failed = summary.failed_regions,
            fragments = summary.fragments,
            "Report synchronised"
        );
    }

    // -----------------------------------------------------------------------
    // 5. Print what every visualization would draw
    // -----------------------------------------------------------------------
    let vizs: Vec<_> = service.read(|state| state.visualizations.iter().cloned().collect());
    for viz in vizs {
        let loaded = service.visualization_data(viz.guid).await?;
        let query = viz
            .query
            .as_ref()
            .map(|q| q.key().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3}  {:<32} {:<40} {} rows",
            viz.index,
            viz.title(),
            query,
            loaded.rows.len()
        );
    }

    // -----------------------------------------------------------------------
    // 6. Save the dashboard
    // -----------------------------------------------------------------------
    service.persist().await?;
    info!("Dashboard saved");
    Ok(())
}
