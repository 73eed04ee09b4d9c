//! Periodic purge of audit records past the retention window.
//!
//! Spawns a background task that deletes `event_records` rows older than the
//! configured retention period. Runs on a fixed interval using
//! `tokio::time::interval`; the purge itself appends the `delete` audit
//! record (actor NULL) whenever rows were removed, so the trail explains
//! its own gaps.

use std::time::Duration;

use mdc_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::config::RetentionConfig;

/// Run the audit retention sweep loop.
///
/// Purges records older than `config.days` every `config.sweep_hours` hours.
/// Runs until `cancel` is triggered. The first sweep fires immediately on
/// startup, which doubles as a catch-up after downtime.
pub async fn run(pool: DbPool, config: RetentionConfig, cancel: CancellationToken) {
    tracing::info!(
        retention_days = config.days,
        sweep_hours = config.sweep_hours,
        "Audit retention sweeper started"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.sweep_hours * 3600));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Audit retention sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match mdc_jobs::purge::run(&pool, config.days, None).await {
                    Ok(report) => {
                        if report.deleted > 0 {
                            tracing::info!(deleted = report.deleted, "Audit retention: purged old records");
                        } else {
                            tracing::debug!("Audit retention: no records to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Audit retention: purge failed");
                    }
                }
            }
        }
    }
}
