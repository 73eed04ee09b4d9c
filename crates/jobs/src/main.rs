use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mdc_jobs::purge::MIN_RETENTION_DAYS;
use mdc_notify::Notifier;

/// Batch job runner, invoked by the scheduler (cron, systemd timers).
#[derive(Debug, Parser)]
#[command(
    name = "mdc-jobs",
    version,
    about = "MDC batch jobs: workflow rules, escalations, audit retention"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evaluate workflow transition rules and advance eligible instances.
    EvaluateRules,
    /// Detect overdue stages and raise escalations.
    ScanEscalations {
        /// Report overdue stages without recording anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete audit records older than the retention window.
    PurgeEvents {
        /// Retention window in days.
        #[arg(long, default_value_t = 365, value_parser = clap::value_parser!(i64).range(MIN_RETENTION_DAYS..))]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mdc_jobs=info,mdc_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = mdc_db::create_pool(&database_url)
        .await
        .context("failed to connect to database")?;
    mdc_db::health_check(&pool)
        .await
        .context("database health check failed")?;

    let notifier = Notifier::from_env();
    let started = std::time::Instant::now();

    match cli.command {
        Command::EvaluateRules => {
            let report = mdc_jobs::rules::run(&pool, &notifier).await?;
            tracing::info!(
                examined = report.examined,
                advanced = report.advanced,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "rule evaluation finished"
            );
        }
        Command::ScanEscalations { dry_run } => {
            let report = mdc_jobs::escalation::run(&pool, &notifier, dry_run).await?;
            tracing::info!(
                overdue = report.overdue,
                escalated = report.escalated,
                dry_run,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "escalation scan finished"
            );
        }
        Command::PurgeEvents { days } => {
            let report = mdc_jobs::purge::run(&pool, days, None).await?;
            tracing::info!(
                deleted = report.deleted,
                days = report.days,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "audit purge finished"
            );
        }
    }

    Ok(())
}
