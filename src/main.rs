use std::time::Duration;

use clap::Parser;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

mod batch;
mod classify;
mod config;
mod error;
mod mailer;
mod models;
mod pipeline;
mod retry;
mod source;
mod templates;

use config::{Config, RetryPolicy};
use mailer::{BatchSink, DryRunSink, MailjetSink};
use pipeline::PipelineSettings;
use source::LmsClient;

#[derive(Parser)]
#[command(name = "learner-reminder")]
#[command(about = "Send reminder emails to inactive and low-scoring learners", long_about = None)]
struct Cli {
    /// Records held per category before a batch is dispatched
    #[arg(long, default_value_t = 500)]
    batch_limit: usize,
    /// Learners requested per API page
    #[arg(long, default_value_t = 500)]
    page_size: usize,
    /// Days without a login before a learner counts as inactive
    #[arg(long, default_value_t = 14)]
    inactive_days: i64,
    /// Progress percentage below which a learner counts as low-scoring
    #[arg(long, default_value_t = 50.0)]
    low_score_threshold: f64,
    /// Attempts per upstream request before giving up
    #[arg(long, default_value_t = 3)]
    max_retries: u32,
    /// Base backoff delay in seconds, doubled per attempt
    #[arg(long, default_value_t = 5)]
    retry_base_secs: u64,
    /// Log batches instead of sending emails
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let retry = RetryPolicy {
        max_attempts: cli.max_retries.max(1),
        base: Duration::from_secs(cli.retry_base_secs),
        cap: Duration::from_secs(60),
    };
    let config = Config::from_env(
        cli.page_size,
        cli.batch_limit,
        cli.inactive_days,
        cli.low_score_threshold,
        retry,
    )?;

    let run_id = Uuid::new_v4();
    let span = info_span!("reminder_run", %run_id);
    run(&config, cli.dry_run).instrument(span).await
}

async fn run(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    info!("starting learner email reminder run");

    let client = LmsClient::new(config)?;
    let sink: Box<dyn BatchSink> = if dry_run {
        Box::new(DryRunSink)
    } else {
        Box::new(MailjetSink::new(config)?)
    };

    let settings = PipelineSettings {
        batch_limit: config.batch_limit,
        inactive_days: config.inactive_days,
        low_score_threshold: config.low_score_threshold,
    };

    let summary = pipeline::run(
        client.stream_learners(config.page_size),
        sink.as_ref(),
        &settings,
    )
    .await?;

    info!(
        records_seen = summary.records_seen,
        records_skipped = summary.records_skipped,
        inactive_flagged = summary.inactive_flagged,
        low_score_flagged = summary.low_score_flagged,
        batches_dispatched = summary.batches_dispatched,
        batches_failed = summary.batches_failed,
        "run completed"
    );
    Ok(())
}
