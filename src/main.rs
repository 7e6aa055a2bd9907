use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use book_crawler::{CatalogCrawler, CrawlerConfig, RunGate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = CrawlerConfig::from_env().context("load configuration")?;
    info!(
        "Starting book crawler for {} -> {}",
        config.root_url,
        config.output_path.display()
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight requests");
            ctrl_c.cancel();
        }
    });

    let schedule = config.schedule.clone();
    let crawler = CatalogCrawler::new(config)?;

    let Some(schedule) = schedule else {
        crawler.run(&cancel).await.context("crawl failed")?;
        return Ok(());
    };

    // Run once immediately, then on the schedule
    let gate = RunGate::new();
    run_guarded(&gate, &crawler, &cancel).await;

    let mut sched = JobScheduler::new().await?;

    let job_gate = gate.clone();
    let job_crawler = crawler.clone();
    let job_cancel = cancel.clone();
    sched
        .add(Job::new_async(schedule.as_str(), move |_uuid, _l| {
            let gate = job_gate.clone();
            let crawler = job_crawler.clone();
            let cancel = job_cancel.clone();
            Box::pin(async move {
                run_guarded(&gate, &crawler, &cancel).await;
            })
        })?)
        .await?;

    info!("Scheduler started - crawling on '{}'", schedule);
    sched.start().await?;

    cancel.cancelled().await;
    sched.shutdown().await?;

    // A scheduled run may still be draining in-flight requests
    gate.wait_idle().await;
    info!("Scheduler stopped");

    Ok(())
}

async fn run_guarded(gate: &RunGate, crawler: &CatalogCrawler, cancel: &CancellationToken) {
    match gate.run(crawler, cancel).await {
        None => warn!("Previous crawl still running, skipping this run"),
        Some(Err(e)) => error!("Crawl failed: {}", e),
        Some(Ok(_)) => {}
    }
}
