//! # The Commune - Scheduler & Worker Pool (C5)
//!
//! Owns the timing and concurrency of every ingestion job: `nvd.recent`,
//! `nvd.backfill`, `cisa_kev.refresh`, `rss.fetch_all`, `enrichment.tick`,
//! and `cache.refresh_stats`. Each job is single-flighted across workers via
//! a short-TTL distributed lock (C8) and ticks on its own interval inside a
//! bounded worker pool; a `CancellationToken` threads through every
//! suspension point for graceful shutdown.
//!
//! Traditional name: `Scheduler` or `WorkerPool`.

mod context;
mod jobs;
mod registry;

use std::sync::Arc;

use the_archive::TheArchive;
use the_collective::{enrichment::EnrichmentTier, TheCollective};
use the_coordinator::TheCharter;
use the_infiltrator::{CisaKevClient, NvdClient, RssClient};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use context::JobContext;
use registry::Job;

/// Background jobs run in their own bounded pool, independent of the
/// request-serving pool owned by `the_interface` (§5: "API serving and
/// background jobs are in separate worker pools with independent
/// concurrency caps").
fn scheduler_concurrency(charter: &TheCharter) -> usize {
    charter.pool.celery_workers.max(1) as usize
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let charter = TheCharter::the_charter_loading(None)?;
    charter.validate().map_err(anyhow::Error::msg)?;

    the_collective::the_chronicler_awakening(&charter.logging)?;
    tracing::info!("The Commune awakening");

    let archive = Arc::new(TheArchive::the_awakening(&charter.archive.database_url, charter.archive.max_connections).await?);
    let collective = Arc::new(TheCollective::the_awakening(charter.clone(), archive.clone()).await?);

    let nvd = Arc::new(NvdClient::new(charter.infiltrator.nvd_api_key.clone()));
    let cisa_kev = Arc::new(CisaKevClient::new());
    let rss = Arc::new(RssClient::new());

    let cancel = CancellationToken::new();
    let charter = Arc::new(charter);

    let ctx = JobContext {
        charter: charter.clone(),
        archive,
        collective,
        nvd,
        cisa_kev,
        rss,
        cancel: cancel.clone(),
    };

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received, cancelling in-flight jobs");
                cancel.cancel();
            }
        });
    }

    if let Some((start_year, end_year)) = backfill_range_from_env() {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            Job::NvdBackfill { start_year, end_year }.run_single_flight(&ctx).await;
        });
    }

    let semaphore = Arc::new(Semaphore::new(scheduler_concurrency(&charter)));
    let mut scheduler_tasks = tokio::task::JoinSet::new();

    for job in periodic_jobs() {
        let ctx = ctx.clone();
        let cancel = cancel.clone();
        let semaphore = semaphore.clone();
        scheduler_tasks.spawn(async move { job_loop(job, ctx, cancel, semaphore).await });
    }

    while scheduler_tasks.join_next().await.is_some() {}

    tracing::info!("The Commune shut down cleanly");
    Ok(())
}

/// The canonical, always-scheduled job set (§4.5), minus `nvd.backfill`
/// which only runs on demand.
fn periodic_jobs() -> Vec<Job> {
    vec![
        Job::NvdRecent { days: 2 },
        Job::CisaKevRefresh,
        Job::RssFetchAll,
        Job::EnrichmentTick { tier: EnrichmentTier::High, batch_size: 20 },
        Job::EnrichmentTick { tier: EnrichmentTier::Medium, batch_size: 20 },
        Job::EnrichmentTick { tier: EnrichmentTier::Low, batch_size: 10 },
        Job::CacheRefreshStats,
    ]
}

/// Ticks one job on its own interval until cancelled. `semaphore` bounds
/// how many jobs in this pool may be mid-dispatch at once; a job waiting on
/// a permit still respects cancellation.
async fn job_loop(job: Job, ctx: JobContext, cancel: CancellationToken, semaphore: Arc<Semaphore>) {
    let Some(interval) = job.tick_interval() else {
        return;
    };
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Ok(permit) = semaphore.clone().acquire_owned().await else { break };
                job.run_single_flight(&ctx).await;
                drop(permit);
            }
        }
    }
}

fn backfill_range_from_env() -> Option<(i32, i32)> {
    let start = std::env::var("CRYPTEX_BACKFILL_START_YEAR").ok()?.parse().ok()?;
    let end = std::env::var("CRYPTEX_BACKFILL_END_YEAR").ok()?.parse().ok()?;
    Some((start, end))
}
