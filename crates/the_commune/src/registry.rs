//! Named job registry (C5): the canonical job set, each job's tick
//! interval and hard ceiling, and the single-flight dispatch wrapper every
//! tick loop goes through.

use std::time::Duration;

use chrono::Utc;
use the_collective::enrichment::EnrichmentTier;
use the_foundation::{CryptexResult, IngestionRun, IngestionRunStatus, SourceTag};

use crate::context::JobContext;
use crate::jobs::{self, JobOutcome};

/// One entry in the canonical job set. `NvdBackfill` is dispatched
/// on-demand (from `main`'s startup hook), never by a tick loop.
#[derive(Debug, Clone)]
pub enum Job {
    NvdRecent { days: i64 },
    NvdBackfill { start_year: i32, end_year: i32 },
    CisaKevRefresh,
    RssFetchAll,
    EnrichmentTick { tier: EnrichmentTier, batch_size: i64 },
    CacheRefreshStats,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::NvdRecent { .. } => "nvd.recent",
            Job::NvdBackfill { .. } => "nvd.backfill",
            Job::CisaKevRefresh => "cisa_kev.refresh",
            Job::RssFetchAll => "rss.fetch_all",
            Job::EnrichmentTick { .. } => "enrichment.tick",
            Job::CacheRefreshStats => "cache.refresh_stats",
        }
    }

    /// `(job-name, argument-hash)` single-flight lock key (§4.5): two
    /// workers dispatching the same job with the same arguments must not
    /// run concurrently.
    fn lock_key(&self) -> String {
        match self {
            Job::NvdRecent { days } => format!("{}:{days}", self.name()),
            Job::NvdBackfill { start_year, end_year } => {
                format!("{}:{start_year}-{end_year}", self.name())
            }
            Job::EnrichmentTick { tier, batch_size } => {
                format!("{}:{tier:?}:{batch_size}", self.name())
            }
            _ => self.name().to_string(),
        }
    }

    /// Periodic cadence; `None` for on-demand-only jobs.
    pub fn tick_interval(&self) -> Option<Duration> {
        match self {
            Job::NvdRecent { .. } => Some(Duration::from_secs(15 * 60)),
            Job::NvdBackfill { .. } => None,
            Job::CisaKevRefresh => Some(Duration::from_secs(24 * 60 * 60)),
            Job::RssFetchAll => Some(Duration::from_secs(5 * 60)),
            Job::EnrichmentTick { tier, .. } => Some(match tier {
                EnrichmentTier::High => Duration::from_secs(2 * 60),
                EnrichmentTier::Medium => Duration::from_secs(10 * 60),
                EnrichmentTier::Low => Duration::from_secs(30 * 60),
            }),
            Job::CacheRefreshStats => Some(Duration::from_secs(5 * 60)),
        }
    }

    /// Hard ceiling (§4.5): a job still running past this is cancelled.
    fn timeout(&self) -> Duration {
        match self {
            Job::NvdBackfill { .. } => Duration::from_secs(6 * 60 * 60),
            _ => Duration::from_secs(60 * 60),
        }
    }

    fn source_tag(&self) -> SourceTag {
        match self {
            Job::NvdRecent { .. } | Job::NvdBackfill { .. } => SourceTag::nvd(),
            Job::CisaKevRefresh => SourceTag::cisa_kev(),
            Job::RssFetchAll => SourceTag("rss".to_string()),
            Job::EnrichmentTick { .. } => SourceTag("enrichment".to_string()),
            Job::CacheRefreshStats => SourceTag("cache".to_string()),
        }
    }

    async fn dispatch(&self, ctx: &JobContext) -> CryptexResult<JobOutcome> {
        match self {
            Job::NvdRecent { days } => jobs::nvd::run_recent(ctx, *days).await,
            Job::NvdBackfill { start_year, end_year } => {
                jobs::backfill::run(ctx, *start_year, *end_year).await
            }
            Job::CisaKevRefresh => jobs::cisa_kev::run_refresh(ctx).await,
            Job::RssFetchAll => jobs::rss::run_fetch_all(ctx).await,
            Job::EnrichmentTick { tier, batch_size } => {
                jobs::enrichment::run_tick(ctx, *tier, *batch_size).await
            }
            Job::CacheRefreshStats => jobs::cache::run_refresh_stats(ctx).await,
        }
    }

    /// Acquire the distributed single-flight lock, run with a timeout,
    /// record an `IngestionRun` for the attempt, and always release the
    /// lock — a worker that loses the race returns without touching the
    /// store.
    pub async fn run_single_flight(&self, ctx: &JobContext) {
        let (acquired, token) = ctx
            .collective
            .memory()
            .try_lock(&self.lock_key(), self.timeout().as_secs() + 10)
            .await;

        if !acquired {
            tracing::debug!(job = self.name(), "single-flight lock held elsewhere, skipping");
            return;
        }

        let started = Utc::now();
        let mut run = IngestionRun::start(
            self.source_tag(),
            serde_json::json!({ "job": self.name() }),
            started,
        );

        if let Err(e) = ctx.archive.record_ingestion_run_start(&run).await {
            tracing::warn!(error = %e, job = self.name(), "failed to record ingestion run start");
        }

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                run.error_message = Some("cancelled".to_string());
                run.finish(IngestionRunStatus::Failed, Utc::now());
            }
            outcome = tokio::time::timeout(self.timeout(), self.dispatch(ctx)) => {
                match outcome {
                    Ok(Ok(job_outcome)) => {
                        run.records_fetched = job_outcome.fetched;
                        run.records_inserted = job_outcome.inserted;
                        run.records_updated = job_outcome.updated;
                        run.records_failed = job_outcome.failed;
                        run.finish(IngestionRunStatus::Success, Utc::now());
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, job = self.name(), "job failed");
                        run.error_message = Some(e.to_string());
                        run.finish(IngestionRunStatus::Failed, Utc::now());
                    }
                    Err(_elapsed) => {
                        tracing::warn!(job = self.name(), "job timed out, cancelling");
                        run.error_message = Some("timed out".to_string());
                        run.finish(IngestionRunStatus::Failed, Utc::now());
                    }
                }
            }
        }

        if let Err(e) = ctx.archive.record_ingestion_run_finish(&run).await {
            tracing::warn!(error = %e, job = self.name(), "failed to record ingestion run finish");
        }

        ctx.collective.memory().unlock(&self.lock_key(), &token).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_includes_arguments() {
        let a = Job::NvdRecent { days: 1 };
        let b = Job::NvdRecent { days: 7 };
        assert_ne!(a.lock_key(), b.lock_key());
    }

    #[test]
    fn test_backfill_has_no_tick_interval() {
        let job = Job::NvdBackfill { start_year: 2020, end_year: 2021 };
        assert!(job.tick_interval().is_none());
    }

    #[test]
    fn test_enrichment_tiers_have_distinct_cadence() {
        let high = Job::EnrichmentTick { tier: EnrichmentTier::High, batch_size: 10 };
        let low = Job::EnrichmentTick { tier: EnrichmentTier::Low, batch_size: 10 };
        assert!(high.tick_interval() < low.tick_interval());
    }
}
