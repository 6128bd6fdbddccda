//! `enrichment.tick(batch_size, priority)`: a thin scheduling wrapper
//! around the Collective's enrichment queue (C6). The tiered selection
//! policy, the summarizer fallback, and the per-CVE in-flight lock all
//! live in `the_collective::enrichment`; this module only owns the cadence.

use the_collective::enrichment::EnrichmentTier;
use the_foundation::CryptexResult;

use crate::context::JobContext;
use crate::jobs::JobOutcome;

pub async fn run_tick(ctx: &JobContext, tier: EnrichmentTier, batch_size: i64) -> CryptexResult<JobOutcome> {
    let report = ctx.collective.run_enrichment_tick(tier, batch_size).await?;

    Ok(JobOutcome {
        fetched: report.considered as u64,
        inserted: 0,
        updated: (report.summarized_by_agitator + report.summarized_by_fallback) as u64,
        failed: report.skipped_in_flight as u64,
    })
}
