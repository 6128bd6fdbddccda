//! `cache.refresh_stats`: recompute the dashboard aggregate and repopulate
//! C8's `dashboard:stats` key (§4.8) so API readers hit the cache instead of
//! `aggregate_stats()`'s batched query on every request.

use the_foundation::CryptexResult;

use crate::context::JobContext;
use crate::jobs::JobOutcome;

pub async fn run_refresh_stats(ctx: &JobContext) -> CryptexResult<JobOutcome> {
    let stats = ctx.archive.aggregate_stats().await?;
    ctx.collective.memory().set_dashboard_stats(&stats).await;

    Ok(JobOutcome {
        fetched: 1,
        inserted: 0,
        updated: 1,
        failed: 0,
    })
}
