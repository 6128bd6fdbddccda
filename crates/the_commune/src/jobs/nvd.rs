//! `nvd.recent(days)`: the paged fetch/normalize/merge loop also shared
//! (with a persisted cursor) by `backfill.rs`.

use chrono::Utc;
use the_foundation::CryptexResult;
use the_infiltrator::NvdQuery;

use crate::context::JobContext;
use crate::jobs::JobOutcome;

pub async fn run_recent(ctx: &JobContext, days: i64) -> CryptexResult<JobOutcome> {
    let mut outcome = JobOutcome::default();
    let mut start_index = 0u32;

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        wait_for_rate_limit(ctx).await;

        let mut query = NvdQuery::recent(days);
        query.start_index = start_index;

        let page = match ctx.nvd.fetch_page(&query).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "nvd.recent page fetch failed");
                outcome.failed += 1;
                break;
            }
        };

        merge_page(ctx, page.records, &mut outcome).await;

        match page.next_start_index {
            Some(next) => start_index = next,
            None => break,
        }
    }

    Ok(outcome)
}

/// Normalize and merge every raw record in a fetched page. Per-record
/// failures are counted and logged; they never abort the job (§4.3).
pub(crate) async fn merge_page(
    ctx: &JobContext,
    records: Vec<the_normalizer::NvdCve>,
    outcome: &mut JobOutcome,
) {
    let now = Utc::now();
    for raw in &records {
        let Some(vuln) = the_normalizer::nvd::normalize(raw) else {
            outcome.failed += 1;
            continue;
        };

        match ctx.archive.upsert_vulnerability(vuln, now).await {
            Ok((_, merge_outcome)) => outcome.record_merge(merge_outcome),
            Err(e) => {
                tracing::warn!(error = %e, "nvd record merge failed");
                outcome.failed += 1;
            }
        }
    }
}

/// Distributed limiter layered on top of the client's own per-process
/// delay, shared across workers via C8's fixed-window counters (§4.5).
/// Fails open after a few short waits rather than stalling a job forever.
pub(crate) async fn wait_for_rate_limit(ctx: &JobContext) {
    let ceiling = if ctx.charter.infiltrator.nvd_api_key.is_some() {
        50
    } else {
        5
    };
    for _ in 0..3 {
        if ctx.collective.rate_limit_allow("nvd", 30, ceiling).await {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
}
