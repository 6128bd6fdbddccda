//! `cisa_kev.refresh`: full-document periodic refresh, not incremental
//! (§4.1) — every tick re-fetches and re-merges the whole KEV catalog.

use chrono::Utc;
use the_foundation::CryptexResult;

use crate::context::JobContext;
use crate::jobs::JobOutcome;

pub async fn run_refresh(ctx: &JobContext) -> CryptexResult<JobOutcome> {
    let mut outcome = JobOutcome::default();

    let catalog = ctx.cisa_kev.fetch_all().await.map_err(|e| {
        tracing::warn!(error = %e, "cisa_kev.refresh fetch failed");
        the_foundation::CryptexError::from(e)
    })?;

    let now = Utc::now();
    for entry in &catalog.vulnerabilities {
        let Some(vuln) = the_normalizer::cisa_kev::normalize(entry) else {
            outcome.failed += 1;
            continue;
        };

        match ctx.archive.upsert_vulnerability(vuln, now).await {
            Ok((_, merge_outcome)) => outcome.record_merge(merge_outcome),
            Err(e) => {
                tracing::warn!(error = %e, cve_id = %entry.cve_id, "cisa_kev record merge failed");
                outcome.failed += 1;
            }
        }
    }

    Ok(outcome)
}
