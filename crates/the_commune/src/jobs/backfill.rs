//! `nvd.backfill(start_year, end_year)`: on-demand, long-running, resumable.
//!
//! NVD's `lastModStartDate`/`lastModEndDate` pair is bounded to a 120-day
//! span per request, so a multi-year backfill is walked as a sequence of
//! date windows; the checkpoint records both the window index and the page
//! cursor within it so a crash mid-window resumes exactly where it left
//! off. The first re-fetched page after resume is safe to re-merge: the
//! Merger is idempotent (§4.3).

use chrono::{DateTime, TimeZone, Utc};
use the_foundation::CryptexResult;
use the_infiltrator::NvdQuery;

use crate::context::JobContext;
use crate::jobs::nvd::{merge_page, wait_for_rate_limit};
use crate::jobs::JobOutcome;

const JOB_NAME: &str = "nvd.backfill";
const WINDOW_DAYS: i64 = 120;

pub async fn run(ctx: &JobContext, start_year: i32, end_year: i32) -> CryptexResult<JobOutcome> {
    let job_key = format!("{start_year}-{end_year}");
    let mut outcome = JobOutcome::default();

    let span_start = Utc
        .with_ymd_and_hms(start_year, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let span_end = Utc
        .with_ymd_and_hms(end_year + 1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .min(Utc::now());

    let windows = date_windows(span_start, span_end);
    if windows.is_empty() {
        return Ok(outcome);
    }

    let (mut window_idx, mut start_index) = match ctx.archive.load_checkpoint(JOB_NAME, &job_key).await? {
        Some(cursor) => (
            cursor.get("window").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
            cursor.get("start_index").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        ),
        None => (0, 0),
    };

    while window_idx < windows.len() {
        if ctx.cancel.is_cancelled() {
            tracing::info!(job = JOB_NAME, window_idx, start_index, "backfill cancelled, checkpoint preserved");
            break;
        }

        let (window_start, window_end) = windows[window_idx];

        wait_for_rate_limit(ctx).await;

        let query = NvdQuery {
            start_index,
            results_per_page: 2000,
            last_mod_start_date: Some(window_start),
            last_mod_end_date: Some(window_end),
            cve_id: None,
            has_kev: false,
        };

        let page = match ctx.nvd.fetch_page(&query).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, job = JOB_NAME, window_idx, "backfill page fetch failed");
                outcome.failed += 1;
                break;
            }
        };

        merge_page(ctx, page.records, &mut outcome).await;

        let now = Utc::now();
        match page.next_start_index {
            Some(next) => {
                start_index = next;
                ctx.archive
                    .save_checkpoint(JOB_NAME, &job_key, checkpoint_cursor(window_idx, start_index), now)
                    .await?;
            }
            None => {
                window_idx += 1;
                start_index = 0;
                ctx.archive
                    .save_checkpoint(JOB_NAME, &job_key, checkpoint_cursor(window_idx, start_index), now)
                    .await?;
            }
        }
    }

    Ok(outcome)
}

fn checkpoint_cursor(window_idx: usize, start_index: u32) -> serde_json::Value {
    serde_json::json!({ "window": window_idx, "start_index": start_index })
}

fn date_windows(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let chunk = chrono::Duration::days(WINDOW_DAYS);
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + chunk).min(end);
        windows.push((cursor, next));
        cursor = next;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_windows_splits_at_120_days() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap();
        let windows = date_windows(start, end);
        assert!(windows.len() >= 2);
        assert_eq!(windows[0].0, start);
        assert_eq!(windows.last().unwrap().1, end);
        for (s, e) in &windows {
            assert!(*e - *s <= chrono::Duration::days(WINDOW_DAYS));
        }
    }

    #[test]
    fn test_date_windows_empty_when_start_after_end() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert!(date_windows(start, end).is_empty());
    }
}
