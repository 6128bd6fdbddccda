//! `rss.fetch_all`: fan-out over active `NewsSource`s, each source fetched
//! at its own `fetch_interval_seconds`, bounded by a per-tick concurrency
//! cap (§4.5's "a job may run in multiple workers, but per-source work is
//! still bounded").

use std::sync::Arc;

use chrono::Utc;
use the_foundation::{CryptexResult, NewsSource};
use tokio::sync::Semaphore;

use crate::context::JobContext;
use crate::jobs::JobOutcome;

const MAX_CONCURRENT_FEEDS: usize = 4;

pub async fn run_fetch_all(ctx: &JobContext) -> CryptexResult<JobOutcome> {
    let sources = ctx.archive.list_sources(true).await?;
    let now = Utc::now();

    let due: Vec<NewsSource> = sources
        .into_iter()
        .filter(|s| is_due(s, now))
        .collect();

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_FEEDS));
    let mut set = tokio::task::JoinSet::new();

    for source in due {
        let ctx = ctx.clone();
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
        set.spawn(async move {
            let _permit = permit;
            fetch_one(&ctx, source, Utc::now()).await
        });
    }

    let mut outcome = JobOutcome::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(one) => {
                outcome.fetched += one.fetched;
                outcome.inserted += one.inserted;
                outcome.updated += one.updated;
                outcome.failed += one.failed;
            }
            Err(e) => {
                tracing::warn!(error = %e, "rss per-source task panicked");
                outcome.failed += 1;
            }
        }
    }

    Ok(outcome)
}

fn is_due(source: &NewsSource, now: chrono::DateTime<Utc>) -> bool {
    match source.last_fetched_at {
        None => true,
        Some(last) => (now - last).num_seconds() >= source.fetch_interval_seconds as i64,
    }
}

async fn fetch_one(ctx: &JobContext, source: NewsSource, now: chrono::DateTime<Utc>) -> JobOutcome {
    let mut outcome = JobOutcome::default();

    let items = match ctx.rss.fetch(&source.feed_url).await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(error = %e, feed = %source.feed_url, "rss fetch failed");
            let _ = ctx
                .archive
                .record_source_fetch(&source.feed_url, "failed", Some(e.to_string()), 0, now)
                .await;
            outcome.failed += 1;
            return outcome;
        }
    };

    let mut new_count = 0u64;
    for item in &items {
        let Some(article) = the_normalizer::rss::normalize(item, source.id, now) else {
            outcome.failed += 1;
            continue;
        };

        match ctx.archive.upsert_article(&article).await {
            Ok(true) => {
                new_count += 1;
                outcome.inserted += 1;
            }
            Ok(false) => outcome.updated += 1,
            Err(e) => {
                tracing::warn!(error = %e, url = %article.url, "rss article upsert failed");
                outcome.failed += 1;
            }
        }
        outcome.fetched += 1;
    }

    let _ = ctx
        .archive
        .record_source_fetch(&source.feed_url, "success", None, new_count, now)
        .await;

    outcome
}
