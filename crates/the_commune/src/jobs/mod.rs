//! Canonical job set (§4.5): one module per job family, each a thin
//! fetch -> normalize -> merge pipeline over its Source Client and the
//! Normalizer.

pub mod backfill;
pub mod cache;
pub mod cisa_kev;
pub mod enrichment;
pub mod nvd;
pub mod rss;

/// Counts a job tick folds back into its `IngestionRun`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JobOutcome {
    pub fetched: u64,
    pub inserted: u64,
    pub updated: u64,
    pub failed: u64,
}

impl JobOutcome {
    pub fn record_merge(&mut self, outcome: the_archive::MergeOutcome) {
        self.fetched += 1;
        match outcome {
            the_archive::MergeOutcome::Inserted => self.inserted += 1,
            the_archive::MergeOutcome::Updated => self.updated += 1,
        }
    }
}
