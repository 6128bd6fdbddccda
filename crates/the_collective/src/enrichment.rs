//! The Enrichment Queue (C6) - turns freshly-merged vulnerabilities into
//! plain-language summaries.
//!
//! Traditional name: `EnrichmentWorker` or `SummaryQueue`
//!
//! Selection is priority-tiered rather than FIFO: an exploited or critical
//! vulnerability should get a human-readable summary long before a decade-old
//! low-severity entry does. Every entry is marked processed whether the
//! summary came from a real agitator or the rule-based fallback, so a
//! persistently unreachable provider can never turn into a reprocessing loop.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use the_agitator::fallback::fallback_summarize;
use the_archive::TheArchive;
use the_foundation::{CryptexResult, Severity, TaskType, TheAgitator, TheInquiry, Vulnerability};

use crate::memory::TheMemory;
use crate::observer::TheObserver;

/// Selection tier, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentTier {
    High,
    Medium,
    Low,
}

impl EnrichmentTier {
    fn matches(self, v: &Vulnerability, now: chrono::DateTime<Utc>) -> bool {
        let age_days = v
            .published_at
            .map(|p| (now - p).num_days())
            .unwrap_or(i64::MAX);

        match self {
            EnrichmentTier::High => {
                v.exploited_in_the_wild || v.severity == Severity::Critical || age_days <= 7
            }
            EnrichmentTier::Medium => v.severity == Severity::High || age_days <= 30,
            EnrichmentTier::Low => true,
        }
    }
}

/// Outcome of one enrichment pass, surfaced to the scheduler and logs.
#[derive(Debug, Default)]
pub struct EnrichmentReport {
    pub considered: usize,
    pub skipped_in_flight: usize,
    pub summarized_by_agitator: usize,
    pub summarized_by_fallback: usize,
}

/// Drives the enrichment queue: selects a batch from the archive by tier,
/// summarizes each entry through the configured agitators (falling back to
/// the rule-based summarizer), and writes the result back.
pub struct TheEnrichmentQueue {
    archive: Arc<TheArchive>,
    memory: Arc<TheMemory>,
    observer: Arc<TheObserver>,
    agitators: Vec<Arc<dyn TheAgitator>>,
    lock_ttl_seconds: u64,
}

impl TheEnrichmentQueue {
    pub fn new(
        archive: Arc<TheArchive>,
        memory: Arc<TheMemory>,
        observer: Arc<TheObserver>,
        agitators: Vec<Arc<dyn TheAgitator>>,
    ) -> Self {
        Self {
            archive,
            memory,
            observer,
            agitators,
            lock_ttl_seconds: 120,
        }
    }

    /// Run one enrichment tick: select up to `batch_size` unprocessed
    /// vulnerabilities matching `tier`, summarize, and persist.
    pub async fn tick(&self, tier: EnrichmentTier, batch_size: i64) -> CryptexResult<EnrichmentReport> {
        let now = Utc::now();

        // The archive orders the unprocessed set by priority_score only; it
        // has no tier-aware index, so oversample and filter in-process.
        let pool = self
            .archive
            .list_unprocessed(batch_size.saturating_mul(4).max(batch_size))
            .await?;

        let batch: Vec<Vulnerability> = pool
            .into_iter()
            .filter(|v| tier.matches(v, now))
            .take(batch_size.max(0) as usize)
            .collect();

        let mut report = EnrichmentReport {
            considered: batch.len(),
            ..Default::default()
        };

        for vuln in &batch {
            self.enrich_one(vuln, now, &mut report).await;
        }

        Ok(report)
    }

    async fn enrich_one(&self, vuln: &Vulnerability, now: chrono::DateTime<Utc>, report: &mut EnrichmentReport) {
        let lock_key = format!("enrich:{}", vuln.cve_id);
        let (acquired, token) = self.memory.try_lock(&lock_key, self.lock_ttl_seconds).await;
        if !acquired {
            report.skipped_in_flight += 1;
            return;
        }

        let start = Instant::now();
        self.observer.record_inquiry_start(&vuln.cve_id);

        match self.summarize_via_agitator(vuln).await {
            Some((title, description)) => {
                report.summarized_by_agitator += 1;
                self.observer
                    .record_inquiry_complete(&vuln.cve_id, start.elapsed(), 1.0);
                self.persist(vuln, title, description, now).await;
            }
            None => {
                // Every agitator failed, or none are configured: fall back
                // to the rule-based summarizer so the entry is never
                // reprocessed forever.
                let severity_str = vuln.severity.to_string();
                let fallback = fallback_summarize(
                    vuln.title.as_deref(),
                    vuln.description.as_deref(),
                    &severity_str,
                    vuln.vendors.iter().next().map(String::as_str),
                    vuln.products.iter().next().map(String::as_str),
                );
                report.summarized_by_fallback += 1;
                self.observer
                    .record_inquiry_complete(&vuln.cve_id, start.elapsed(), 0.3);
                self.persist(vuln, fallback.simple_title, fallback.simple_description, now)
                    .await;
            }
        }

        self.memory.unlock(&lock_key, &token).await;
    }

    async fn summarize_via_agitator(&self, vuln: &Vulnerability) -> Option<(String, String)> {
        if self.agitators.is_empty() {
            return None;
        }

        let package_data = serde_json::json!({
            "cve_id": vuln.cve_id,
            "title": vuln.title,
            "description": vuln.description,
            "severity": vuln.severity.to_string(),
            "cvss_score": vuln.cvss_score,
        });

        let inquiry = TheInquiry::new(TaskType::Summarization, package_data).with_context(
            "Produce a plain-language title and a two-sentence description of this \
             vulnerability for a non-specialist reader. Respond as JSON: \
             {\"title\": ..., \"description\": ...}."
                .to_string(),
        );

        let fingerprint = inquiry.fingerprint();
        if let Ok(Some(cached)) = self.memory.retrieve(&fingerprint).await {
            self.observer.record_cache_hit();
            if let Some(parsed) = parse_reply(&cached.content) {
                return Some(parsed);
            }
        } else {
            self.observer.record_cache_miss();
        }

        for agitator in &self.agitators {
            let package = the_foundation::ThePackage {
                data: inquiry.package.data.clone(),
                context: inquiry.package.context.clone(),
            };

            let name = format!("{:?}", agitator.agitator_type());
            match agitator.the_agitation(package).await {
                Ok(reply) => {
                    self.observer.record_agitator_request(&name, true).await;
                    if let Some(parsed) = parse_reply(&reply.content) {
                        let _ = self.memory.store(fingerprint, reply).await;
                        return Some(parsed);
                    }
                    tracing::warn!("agitator {} returned an unparseable reply for {}", name, vuln.cve_id);
                }
                Err(e) => {
                    self.observer.record_agitator_request(&name, false).await;
                    tracing::warn!("agitator {} failed for {}: {}", name, vuln.cve_id, e);
                }
            }
        }

        None
    }

    async fn persist(
        &self,
        vuln: &Vulnerability,
        simple_title: String,
        simple_description: String,
        now: chrono::DateTime<Utc>,
    ) {
        if let Err(e) = self
            .archive
            .record_enrichment(&vuln.cve_id, Some(simple_title), Some(simple_description), now)
            .await
        {
            tracing::error!("failed to persist enrichment for {}: {}", vuln.cve_id, e);
        }
    }
}

/// Agitators are asked to reply with a small JSON object; if they don't,
/// fall back to treating the whole reply as the description.
fn parse_reply(content: &str) -> Option<(String, String)> {
    #[derive(serde::Deserialize)]
    struct Parsed {
        title: String,
        description: String,
    }

    if let Ok(parsed) = serde_json::from_str::<Parsed>(content) {
        return Some((parsed.title, parsed.description));
    }

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    let title: String = trimmed.chars().take(80).collect();
    Some((title, trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn base_vuln(cve_id: &str) -> Vulnerability {
        Vulnerability {
            cve_id: cve_id.to_string(),
            title: None,
            description: None,
            cvss_score: None,
            cvss_vector: None,
            severity: Severity::Unknown,
            published_at: None,
            modified_at: None,
            exploited_in_the_wild: false,
            cisa_due_date: None,
            cwe_ids: BTreeSet::new(),
            vendors: BTreeSet::new(),
            products: BTreeSet::new(),
            affected_products: BTreeSet::new(),
            references: Vec::new(),
            sources: BTreeSet::new(),
            source_tags: Vec::new(),
            priority_score: 0.0,
            simple_title: None,
            simple_description: None,
            llm_processed: false,
            llm_processed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_high_tier_matches_exploited() {
        let mut v = base_vuln("CVE-2024-0001");
        v.exploited_in_the_wild = true;
        assert!(EnrichmentTier::High.matches(&v, Utc::now()));
        assert!(!EnrichmentTier::High.matches(&base_vuln("CVE-2024-0002"), Utc::now()));
    }

    #[test]
    fn test_high_tier_matches_critical_severity() {
        let mut v = base_vuln("CVE-2024-0003");
        v.severity = Severity::Critical;
        assert!(EnrichmentTier::High.matches(&v, Utc::now()));
    }

    #[test]
    fn test_medium_tier_matches_high_severity_not_high_tier() {
        let mut v = base_vuln("CVE-2024-0004");
        v.severity = Severity::High;
        assert!(EnrichmentTier::Medium.matches(&v, Utc::now()));
        assert!(!EnrichmentTier::High.matches(&v, Utc::now()));
    }

    #[test]
    fn test_low_tier_matches_everything() {
        assert!(EnrichmentTier::Low.matches(&base_vuln("CVE-2024-0005"), Utc::now()));
    }

    #[test]
    fn test_parse_reply_json() {
        let parsed = parse_reply(
            r#"{"title": "SQL Injection in Foo", "description": "Attackers can run arbitrary SQL."}"#,
        );
        assert_eq!(parsed.unwrap().0, "SQL Injection in Foo");
    }

    #[test]
    fn test_parse_reply_plain_text_fallback() {
        let parsed = parse_reply("Just a plain sentence describing the bug.");
        assert!(parsed.is_some());
    }

    #[test]
    fn test_parse_reply_empty_is_none() {
        assert!(parse_reply("").is_none());
    }
}
