//! The Scorer (C4): a pure function computing a priority score from severity,
//! CVSS, recency, and exploitation flag.

use chrono::{DateTime, Utc};
use the_foundation::{Severity, Vulnerability};

/// `base_cvss` term: the numeric CVSS score normalized to `[0,1]` when
/// present, else a severity-bucket proxy.
fn base_cvss(cvss_score: Option<f64>, severity: Severity) -> f64 {
    if let Some(score) = cvss_score {
        return (score / 10.0).clamp(0.0, 1.0);
    }

    match severity {
        Severity::Critical => 1.0,
        Severity::High => 0.7,
        Severity::Medium => 0.4,
        Severity::Low => 0.2,
        Severity::Unknown => 0.0,
    }
}

/// `recency` term: 1.0 within 7 days, 0.5 within 30 days, else 0. Absent
/// `published_at` scores 0.
fn recency(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published_at) = published_at else {
        return 0.0;
    };

    let age = now.signed_duration_since(published_at);
    if age.num_days() <= 7 {
        1.0
    } else if age.num_days() <= 30 {
        0.5
    } else {
        0.0
    }
}

/// Compute the priority score for a vulnerability as of `now`.
///
/// `score = 0.4*base_cvss + 0.2*recency + 0.4*exploit`, clamped to `[0,1]`
/// and rounded to 3 decimal places. This is the only place the weights
/// `0.4/0.2/0.4` appear; every caller (the Merger on every write, the
/// Enrichment Queue's ordering) goes through this function rather than
/// recomputing the formula.
pub fn score(v: &Vulnerability, now: DateTime<Utc>) -> f64 {
    let base = base_cvss(v.cvss_score, v.severity);
    let rec = recency(v.published_at, now);
    let exploit = if v.exploited_in_the_wild { 1.0 } else { 0.0 };

    let raw = 0.4 * base + 0.2 * rec + 0.4 * exploit;
    let clamped = raw.clamp(0.0, 1.0);
    (clamped * 1000.0).round() / 1000.0
}

/// Recompute and write back a vulnerability's `priority_score`. The Merger
/// calls this on every write; nothing else is
/// authorized to mutate the field.
pub fn rescore(v: &mut Vulnerability, now: DateTime<Utc>) {
    v.priority_score = score(v, now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn base_vuln() -> Vulnerability {
        Vulnerability::new_from_source(
            "CVE-2024-0001".to_string(),
            "nvd".into(),
            Utc::now(),
        )
    }

    #[test]
    fn test_score_boundary() {
        // MEDIUM, cvss=4.0, published 10 days ago,
        // not exploited => 0.4*0.4 + 0.2*0.5 + 0 = 0.26
        let mut v = base_vuln();
        v.severity = Severity::Medium;
        v.cvss_score = Some(4.0);
        let now = Utc::now();
        v.published_at = Some(now - Duration::days(10));

        assert_eq!(score(&v, now), 0.26);
    }

    #[test]
    fn test_bounds() {
        let mut v = base_vuln();
        v.cvss_score = Some(10.0);
        v.exploited_in_the_wild = true;
        v.published_at = Some(Utc::now());

        let s = score(&v, Utc::now());
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn test_exploited_implies_at_least_point_four() {
        // exploited implies score >= 0.4
        let mut v = base_vuln();
        v.exploited_in_the_wild = true;
        v.cvss_score = None;
        v.severity = Severity::Unknown;
        v.published_at = None;

        assert!(score(&v, Utc::now()) >= 0.4);
    }

    #[test]
    fn test_absent_published_at_zero_recency() {
        let mut v = base_vuln();
        v.severity = Severity::Critical;
        v.published_at = None;
        // base=1.0, recency=0, exploit=0 => 0.4
        assert_eq!(score(&v, Utc::now()), 0.4);
    }

    #[test]
    fn test_cisa_nvd_merge_priority() {
        // HIGH, cvss=7.5, exploited=true, published
        // 2024-02-01 (old by the time this runs, so recency=0)
        let mut v = base_vuln();
        v.severity = Severity::High;
        v.cvss_score = Some(7.5);
        v.exploited_in_the_wild = true;
        v.published_at = Some(DateTime::parse_from_rfc3339("2024-02-01T00:00:00Z").unwrap().into());
        v.sources = BTreeSet::from(["nvd".into(), "cisa_kev".into()]);

        let s = score(&v, Utc::now());
        // 0.4*0.75 + 0.2*0 + 0.4*1 = 0.7
        assert_eq!(s, 0.7);
    }

    #[test]
    fn test_rescore_writes_priority_score() {
        let mut v = base_vuln();
        v.severity = Severity::Critical;
        v.published_at = Some(Utc::now());
        v.exploited_in_the_wild = true;
        rescore(&mut v, Utc::now());
        assert_eq!(v.priority_score, 1.0);
    }
}
