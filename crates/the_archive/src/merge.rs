//! The Merger (C3): field-wise reconciliation of an incoming normalized
//! record against whatever the Store already holds for that CVE, using
//! source-priority to resolve conflicting scalars.
//!
//! Pure in-memory logic lives here; `store.rs::upsert_vulnerability` wraps
//! it in the `SELECT ... FOR UPDATE` transaction that gives it single-writer
//! semantics per CVE-ID.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use the_foundation::{source_priority_rank, Reference, Severity, SourceTag, Vulnerability};

/// Whether a merge produced a brand-new row or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
}

/// Merge `incoming` (freshly normalized by a single source) into `existing`
/// (the current Store row for the same `cve_id`, if any), returning the
/// reconciled row and whether this was an insert or an update.
///
/// `existing` is consumed and `incoming` is consumed; both the Merger and
/// the Normalizer only ever hand off ownership of a fully-built
/// `Vulnerability`, so there's no benefit to borrowing here.
pub fn merge(existing: Option<Vulnerability>, incoming: Vulnerability, now: DateTime<Utc>) -> (Vulnerability, MergeOutcome) {
    let Some(mut existing) = existing else {
        let mut v = incoming;
        v.created_at = now;
        v.updated_at = now;
        the_assessor::rescore(&mut v, now);
        return (v, MergeOutcome::Inserted);
    };

    let incoming_source = incoming.sources.iter().next().cloned();
    let incoming_wins_scalars = match &incoming_source {
        Some(tag) => {
            let incoming_rank = source_priority_rank(&tag.0);
            let existing_rank = existing
                .sources
                .iter()
                .map(|s| source_priority_rank(&s.0))
                .min()
                .unwrap_or(usize::MAX);
            incoming_rank < existing_rank
        }
        None => false,
    };

    existing.title = merge_scalar(existing.title, incoming.title, incoming_wins_scalars);
    existing.description = merge_scalar(existing.description, incoming.description, incoming_wins_scalars);
    existing.cvss_score = merge_scalar(existing.cvss_score, incoming.cvss_score, incoming_wins_scalars);
    existing.cvss_vector = merge_scalar(existing.cvss_vector, incoming.cvss_vector, incoming_wins_scalars);

    existing.severity = if existing.severity == Severity::Unknown {
        incoming.severity
    } else if incoming_wins_scalars && incoming.severity != Severity::Unknown {
        incoming.severity
    } else {
        existing.severity
    };

    existing.published_at = merge_scalar(existing.published_at, incoming.published_at, incoming_wins_scalars);

    existing.modified_at = match (existing.modified_at, incoming.modified_at) {
        (Some(e), Some(i)) => Some(e.max(i)),
        (Some(e), None) => Some(e),
        (None, Some(i)) => Some(i),
        (None, None) => None,
    };

    existing.exploited_in_the_wild = existing.exploited_in_the_wild || incoming.exploited_in_the_wild;
    existing.cisa_due_date = existing.cisa_due_date.or(incoming.cisa_due_date);

    existing.cwe_ids = union(existing.cwe_ids, incoming.cwe_ids);
    existing.vendors = union(existing.vendors, incoming.vendors);
    existing.products = union(existing.products, incoming.products);
    existing.affected_products = union(existing.affected_products, incoming.affected_products);
    existing.references = merge_references(existing.references, incoming.references);

    existing.sources = union(existing.sources, incoming.sources);
    existing.source_tags.extend(incoming.source_tags);

    existing.updated_at = now;
    the_assessor::rescore(&mut existing, now);

    (existing, MergeOutcome::Updated)
}

fn merge_scalar<T>(existing: Option<T>, incoming: Option<T>, incoming_wins: bool) -> Option<T> {
    match (existing, incoming) {
        (None, incoming) => incoming,
        (existing, None) => existing,
        (Some(e), Some(i)) => {
            if incoming_wins {
                Some(i)
            } else {
                Some(e)
            }
        }
    }
}

fn union<T: Ord>(a: BTreeSet<T>, b: BTreeSet<T>) -> BTreeSet<T> {
    a.into_iter().chain(b).collect()
}

/// Union references keyed by URL; when both sides carry the same URL, keep
/// whichever has the richer tag set (ties favor the existing entry).
fn merge_references(existing: Vec<Reference>, incoming: Vec<Reference>) -> Vec<Reference> {
    use std::collections::BTreeMap;

    let mut by_url: BTreeMap<String, Reference> = BTreeMap::new();
    for r in existing {
        by_url.insert(r.url.clone(), r);
    }
    for r in incoming {
        match by_url.get(&r.url) {
            Some(existing_r) if existing_r.tags.len() >= r.tags.len() => {}
            _ => {
                by_url.insert(r.url.clone(), r);
            }
        }
    }
    by_url.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use the_foundation::ReferenceType;

    fn nvd_vuln(cve: &str, now: DateTime<Utc>) -> Vulnerability {
        let mut v = Vulnerability::new_from_source(cve.to_string(), SourceTag::nvd(), now);
        v.title = Some("A vuln".to_string());
        v.cvss_score = Some(5.0);
        v.severity = Severity::Medium;
        v
    }

    #[test]
    fn test_insert_when_absent() {
        let now = Utc::now();
        let incoming = nvd_vuln("CVE-2024-0001", now);
        let (merged, outcome) = merge(None, incoming, now);
        assert_eq!(outcome, MergeOutcome::Inserted);
        assert_eq!(merged.created_at, merged.updated_at);
        assert!(merged.sources.contains(&SourceTag::nvd()));
    }

    #[test]
    fn test_merge_is_idempotent_modulo_updated_at() {
        let now = Utc::now();
        let existing = nvd_vuln("CVE-2024-0001", now);
        let incoming = nvd_vuln("CVE-2024-0001", now);
        let (merged, outcome) = merge(Some(existing), incoming, now);
        assert_eq!(outcome, MergeOutcome::Updated);
        assert_eq!(merged.title, Some("A vuln".to_string()));
        assert_eq!(merged.cvss_score, Some(5.0));
    }

    #[test]
    fn test_cisa_kev_outranks_nvd_for_scalars() {
        let now = Utc::now();
        let mut existing = nvd_vuln("CVE-2024-0001", now);
        existing.title = Some("NVD title".to_string());

        let mut incoming = Vulnerability::new_from_source(
            "CVE-2024-0001".to_string(),
            SourceTag::cisa_kev(),
            now,
        );
        incoming.title = Some("CISA title".to_string());
        incoming.exploited_in_the_wild = true;

        let (merged, _) = merge(Some(existing), incoming, now);
        assert_eq!(merged.title, Some("CISA title".to_string()));
        assert!(merged.exploited_in_the_wild);
        assert!(merged.sources.contains(&SourceTag::nvd()));
        assert!(merged.sources.contains(&SourceTag::cisa_kev()));
    }

    #[test]
    fn test_lower_priority_cannot_overwrite_present_scalar() {
        let now = Utc::now();
        let mut existing = Vulnerability::new_from_source(
            "CVE-2024-0001".to_string(),
            SourceTag::cisa_kev(),
            now,
        );
        existing.title = Some("CISA title".to_string());

        let mut incoming = nvd_vuln("CVE-2024-0001", now);
        incoming.title = Some("NVD title".to_string());

        let (merged, _) = merge(Some(existing), incoming, now);
        assert_eq!(merged.title, Some("CISA title".to_string()));
    }

    #[test]
    fn test_absent_always_loses_regardless_of_priority() {
        let now = Utc::now();
        let mut existing = Vulnerability::new_from_source(
            "CVE-2024-0001".to_string(),
            SourceTag::cisa_kev(),
            now,
        );
        existing.title = None;

        let mut incoming = nvd_vuln("CVE-2024-0001", now);
        incoming.title = Some("NVD title".to_string());

        let (merged, _) = merge(Some(existing), incoming, now);
        assert_eq!(merged.title, Some("NVD title".to_string()));
    }

    #[test]
    fn test_modified_at_takes_later_regardless_of_priority() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::days(5);

        let mut existing = Vulnerability::new_from_source(
            "CVE-2024-0001".to_string(),
            SourceTag::cisa_kev(),
            now,
        );
        existing.modified_at = Some(earlier);

        let mut incoming = nvd_vuln("CVE-2024-0001", now);
        incoming.modified_at = Some(now);

        let (merged, _) = merge(Some(existing), incoming, now);
        assert_eq!(merged.modified_at, Some(now));
    }

    #[test]
    fn test_set_fields_union() {
        let now = Utc::now();
        let mut existing = nvd_vuln("CVE-2024-0001", now);
        existing.cwe_ids.insert("CWE-79".to_string());
        existing.vendors.insert("acme".to_string());

        let mut incoming = nvd_vuln("CVE-2024-0001", now);
        incoming.cwe_ids.insert("CWE-89".to_string());
        incoming.vendors.insert("acme".to_string());

        let (merged, _) = merge(Some(existing), incoming, now);
        assert_eq!(merged.cwe_ids.len(), 2);
        assert_eq!(merged.vendors.len(), 1);
    }

    #[test]
    fn test_references_union_keeps_richer_duplicate() {
        let now = Utc::now();
        let mut existing = nvd_vuln("CVE-2024-0001", now);
        existing.references.push(Reference {
            url: "https://example.com/a".to_string(),
            ref_type: ReferenceType::Other,
            tags: vec![],
        });

        let mut incoming = nvd_vuln("CVE-2024-0001", now);
        incoming.references.push(Reference {
            url: "https://example.com/a".to_string(),
            ref_type: ReferenceType::Patch,
            tags: vec!["Patch".to_string()],
        });

        let (merged, _) = merge(Some(existing), incoming, now);
        assert_eq!(merged.references.len(), 1);
        assert_eq!(merged.references[0].ref_type, ReferenceType::Patch);
    }

    #[test]
    fn test_exploited_in_the_wild_is_monotonic() {
        let now = Utc::now();
        let mut existing = nvd_vuln("CVE-2024-0001", now);
        existing.exploited_in_the_wild = true;

        let incoming = nvd_vuln("CVE-2024-0001", now);
        let (merged, _) = merge(Some(existing), incoming, now);
        assert!(merged.exploited_in_the_wild);
    }

    #[test]
    fn test_rescore_runs_on_every_merge() {
        let now = Utc::now();
        let mut existing = nvd_vuln("CVE-2024-0001", now);
        existing.priority_score = 0.0;

        let mut incoming = nvd_vuln("CVE-2024-0001", now);
        incoming.exploited_in_the_wild = true;

        let (merged, _) = merge(Some(existing), incoming, now);
        assert!(merged.priority_score > 0.0);
    }
}
