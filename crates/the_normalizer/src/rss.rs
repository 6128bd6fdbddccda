//! Projection of an already-parsed, already-sanitized feed entry into the
//! canonical [`Article`]. Feed parsing (RSS 2.0 / Atom, with or without a
//! default namespace), HTML sanitization, and tolerant date parsing are the
//! RSS/Atom client's job; this module is
//! the pure C2 projection step that sits downstream of it.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;
use the_foundation::Article;

use crate::cve_id;

/// A single feed entry, already stripped of HTML and with its date already
/// parsed by the client. Title/summary are plain text.
#[derive(Debug, Clone)]
pub struct RawFeedItem {
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
}

/// Project one feed item into the canonical [`Article`] shape, keyed by URL.
/// Related CVEs are discovered by scanning title+summary for `CVE-YYYY-N+`
/// tokens.
pub fn normalize(item: &RawFeedItem, source_id: Uuid, fetched_at: DateTime<Utc>) -> Option<Article> {
    if item.url.is_empty() || item.title.is_empty() {
        return None;
    }

    let mut related_cves = BTreeSet::new();
    related_cves.extend(cve_id::extract_from_text(&item.title));
    related_cves.extend(cve_id::extract_from_text(&item.summary));

    Some(Article {
        source_id,
        title: item.title.clone(),
        url: item.url.clone(),
        author: item.author.clone(),
        summary: Some(item.summary.clone()),
        published_at: item.published_at,
        fetched_at,
        categories: item.categories.clone(),
        related_cves,
        llm_summary: None,
        llm_key_points: None,
        llm_relevance: None,
        llm_processed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extracts_related_cves() {
        let item = RawFeedItem {
            title: "Critical flaw CVE-2024-0001 patched".to_string(),
            url: "https://example.com/post/1".to_string(),
            author: Some("Jane".to_string()),
            summary: "Also affects CVE-2024-0002.".to_string(),
            published_at: Some(Utc::now()),
            categories: vec!["security".to_string()],
        };

        let article = normalize(&item, Uuid::nil(), Utc::now()).unwrap();
        assert!(article.related_cves.contains("CVE-2024-0001"));
        assert!(article.related_cves.contains("CVE-2024-0002"));
        assert_eq!(article.related_cves.len(), 2);
    }

    #[test]
    fn test_normalize_rejects_empty_url() {
        let item = RawFeedItem {
            title: "Title".to_string(),
            url: String::new(),
            author: None,
            summary: String::new(),
            published_at: None,
            categories: vec![],
        };
        assert!(normalize(&item, Uuid::nil(), Utc::now()).is_none());
    }
}
