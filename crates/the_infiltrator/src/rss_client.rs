//! RSS 2.0 / Atom feed client. Accepts a feed URL; parses both syndication
//! formats (with or without a default XML namespace); tolerates RFC-822,
//! ISO-8601 (optional sub-seconds and/or `Z` suffix), and date-only dates;
//! sanitizes HTML from title/summary (tag strip + entity decode + whitespace
//! normalize).

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ClientError;
use crate::retry::with_retry;
use the_normalizer::rss::RawFeedItem;

pub struct RssClient {
    http: reqwest::Client,
}

impl RssClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Fetch and parse one feed, sanitizing HTML and tolerantly parsing
    /// dates before handing items to the Normalizer.
    pub async fn fetch(&self, feed_url: &str) -> Result<Vec<RawFeedItem>, ClientError> {
        let feed_url = feed_url.to_string();
        with_retry(|| self.fetch_once(&feed_url)).await
    }

    async fn fetch_once(&self, feed_url: &str) -> Result<Vec<RawFeedItem>, ClientError> {
        let response = self
            .http
            .get(feed_url)
            .send()
            .await
            .map_err(|e| ClientError::Retryable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ClientError::RateLimited {
                retry_after: std::time::Duration::from_secs(60),
            });
        }
        if status.is_server_error() {
            return Err(ClientError::Retryable(format!("HTTP {status}")));
        }
        if status.is_client_error() {
            return Err(ClientError::Permanent(format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Retryable(e.to_string()))?;

        parse_feed(&bytes)
    }
}

impl Default for RssClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse feed bytes as RSS 2.0, falling back to Atom (with or without a
/// default namespace) if RSS parsing fails.
fn parse_feed(bytes: &[u8]) -> Result<Vec<RawFeedItem>, ClientError> {
    if let Ok(channel) = rss::Channel::read_from(bytes) {
        return Ok(channel.items().iter().filter_map(item_from_rss).collect());
    }

    if let Ok(feed) = atom_syndication::Feed::read_from(bytes) {
        return Ok(feed.entries().iter().filter_map(item_from_atom).collect());
    }

    Err(ClientError::Malformed(
        "payload is neither valid RSS 2.0 nor Atom".to_string(),
    ))
}

fn item_from_rss(item: &rss::Item) -> Option<RawFeedItem> {
    let title = sanitize_text(item.title().unwrap_or_default());
    let url = item.link().unwrap_or_default().to_string();
    if title.is_empty() || url.is_empty() {
        return None;
    }

    Some(RawFeedItem {
        title,
        url,
        author: item.author().map(sanitize_text).filter(|s| !s.is_empty()),
        summary: sanitize_text(item.description().unwrap_or_default()),
        published_at: item.pub_date().and_then(parse_tolerant_date),
        categories: item
            .categories()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    })
}

fn item_from_atom(entry: &atom_syndication::Entry) -> Option<RawFeedItem> {
    let title = sanitize_text(&entry.title().value);
    let url = entry
        .links()
        .first()
        .map(|l| l.href().to_string())
        .unwrap_or_default();
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let summary = entry
        .summary()
        .map(|s| s.value.clone())
        .or_else(|| entry.content().and_then(|c| c.value().map(|v| v.to_string())))
        .unwrap_or_default();

    let author = entry.authors().first().map(|a| a.name().to_string());

    let published_at = entry
        .published()
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| Some(entry.updated().with_timezone(&Utc)));

    Some(RawFeedItem {
        title,
        url,
        author: author.map(|a| sanitize_text(&a)).filter(|s| !s.is_empty()),
        summary: sanitize_text(summary),
        published_at,
        categories: entry
            .categories()
            .iter()
            .map(|c| c.term().to_string())
            .collect(),
    })
}

/// Strip HTML tags, decode entities, and normalize whitespace. Uses an empty
/// tag allowlist so every element is stripped but its text content (and
/// decoded entities) survive.
fn sanitize_text(raw: &str) -> String {
    let stripped = ammonia::Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(raw)
        .to_string();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tolerantly parse a feed date: RFC-822 (RSS's native format), ISO-8601
/// (sub-seconds and/or `Z` suffix optional), or a bare date.
fn parse_tolerant_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(
            date.and_hms_opt(0, 0, 0).unwrap(),
            Utc,
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tolerant_date_rfc822() {
        let d = parse_tolerant_date("Tue, 01 Feb 2024 00:00:00 GMT").unwrap();
        assert_eq!(d.format("%Y-%m-%d").to_string(), "2024-02-01");
    }

    #[test]
    fn test_parse_tolerant_date_iso8601_with_z() {
        let d = parse_tolerant_date("2024-02-01T00:00:00Z").unwrap();
        assert_eq!(d.format("%Y-%m-%d").to_string(), "2024-02-01");
    }

    #[test]
    fn test_parse_tolerant_date_iso8601_fractional() {
        let d = parse_tolerant_date("2024-02-01T00:00:00.123").unwrap();
        assert_eq!(d.format("%Y-%m-%d").to_string(), "2024-02-01");
    }

    #[test]
    fn test_parse_tolerant_date_date_only() {
        let d = parse_tolerant_date("2024-02-01").unwrap();
        assert_eq!(d.format("%Y-%m-%d").to_string(), "2024-02-01");
    }

    #[test]
    fn test_sanitize_text_strips_tags_and_normalizes_whitespace() {
        let cleaned = sanitize_text("<p>Hello   <b>world</b>\n\n&amp; friends</p>");
        assert_eq!(cleaned, "Hello world & friends");
    }

    #[test]
    fn test_parse_feed_rss2() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Feed</title>
<item>
  <title>Critical CVE-2024-0001 patched</title>
  <link>https://example.com/a</link>
  <description>Summary text</description>
  <pubDate>Tue, 01 Feb 2024 00:00:00 GMT</pubDate>
</item>
</channel></rss>"#;
        let items = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://example.com/a");
    }

    #[test]
    fn test_parse_feed_atom() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Feed</title>
  <updated>2024-02-01T00:00:00Z</updated>
  <entry>
    <title>Entry title</title>
    <link href="https://example.com/b"/>
    <summary>Entry summary</summary>
    <updated>2024-02-01T00:00:00Z</updated>
    <id>urn:uuid:1</id>
  </entry>
</feed>"#;
        let items = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://example.com/b");
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        let result = parse_feed(b"not a feed");
        assert!(matches!(result, Err(ClientError::Malformed(_))));
    }
}
