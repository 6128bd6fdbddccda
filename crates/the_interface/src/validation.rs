//! Input validation for the read-side API (spec.md section 6.2): closed
//! enumerations for severity/sort field/sort order, CVE id shape, and the
//! free-text search query's length and character constraints.

use the_archive_query::{SortField, SortOrder};
use the_foundation::Severity;

use crate::error::ApiError;

pub fn parse_severity(raw: &str) -> Result<Severity, ApiError> {
    raw.parse::<Severity>()
        .map_err(|_| ApiError::validation(format!("invalid severity: {raw}")))
}

pub fn parse_sort_field(raw: &str) -> Result<SortField, ApiError> {
    match raw {
        "cve_id" => Ok(SortField::CveId),
        "severity" => Ok(SortField::Severity),
        "cvss_score" => Ok(SortField::CvssScore),
        "published_at" => Ok(SortField::PublishedAt),
        "priority_score" => Ok(SortField::PriorityScore),
        "updated_at" => Ok(SortField::UpdatedAt),
        other => Err(ApiError::validation(format!("invalid sort_by: {other}"))),
    }
}

pub fn parse_sort_order(raw: &str) -> Result<SortOrder, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "asc" => Ok(SortOrder::Asc),
        "desc" => Ok(SortOrder::Desc),
        other => Err(ApiError::validation(format!("invalid sort_order: {other}"))),
    }
}

/// `cve_id` is validated and case-normalized to upper, matching
/// `CVE-YYYY-N{4,}` (spec.md section 6.2).
pub fn parse_cve_id(raw: &str) -> Result<String, ApiError> {
    the_normalizer::cve_id::normalize(raw)
        .ok_or_else(|| ApiError::validation(format!("malformed cve_id: {raw}")))
}

/// `days in [1, 365]`.
pub fn parse_days(raw: u32) -> Result<u32, ApiError> {
    if (1..=365).contains(&raw) {
        Ok(raw)
    } else {
        Err(ApiError::validation("days must be in [1, 365]"))
    }
}

/// `q` length in `[2, 500]`; rejects characters used to break out of a SQL
/// literal context. Queries are bound as parameters regardless (no string
/// concatenation reaches the database), but the boundary still rejects
/// these per spec.md section 6.2 - defense in depth against a future
/// regression in the query layer.
pub fn validate_search_query(q: &str) -> Result<(), ApiError> {
    let len = q.chars().count();
    if !(2..=500).contains(&len) {
        return Err(ApiError::validation("q must be between 2 and 500 characters"));
    }

    const FORBIDDEN: &[&str] = &[";", "--", "/*", "*/", "\0"];
    if FORBIDDEN.iter().any(|bad| q.contains(bad)) {
        return Err(ApiError::validation("q contains disallowed characters"));
    }

    Ok(())
}

/// Clamp an untrusted page/page_size pair to sane bounds.
pub fn normalize_pagination(page: Option<u32>, page_size: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(20).clamp(1, 100);
    (page, page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_severity_rejects_unknown_token() {
        assert!(parse_severity("CRIT").is_err());
        assert!(parse_severity("critical").is_ok());
    }

    #[test]
    fn test_parse_cve_id_normalizes_case() {
        assert_eq!(parse_cve_id("cve-2024-0001").unwrap(), "CVE-2024-0001");
    }

    #[test]
    fn test_parse_cve_id_rejects_malformed() {
        assert!(parse_cve_id("not-a-cve").is_err());
    }

    #[test]
    fn test_validate_search_query_length_bounds() {
        assert!(validate_search_query("a").is_err());
        assert!(validate_search_query(&"a".repeat(501)).is_err());
        assert!(validate_search_query("log4j").is_ok());
    }

    #[test]
    fn test_validate_search_query_rejects_sql_comment() {
        assert!(validate_search_query("foo'; DROP TABLE x; --").is_err());
    }

    #[test]
    fn test_normalize_pagination_clamps_page_size() {
        assert_eq!(normalize_pagination(None, Some(10_000)), (1, 100));
        assert_eq!(normalize_pagination(Some(0), None), (1, 20));
    }

    #[test]
    fn test_parse_days_bounds() {
        assert!(parse_days(0).is_err());
        assert!(parse_days(366).is_err());
        assert!(parse_days(7).is_ok());
    }
}
