//! # The Archive Query - Filtered Listing, Search, and Trending (C7)
//!
//! Everything the read API (`the_interface`) needs that isn't a direct
//! key lookup or a batched stats query: paginated filtered listing,
//! trigram full-text search, autocomplete suggestion, vendor/severity
//! rollups, and the trending feed.
//!
//! Split out from `the_archive` because these queries build dynamic SQL
//! (filter predicates fold onto a base query) rather than the fixed
//! statements `the_archive::store` issues; both share the same pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder, Row};
use std::sync::Arc;

use the_archive::schema::VulnerabilityRow;
use the_archive::TheArchive;
use the_foundation::{CryptexError, CryptexResult, Vulnerability};

/// Sort direction for `list_vulnerabilities`/`search_vulnerabilities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Closed enumeration of sortable columns ("sort fields from a closed
/// enumeration").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CveId,
    Severity,
    CvssScore,
    PublishedAt,
    PriorityScore,
    UpdatedAt,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            SortField::CveId => "cve_id",
            SortField::Severity => "severity",
            SortField::CvssScore => "cvss_score",
            SortField::PublishedAt => "published_at",
            SortField::PriorityScore => "priority_score",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

/// Predicate set for `list_vulnerabilities`/`search_vulnerabilities`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilters {
    pub severity: Option<String>,
    pub exploited: Option<bool>,
    pub vendor: Option<String>,
    pub product: Option<String>,
    pub cwe: Option<String>,
    pub min_cvss: Option<f64>,
    pub max_cvss: Option<f64>,
    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
}

impl QueryFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn exploited(mut self, exploited: bool) -> Self {
        self.exploited = Some(exploited);
        self
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn cwe(mut self, cwe: impl Into<String>) -> Self {
        self.cwe = Some(cwe.into());
        self
    }

    pub fn cvss_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_cvss = min;
        self.max_cvss = max;
        self
    }

    pub fn published_range(
        mut self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        self.published_after = after;
        self.published_before = before;
        self
    }

    /// Append `AND <predicate>` clauses for every filter that is set. The
    /// base query must already have a `WHERE 1=1` (or equivalent) so every
    /// branch can unconditionally prefix `AND`.
    fn push_predicates<'a>(&'a self, qb: &mut QueryBuilder<'a, sqlx::Postgres>) {
        if let Some(ref severity) = self.severity {
            qb.push(" AND severity = ").push_bind(severity.to_ascii_uppercase());
        }
        if let Some(exploited) = self.exploited {
            qb.push(" AND exploited_in_the_wild = ").push_bind(exploited);
        }
        if let Some(ref vendor) = self.vendor {
            qb.push(" AND EXISTS (SELECT 1 FROM unnest(vendors) v WHERE v ILIKE ")
                .push_bind(format!("%{vendor}%"))
                .push(")");
        }
        if let Some(ref product) = self.product {
            qb.push(" AND EXISTS (SELECT 1 FROM unnest(products) p WHERE p ILIKE ")
                .push_bind(format!("%{product}%"))
                .push(")");
        }
        if let Some(ref cwe) = self.cwe {
            qb.push(" AND ").push_bind(cwe.to_ascii_uppercase()).push(" = ANY(cwe_ids)");
        }
        if let Some(min_cvss) = self.min_cvss {
            qb.push(" AND cvss_score >= ").push_bind(min_cvss);
        }
        if let Some(max_cvss) = self.max_cvss {
            qb.push(" AND cvss_score <= ").push_bind(max_cvss);
        }
        if let Some(after) = self.published_after {
            qb.push(" AND published_at >= ").push_bind(after);
        }
        if let Some(before) = self.published_before {
            qb.push(" AND published_at <= ").push_bind(before);
        }
    }
}

/// `{total, page, page_size, total_pages, items}` envelope every paginated
/// read-API operation returns.
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> PagedResult<T> {
    fn new(items: Vec<T>, total: i64, page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            ((total as u64 + page_size as u64 - 1) / page_size as u64).max(if total == 0 { 0 } else { 1 }) as u32
        };
        Self { items, total, page, page_size, total_pages }
    }
}

/// One entry of `top_vendors(limit)`.
#[derive(Debug, Clone, Serialize)]
pub struct VendorCount {
    pub vendor: String,
    pub count: i64,
}

/// One entry of `severity_distribution()`.
#[derive(Debug, Clone, Serialize)]
pub struct SeverityCount {
    pub severity: String,
    pub count: i64,
}

/// A single `suggest(q, limit)` hit.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub cve_id: String,
    pub title: Option<String>,
}

/// `trending(type, time_range)`'s selector. `hot` decays a score by
/// age; `top` is a flat ordering. With no votes collaborator present, the
/// underlying "score" is `priority_score * 100` (Open Question #2 in
/// DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendingType {
    Hot,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Today,
    ThisWeek,
    ThisMonth,
    AllTime,
}

impl TimeRange {
    fn window_days(self) -> Option<i64> {
        match self {
            TimeRange::Today => Some(1),
            TimeRange::ThisWeek => Some(7),
            TimeRange::ThisMonth => Some(30),
            TimeRange::AllTime => None,
        }
    }
}

/// The query-side companion to [`the_archive::TheArchive`], sharing its pool.
pub struct ArchiveQuery {
    pool: PgPool,
    archive: Arc<TheArchive>,
}

impl ArchiveQuery {
    pub fn new(archive: Arc<TheArchive>) -> Self {
        let pool = archive.pool().clone();
        Self { pool, archive }
    }

    /// `list_vulnerabilities(filters, sort, page, page_size)`.
    pub async fn list_vulnerabilities(
        &self,
        filters: &QueryFilters,
        sort: SortField,
        order: SortOrder,
        page: u32,
        page_size: u32,
    ) -> CryptexResult<PagedResult<Vulnerability>> {
        let page = page.max(1);
        let offset = ((page - 1) as i64) * page_size as i64;

        let mut count_qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM vulnerabilities WHERE 1=1");
        filters.push_predicates(&mut count_qb);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT * FROM vulnerabilities WHERE 1=1");
        filters.push_predicates(&mut qb);
        qb.push(" ORDER BY ")
            .push(sort.column())
            .push(match order {
                SortOrder::Asc => " ASC",
                SortOrder::Desc => " DESC",
            })
            .push(" LIMIT ")
            .push_bind(page_size as i64)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<VulnerabilityRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        let items = rows.into_iter().map(Vulnerability::from).collect();
        Ok(PagedResult::new(items, total, page, page_size))
    }

    /// `list_exploited(page, page_size)`: `exploited=true`, sorted by
    /// `priority_score` descending.
    pub async fn list_exploited(&self, page: u32, page_size: u32) -> CryptexResult<PagedResult<Vulnerability>> {
        let filters = QueryFilters::new().exploited(true);
        self.list_vulnerabilities(&filters, SortField::PriorityScore, SortOrder::Desc, page, page_size)
            .await
    }

    /// `list_recent(days, page, page_size)`.
    pub async fn list_recent(&self, days: u32, page: u32, page_size: u32) -> CryptexResult<PagedResult<Vulnerability>> {
        let after = Utc::now() - chrono::Duration::days(days as i64);
        let filters = QueryFilters::new().published_range(Some(after), None);
        self.list_vulnerabilities(&filters, SortField::PublishedAt, SortOrder::Desc, page, page_size)
            .await
    }

    /// `list_by_vendor(vendor, ...)`.
    pub async fn list_by_vendor(&self, vendor: &str, page: u32, page_size: u32) -> CryptexResult<PagedResult<Vulnerability>> {
        let filters = QueryFilters::new().vendor(vendor);
        self.list_vulnerabilities(&filters, SortField::PriorityScore, SortOrder::Desc, page, page_size)
            .await
    }

    /// `search(q, ...)`: free-text over `cve_id`/`title`/`description`
    /// using the `pg_trgm` similarity operator, `q` pre-validated by the
    /// caller to `[2, 500]` chars.
    pub async fn search_vulnerabilities(
        &self,
        query: &str,
        filters: &QueryFilters,
        sort: SortField,
        order: SortOrder,
        page: u32,
        page_size: u32,
    ) -> CryptexResult<PagedResult<Vulnerability>> {
        let page = page.max(1);
        let offset = ((page - 1) as i64) * page_size as i64;
        let pattern = format!("%{query}%");

        let mut count_qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM vulnerabilities WHERE (cve_id ILIKE ",
        );
        count_qb.push_bind(pattern.clone());
        count_qb
            .push(" OR title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR similarity(title, ")
            .push_bind(query.to_string())
            .push(") > 0.2)");
        filters.push_predicates(&mut count_qb);

        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT * FROM vulnerabilities WHERE (cve_id ILIKE ",
        );
        qb.push_bind(pattern.clone());
        qb.push(" OR title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(" OR similarity(title, ")
            .push_bind(query.to_string())
            .push(") > 0.2)");
        filters.push_predicates(&mut qb);
        qb.push(" ORDER BY ")
            .push(sort.column())
            .push(match order {
                SortOrder::Asc => " ASC",
                SortOrder::Desc => " DESC",
            })
            .push(" LIMIT ")
            .push_bind(page_size as i64)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<VulnerabilityRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        let items = rows.into_iter().map(Vulnerability::from).collect();
        Ok(PagedResult::new(items, total, page, page_size))
    }

    /// `suggest(q, limit)`: prefix/substring autocomplete over CVE id
    /// and title.
    pub async fn suggest(&self, query: &str, limit: u32) -> CryptexResult<Vec<Suggestion>> {
        let pattern = format!("%{query}%");
        let rows = sqlx::query(
            r#"
            SELECT cve_id, title FROM vulnerabilities
            WHERE cve_id ILIKE $1 OR title ILIKE $1
            ORDER BY priority_score DESC
            LIMIT $2
            "#,
        )
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| Suggestion {
                cve_id: row.get("cve_id"),
                title: row.get("title"),
            })
            .collect())
    }

    /// `top_vendors(limit)`: most frequently affected vendors.
    pub async fn top_vendors(&self, limit: u32) -> CryptexResult<Vec<VendorCount>> {
        let rows = sqlx::query(
            r#"
            SELECT v AS vendor, COUNT(*) AS n
            FROM vulnerabilities, unnest(vendors) AS v
            GROUP BY v
            ORDER BY n DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| VendorCount { vendor: row.get("vendor"), count: row.get("n") })
            .collect())
    }

    /// `severity_distribution()`.
    pub async fn severity_distribution(&self) -> CryptexResult<Vec<SeverityCount>> {
        let rows = sqlx::query(
            r#"SELECT severity, COUNT(*) AS n FROM vulnerabilities GROUP BY severity ORDER BY n DESC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| SeverityCount { severity: row.get("severity"), count: row.get("n") })
            .collect())
    }

    /// `trending(type, time_range, page, page_size)`. No votes
    /// collaborator is in scope, so the underlying score is
    /// `priority_score * 100`; `hot` applies the decay
    /// `score / (age_hours + 2)^1.5` chosen in DESIGN.md's Open Question #2,
    /// `top` is a flat ordering by that same score within the time window.
    pub async fn trending(
        &self,
        kind: TrendingType,
        time_range: TimeRange,
        page: u32,
        page_size: u32,
    ) -> CryptexResult<PagedResult<Vulnerability>> {
        let page = page.max(1);
        let offset = ((page - 1) as i64) * page_size as i64;

        let mut base: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT *, priority_score * 100 AS vote_score FROM vulnerabilities WHERE 1=1");
        if let Some(days) = time_range.window_days() {
            let since = Utc::now() - chrono::Duration::days(days);
            base.push(" AND published_at >= ").push_bind(since);
        }

        let order_expr = match kind {
            TrendingType::Top => "priority_score".to_string(),
            TrendingType::Hot => {
                "(priority_score * 100) / pow(GREATEST(EXTRACT(EPOCH FROM (now() - COALESCE(published_at, created_at))) / 3600.0, 0) + 2, 1.5)".to_string()
            }
        };

        let mut count_qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM vulnerabilities WHERE 1=1");
        if let Some(days) = time_range.window_days() {
            let since = Utc::now() - chrono::Duration::days(days);
            count_qb.push(" AND published_at >= ").push_bind(since);
        }
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        base.push(" ORDER BY ")
            .push(order_expr)
            .push(" DESC LIMIT ")
            .push_bind(page_size as i64)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<VulnerabilityRow> = base
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        let items = rows.into_iter().map(Vulnerability::from).collect();
        Ok(PagedResult::new(items, total, page, page_size))
    }

    pub fn archive(&self) -> &Arc<TheArchive> {
        &self.archive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paged_result_total_pages() {
        let r: PagedResult<()> = PagedResult::new(vec![], 101, 1, 20);
        assert_eq!(r.total_pages, 6);
    }

    #[test]
    fn test_paged_result_empty() {
        let r: PagedResult<()> = PagedResult::new(vec![], 0, 1, 20);
        assert_eq!(r.total_pages, 0);
    }

    #[test]
    fn test_sort_field_columns_are_known_identifiers() {
        for f in [
            SortField::CveId,
            SortField::Severity,
            SortField::CvssScore,
            SortField::PublishedAt,
            SortField::PriorityScore,
            SortField::UpdatedAt,
        ] {
            assert!(!f.column().contains(' '));
        }
    }

    #[test]
    fn test_time_range_windows() {
        assert_eq!(TimeRange::Today.window_days(), Some(1));
        assert_eq!(TimeRange::AllTime.window_days(), None);
    }
}
