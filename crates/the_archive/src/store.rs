//! Durable persistence operations (C7) that don't belong to a dedicated
//! module: vulnerability upsert/lookup, stats aggregation, and the
//! publication timeline. Filtered/paginated listing and full-text search
//! live in `the_archive_query`, which drives these tables through
//! [`crate::TheArchive::pool`] directly.

use chrono::{DateTime, Utc};
use sqlx::Row;
use the_foundation::{CryptexError, CryptexResult, Severity, Vulnerability};

use crate::merge::{merge, MergeOutcome};
use crate::schema::{VulnerabilityBinds, VulnerabilityRow};
use crate::TheArchive;

/// Counts behind `aggregate_stats()`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArchiveStats {
    pub total: i64,
    pub exploited: i64,
    pub by_severity: Vec<(String, i64)>,
    pub recent_7d: i64,
    pub last_update: Option<DateTime<Utc>>,
}

/// One bucket of `timeline(days)`: a publication date and its count.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TimelineEntry {
    pub date: chrono::NaiveDate,
    pub count: i64,
}

impl TheArchive {
    /// Merge `incoming` into whatever row exists for its `cve_id`, inside a
    /// `SELECT ... FOR UPDATE` transaction so concurrent merges of the same
    /// CVE serialize.
    pub async fn upsert_vulnerability(
        &self,
        incoming: Vulnerability,
        now: DateTime<Utc>,
    ) -> CryptexResult<(Vulnerability, MergeOutcome)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        let existing_row: Option<VulnerabilityRow> = sqlx::query_as(
            r#"SELECT * FROM vulnerabilities WHERE cve_id = $1 FOR UPDATE"#,
        )
        .bind(&incoming.cve_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        let existing = existing_row.map(Vulnerability::from);
        let (merged, outcome) = merge(existing, incoming, now);
        let binds = VulnerabilityBinds::from(&merged);

        sqlx::query(
            r#"
            INSERT INTO vulnerabilities (
                cve_id, title, description, cvss_score, cvss_vector, severity,
                published_at, modified_at, exploited_in_the_wild, cisa_due_date,
                cwe_ids, vendors, products, affected_products, refs,
                sources, source_tags, priority_score,
                simple_title, simple_description, llm_processed, llm_processed_at,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            ON CONFLICT (cve_id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                cvss_score = EXCLUDED.cvss_score,
                cvss_vector = EXCLUDED.cvss_vector,
                severity = EXCLUDED.severity,
                published_at = EXCLUDED.published_at,
                modified_at = EXCLUDED.modified_at,
                exploited_in_the_wild = EXCLUDED.exploited_in_the_wild,
                cisa_due_date = EXCLUDED.cisa_due_date,
                cwe_ids = EXCLUDED.cwe_ids,
                vendors = EXCLUDED.vendors,
                products = EXCLUDED.products,
                affected_products = EXCLUDED.affected_products,
                refs = EXCLUDED.refs,
                sources = EXCLUDED.sources,
                source_tags = EXCLUDED.source_tags,
                priority_score = EXCLUDED.priority_score,
                simple_title = EXCLUDED.simple_title,
                simple_description = EXCLUDED.simple_description,
                llm_processed = EXCLUDED.llm_processed,
                llm_processed_at = EXCLUDED.llm_processed_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&binds.cve_id)
        .bind(&binds.title)
        .bind(&binds.description)
        .bind(binds.cvss_score)
        .bind(&binds.cvss_vector)
        .bind(&binds.severity)
        .bind(binds.published_at)
        .bind(binds.modified_at)
        .bind(binds.exploited_in_the_wild)
        .bind(binds.cisa_due_date)
        .bind(&binds.cwe_ids)
        .bind(&binds.vendors)
        .bind(&binds.products)
        .bind(&binds.affected_products)
        .bind(&binds.refs)
        .bind(&binds.sources)
        .bind(&binds.source_tags)
        .bind(binds.priority_score)
        .bind(&binds.simple_title)
        .bind(&binds.simple_description)
        .bind(binds.llm_processed)
        .bind(binds.llm_processed_at)
        .bind(binds.created_at)
        .bind(binds.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok((merged, outcome))
    }

    pub async fn find_vulnerability(&self, cve_id: &str) -> CryptexResult<Option<Vulnerability>> {
        let row: Option<VulnerabilityRow> =
            sqlx::query_as(r#"SELECT * FROM vulnerabilities WHERE cve_id = $1"#)
                .bind(cve_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(row.map(Vulnerability::from))
    }

    /// Write back only the enrichment fields, inside the same
    /// `FOR UPDATE` discipline as `upsert_vulnerability`, so a concurrent
    /// merge can't clobber the enrichment write or vice versa.
    pub async fn record_enrichment(
        &self,
        cve_id: &str,
        simple_title: Option<String>,
        simple_description: Option<String>,
        now: DateTime<Utc>,
    ) -> CryptexResult<()> {
        sqlx::query(
            r#"
            UPDATE vulnerabilities
            SET simple_title = $2, simple_description = $3,
                llm_processed = TRUE, llm_processed_at = $4, updated_at = $4
            WHERE cve_id = $1
            "#,
        )
        .bind(cve_id)
        .bind(simple_title)
        .bind(simple_description)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(())
    }

    /// Single batched query behind `aggregate_stats()`: total count,
    /// exploited count, per-severity breakdown, 7-day recency count, and the
    /// most recent `updated_at` across the table.
    pub async fn aggregate_stats(&self) -> CryptexResult<ArchiveStats> {
        let totals = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE exploited_in_the_wild) AS exploited,
                COUNT(*) FILTER (WHERE published_at >= now() - interval '7 days') AS recent_7d,
                MAX(updated_at) AS last_update
            FROM vulnerabilities
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        let by_severity_rows = sqlx::query(
            r#"SELECT severity, COUNT(*) AS n FROM vulnerabilities GROUP BY severity"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        let by_severity = by_severity_rows
            .iter()
            .map(|row| {
                let severity: String = row.get("severity");
                let n: i64 = row.get("n");
                (severity, n)
            })
            .collect();

        Ok(ArchiveStats {
            total: totals.get("total"),
            exploited: totals.get("exploited"),
            by_severity,
            recent_7d: totals.get("recent_7d"),
            last_update: totals.get("last_update"),
        })
    }

    /// `timeline(days)`: publication counts grouped by date, most
    /// recent first, over the trailing `days` window.
    pub async fn timeline(&self, days: i64) -> CryptexResult<Vec<TimelineEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT published_at::date AS day, COUNT(*) AS n
            FROM vulnerabilities
            WHERE published_at >= now() - ($1 || ' days')::interval
            GROUP BY day
            ORDER BY day DESC
            "#,
        )
        .bind(days.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| TimelineEntry {
                date: row.get("day"),
                count: row.get("n"),
            })
            .collect())
    }

    /// Vulnerabilities the Enrichment Queue considers unprocessed, ordered
    /// by `priority_score` descending and capped to `batch_size`.
    /// Tier selection (high/medium/low) is applied by the caller over this
    /// superset, since it depends on wall-clock "now" the Store shouldn't
    /// own.
    pub async fn list_unprocessed(&self, batch_size: i64) -> CryptexResult<Vec<Vulnerability>> {
        let rows: Vec<VulnerabilityRow> = sqlx::query_as(
            r#"
            SELECT * FROM vulnerabilities
            WHERE NOT llm_processed
            ORDER BY priority_score DESC
            LIMIT $1
            "#,
        )
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CryptexError::storage_transient(e.to_string()))?;

        Ok(rows.into_iter().map(Vulnerability::from).collect())
    }
}

/// Used by callers that already hold a `Severity` and want the textual
/// column value without depending on `schema`'s private helpers.
pub fn severity_column_value(s: Severity) -> String {
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_column_value_matches_display() {
        assert_eq!(severity_column_value(Severity::Critical), "CRITICAL");
    }
}
