//! Row shapes for `sqlx::query_as`, and the conversions between them and the
//! canonical [`the_foundation`] models.
//!
//! Kept as a distinct module from `merge.rs`/`store.rs` because every query
//! site needs the same row shape; the conversions are the only place a
//! `BTreeSet<String>` becomes a `Vec<String>` (Postgres has no set type) and
//! back.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use the_foundation::{
    Article, IngestionRun, IngestionRunStatus, NewsSource, Reference, Severity, SourceTag,
    SourceTagPayload, Vulnerability,
};

#[derive(Debug, FromRow)]
pub struct VulnerabilityRow {
    pub cve_id: String,
    pub title: Option<String>,
    pub description: Option<String>,

    pub cvss_score: Option<f64>,
    pub cvss_vector: Option<String>,
    pub severity: String,

    pub published_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,

    pub exploited_in_the_wild: bool,
    pub cisa_due_date: Option<NaiveDate>,

    pub cwe_ids: Vec<String>,
    pub vendors: Vec<String>,
    pub products: Vec<String>,
    pub affected_products: Vec<String>,
    pub refs: Json<Vec<Reference>>,

    pub sources: Vec<String>,
    pub source_tags: Json<Vec<SourceTagPayload>>,

    pub priority_score: f64,

    pub simple_title: Option<String>,
    pub simple_description: Option<String>,
    pub llm_processed: bool,
    pub llm_processed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VulnerabilityRow> for Vulnerability {
    fn from(row: VulnerabilityRow) -> Self {
        Vulnerability {
            cve_id: row.cve_id,
            title: row.title,
            description: row.description,
            cvss_score: row.cvss_score,
            cvss_vector: row.cvss_vector,
            severity: row.severity.parse().unwrap_or(Severity::Unknown),
            published_at: row.published_at,
            modified_at: row.modified_at,
            exploited_in_the_wild: row.exploited_in_the_wild,
            cisa_due_date: row.cisa_due_date,
            cwe_ids: row.cwe_ids.into_iter().collect(),
            vendors: row.vendors.into_iter().collect(),
            products: row.products.into_iter().collect(),
            affected_products: row.affected_products.into_iter().collect(),
            references: row.refs.0,
            sources: row.sources.into_iter().map(SourceTag).collect(),
            source_tags: row.source_tags.0,
            priority_score: row.priority_score,
            simple_title: row.simple_title,
            simple_description: row.simple_description,
            llm_processed: row.llm_processed,
            llm_processed_at: row.llm_processed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Borrowed bind-parameter view of a [`Vulnerability`] for INSERT/UPDATE.
/// Exists because `.bind()` calls need owned/ref values with a lifetime
/// tied to the query builder, and the domain type's `BTreeSet`s must be
/// flattened to `Vec`s first.
pub struct VulnerabilityBinds {
    pub cve_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub cvss_score: Option<f64>,
    pub cvss_vector: Option<String>,
    pub severity: String,
    pub published_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub exploited_in_the_wild: bool,
    pub cisa_due_date: Option<NaiveDate>,
    pub cwe_ids: Vec<String>,
    pub vendors: Vec<String>,
    pub products: Vec<String>,
    pub affected_products: Vec<String>,
    pub refs: Json<Vec<Reference>>,
    pub sources: Vec<String>,
    pub source_tags: Json<Vec<SourceTagPayload>>,
    pub priority_score: f64,
    pub simple_title: Option<String>,
    pub simple_description: Option<String>,
    pub llm_processed: bool,
    pub llm_processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Vulnerability> for VulnerabilityBinds {
    fn from(v: &Vulnerability) -> Self {
        VulnerabilityBinds {
            cve_id: v.cve_id.clone(),
            title: v.title.clone(),
            description: v.description.clone(),
            cvss_score: v.cvss_score,
            cvss_vector: v.cvss_vector.clone(),
            severity: v.severity.to_string(),
            published_at: v.published_at,
            modified_at: v.modified_at,
            exploited_in_the_wild: v.exploited_in_the_wild,
            cisa_due_date: v.cisa_due_date,
            cwe_ids: v.cwe_ids.iter().cloned().collect(),
            vendors: v.vendors.iter().cloned().collect(),
            products: v.products.iter().cloned().collect(),
            affected_products: v.affected_products.iter().cloned().collect(),
            refs: Json(v.references.clone()),
            sources: v.sources.iter().map(|s| s.0.clone()).collect(),
            source_tags: Json(v.source_tags.clone()),
            priority_score: v.priority_score,
            simple_title: v.simple_title.clone(),
            simple_description: v.simple_description.clone(),
            llm_processed: v.llm_processed,
            llm_processed_at: v.llm_processed_at,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

pub(crate) fn dedup_sorted(mut v: Vec<String>) -> Vec<String> {
    let set: BTreeSet<String> = v.drain(..).collect();
    set.into_iter().collect()
}

#[derive(Debug, FromRow)]
pub struct IngestionRunRow {
    pub id: Uuid,
    pub source: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_fetched: i64,
    pub records_inserted: i64,
    pub records_updated: i64,
    pub records_failed: i64,
    pub error_message: Option<String>,
    pub run_config: Json<serde_json::Value>,
}

impl From<IngestionRunRow> for IngestionRun {
    fn from(row: IngestionRunRow) -> Self {
        IngestionRun {
            id: row.id,
            source: SourceTag(row.source),
            status: match row.status.as_str() {
                "running" => IngestionRunStatus::Running,
                "success" => IngestionRunStatus::Success,
                _ => IngestionRunStatus::Failed,
            },
            started_at: row.started_at,
            completed_at: row.completed_at,
            records_fetched: row.records_fetched.max(0) as u64,
            records_inserted: row.records_inserted.max(0) as u64,
            records_updated: row.records_updated.max(0) as u64,
            records_failed: row.records_failed.max(0) as u64,
            error_message: row.error_message,
            run_config: row.run_config.0,
        }
    }
}

pub(crate) fn ingestion_status_str(status: IngestionRunStatus) -> &'static str {
    match status {
        IngestionRunStatus::Running => "running",
        IngestionRunStatus::Success => "success",
        IngestionRunStatus::Failed => "failed",
    }
}

#[derive(Debug, FromRow)]
pub struct NewsSourceRow {
    pub id: Uuid,
    pub name: String,
    pub feed_url: String,
    pub active: bool,
    pub fetch_interval_seconds: i64,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_fetch_status: Option<String>,
    pub last_fetch_error: Option<String>,
    pub total_articles: i64,
}

impl From<NewsSourceRow> for NewsSource {
    fn from(row: NewsSourceRow) -> Self {
        NewsSource {
            id: row.id,
            name: row.name,
            feed_url: row.feed_url,
            active: row.active,
            fetch_interval_seconds: row.fetch_interval_seconds.max(0) as u64,
            last_fetched_at: row.last_fetched_at,
            last_fetch_status: row.last_fetch_status,
            last_fetch_error: row.last_fetch_error,
            total_articles: row.total_articles.max(0) as u64,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ArticleRow {
    pub source_id: Uuid,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub categories: Vec<String>,
    pub related_cves: Vec<String>,
    pub llm_summary: Option<String>,
    pub llm_key_points: Option<Vec<String>>,
    pub llm_relevance: Option<f64>,
    pub llm_processed: bool,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            source_id: row.source_id,
            title: row.title,
            url: row.url,
            author: row.author,
            summary: row.summary,
            published_at: row.published_at,
            fetched_at: row.fetched_at,
            categories: row.categories,
            related_cves: row.related_cves.into_iter().collect(),
            llm_summary: row.llm_summary,
            llm_key_points: row.llm_key_points,
            llm_relevance: row.llm_relevance,
            llm_processed: row.llm_processed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_sorted_removes_duplicates_and_sorts() {
        let v = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedup_sorted(v), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_ingestion_status_round_trip() {
        assert_eq!(ingestion_status_str(IngestionRunStatus::Running), "running");
        assert_eq!(ingestion_status_str(IngestionRunStatus::Success), "success");
        assert_eq!(ingestion_status_str(IngestionRunStatus::Failed), "failed");
    }
}
