//! Handler functions for the read-side API (spec.md section 6.2). Each
//! operation here is a thin translation from an HTTP request onto
//! `the_archive`/`the_archive_query`, with validation at the boundary and a
//! memoized read where the cache layer (C8) applies.

use axum::extract::{OriginalUri, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use the_archive::{ArchiveStats, TimelineEntry};
use the_archive_query::{PagedResult, QueryFilters, SeverityCount, SortOrder, Suggestion, TimeRange, TrendingType, VendorCount};
use the_foundation::{NewsSource, Vulnerability};

use crate::error::{with_request_path, ApiError};
use crate::validation::{
    normalize_pagination, parse_cve_id, parse_days, parse_severity, parse_sort_field, parse_sort_order,
    validate_search_query,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let _ = &state;
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    severity: Option<String>,
    exploited: Option<bool>,
    sort_by: Option<String>,
    sort_order: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

/// `list_vulnerabilities(severity?, exploited?, sort_by, sort_order, page, page_size)`.
pub async fn list_vulnerabilities(
    uri: OriginalUri,
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<PagedResult<Vulnerability>>, ApiError> {
    with_request_path(uri, async move {
        let mut filters = QueryFilters::new();
        if let Some(ref s) = q.severity {
            parse_severity(s)?;
            filters = filters.severity(s.to_ascii_uppercase());
        }
        if let Some(e) = q.exploited {
            filters = filters.exploited(e);
        }

        let sort = match q.sort_by {
            Some(ref s) => parse_sort_field(s)?,
            None => the_archive_query::SortField::PublishedAt,
        };
        let order = match q.sort_order {
            Some(ref s) => parse_sort_order(s)?,
            None => SortOrder::Desc,
        };

        let (page, page_size) = normalize_pagination(q.page, q.page_size);
        let result = state
            .query
            .list_vulnerabilities(&filters, sort, order, page, page_size)
            .await?;
        Ok(Json(result))
    })
    .await
}

/// `get_vulnerability(cve_id)` - case-insensitive lookup, uppercase storage.
pub async fn get_vulnerability(
    uri: OriginalUri,
    State(state): State<AppState>,
    Path(cve_id): Path<String>,
) -> Result<Json<Vulnerability>, ApiError> {
    with_request_path(uri, async move {
        let cve_id = parse_cve_id(&cve_id)?;
        let found = state.archive.find_vulnerability(&cve_id).await?;
        found
            .map(Json)
            .ok_or_else(|| ApiError::not_found(format!("{cve_id} not found")))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<u32>,
    page_size: Option<u32>,
}

/// `list_exploited(page, page_size)`: `exploited=true`, sorted by
/// `priority_score` descending.
pub async fn list_exploited(
    uri: OriginalUri,
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<PagedResult<Vulnerability>>, ApiError> {
    with_request_path(uri, async move {
        let (page, page_size) = normalize_pagination(q.page, q.page_size);
        Ok(Json(state.query.list_exploited(page, page_size).await?))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    days: Option<u32>,
    page: Option<u32>,
    page_size: Option<u32>,
}

/// `list_recent(days in [1, 365], page, page_size)`.
pub async fn list_recent(
    uri: OriginalUri,
    State(state): State<AppState>,
    Query(q): Query<RecentQuery>,
) -> Result<Json<PagedResult<Vulnerability>>, ApiError> {
    with_request_path(uri, async move {
        let days = parse_days(q.days.unwrap_or(7))?;
        let (page, page_size) = normalize_pagination(q.page, q.page_size);
        Ok(Json(state.query.list_recent(days, page, page_size).await?))
    })
    .await
}

/// `list_by_vendor(vendor, ...)`.
pub async fn list_by_vendor(
    uri: OriginalUri,
    State(state): State<AppState>,
    Path(vendor): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Json<PagedResult<Vulnerability>>, ApiError> {
    with_request_path(uri, async move {
        let (page, page_size) = normalize_pagination(q.page, q.page_size);
        Ok(Json(state.query.list_by_vendor(&vendor, page, page_size).await?))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
    severity: Option<String>,
    exploited: Option<bool>,
    vendor: Option<String>,
    product: Option<String>,
    cwe: Option<String>,
    min_cvss: Option<f64>,
    max_cvss: Option<f64>,
    published_after: Option<chrono::DateTime<chrono::Utc>>,
    published_before: Option<chrono::DateTime<chrono::Utc>>,
    sort_by: Option<String>,
    sort_order: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

/// `search(q, severity?, exploited?, vendor?, product?, cwe?, min_cvss?,
/// max_cvss?, published_after?, published_before?, sort, page, page_size)`.
pub async fn search(
    uri: OriginalUri,
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<PagedResult<Vulnerability>>, ApiError> {
    with_request_path(uri, async move {
        validate_search_query(&q.q)?;

        let mut filters = QueryFilters::new();
        if let Some(ref s) = q.severity {
            parse_severity(s)?;
            filters = filters.severity(s.to_ascii_uppercase());
        }
        if let Some(e) = q.exploited {
            filters = filters.exploited(e);
        }
        if let Some(ref v) = q.vendor {
            filters = filters.vendor(v.clone());
        }
        if let Some(ref p) = q.product {
            filters = filters.product(p.clone());
        }
        if let Some(ref c) = q.cwe {
            filters = filters.cwe(c.clone());
        }
        if q.min_cvss.is_some() || q.max_cvss.is_some() {
            filters = filters.cvss_range(q.min_cvss, q.max_cvss);
        }
        if q.published_after.is_some() || q.published_before.is_some() {
            filters = filters.published_range(q.published_after, q.published_before);
        }

        let sort = match q.sort_by {
            Some(ref s) => parse_sort_field(s)?,
            None => the_archive_query::SortField::PriorityScore,
        };
        let order = match q.sort_order {
            Some(ref s) => parse_sort_order(s)?,
            None => SortOrder::Desc,
        };

        let (page, page_size) = normalize_pagination(q.page, q.page_size);
        let result = state
            .query
            .search_vulnerabilities(&q.q, &filters, sort, order, page, page_size)
            .await?;
        Ok(Json(result))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    q: String,
    limit: Option<u32>,
}

/// `suggest(q, limit)`: prefix/substring autocomplete over CVE id and title.
pub async fn suggest(
    uri: OriginalUri,
    State(state): State<AppState>,
    Query(q): Query<SuggestQuery>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    with_request_path(uri, async move {
        let len = q.q.chars().count();
        if !(1..=500).contains(&len) {
            return Err(ApiError::validation("q must be between 1 and 500 characters"));
        }
        let limit = q.limit.unwrap_or(10).clamp(1, 50);
        Ok(Json(state.query.suggest(&q.q, limit).await?))
    })
    .await
}

/// `stats()`: the dashboard aggregate, memoized for up to `ttl_seconds`
/// (spec.md section 4.8: `dashboard:stats`, TTL ~5 min).
pub async fn stats(
    uri: OriginalUri,
    State(state): State<AppState>,
) -> Result<Json<ArchiveStats>, ApiError> {
    with_request_path(uri, async move {
        if let Some(cached) = state.memory.get_dashboard_stats::<ArchiveStats>().await {
            return Ok(Json(cached));
        }

        let stats = state.archive.aggregate_stats().await?;
        state.memory.set_dashboard_stats(&stats).await;
        Ok(Json(stats))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    days: Option<u32>,
}

/// `timeline(days)`.
pub async fn timeline(
    uri: OriginalUri,
    State(state): State<AppState>,
    Query(q): Query<DaysQuery>,
) -> Result<Json<Vec<TimelineEntry>>, ApiError> {
    with_request_path(uri, async move {
        let days = parse_days(q.days.unwrap_or(30))?;
        Ok(Json(state.archive.timeline(days as i64).await?))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<u32>,
}

/// `top_vendors(limit)`.
pub async fn top_vendors(
    uri: OriginalUri,
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Vec<VendorCount>>, ApiError> {
    with_request_path(uri, async move {
        let limit = q.limit.unwrap_or(10).clamp(1, 100);
        Ok(Json(state.query.top_vendors(limit).await?))
    })
    .await
}

/// `severity_distribution()`.
pub async fn severity_distribution(
    uri: OriginalUri,
    State(state): State<AppState>,
) -> Result<Json<Vec<SeverityCount>>, ApiError> {
    with_request_path(uri, async move { Ok(Json(state.query.severity_distribution().await?)) }).await
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    time_range: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

/// `trending(type in {hot, top}, time_range in {today, this_week, this_month,
/// all_time}, page, page_size)`.
pub async fn trending(
    uri: OriginalUri,
    State(state): State<AppState>,
    Query(q): Query<TrendingQuery>,
) -> Result<Json<PagedResult<Vulnerability>>, ApiError> {
    with_request_path(uri, async move {
        let kind = match q.kind.as_deref().unwrap_or("hot") {
            "hot" => TrendingType::Hot,
            "top" => TrendingType::Top,
            other => return Err(ApiError::validation(format!("invalid trending type: {other}"))),
        };
        let time_range = match q.time_range.as_deref().unwrap_or("all_time") {
            "today" => TimeRange::Today,
            "this_week" => TimeRange::ThisWeek,
            "this_month" => TimeRange::ThisMonth,
            "all_time" => TimeRange::AllTime,
            other => return Err(ApiError::validation(format!("invalid time_range: {other}"))),
        };

        let (page, page_size) = normalize_pagination(q.page, q.page_size);
        Ok(Json(state.query.trending(kind, time_range, page, page_size).await?))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct ActiveOnlyQuery {
    active_only: Option<bool>,
}

/// `list_sources(active_only)` - the news-source side of the store, exposed
/// read-only alongside the vulnerability API.
pub async fn list_sources(
    uri: OriginalUri,
    State(state): State<AppState>,
    Query(q): Query<ActiveOnlyQuery>,
) -> Result<Json<Vec<NewsSource>>, ApiError> {
    with_request_path(uri, async move {
        Ok(Json(state.archive.list_sources(q.active_only.unwrap_or(false)).await?))
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct IngestionRunsQuery {
    limit: Option<i64>,
}

/// `list_ingestion_runs` — audit trail surface over `IngestionRun` (spec.md
/// section 3.2 / section 7: "background job failures are observable via the
/// ingestion-run records"). Not named explicitly among section 6.2's
/// operations but directly implied by it; see DESIGN.md.
pub async fn list_ingestion_runs(
    uri: OriginalUri,
    State(state): State<AppState>,
    Query(q): Query<IngestionRunsQuery>,
) -> Result<Json<Vec<the_foundation::IngestionRun>>, ApiError> {
    with_request_path(uri, async move {
        let limit = q.limit.unwrap_or(50).clamp(1, 500);
        Ok(Json(state.archive.list_ingestion_runs(limit).await?))
    })
    .await
}

/// `get_ingestion_run(id)` — single audit record by id.
pub async fn get_ingestion_run(
    uri: OriginalUri,
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<the_foundation::IngestionRun>, ApiError> {
    with_request_path(uri, async move {
        state
            .archive
            .find_ingestion_run(id)
            .await?
            .map(Json)
            .ok_or_else(|| ApiError::not_found(format!("ingestion run {id} not found")))
    })
    .await
}
