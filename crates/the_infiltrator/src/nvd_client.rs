//! NVD JSON 2.0 paged client.
//!
//! Page size up to 2000; accepts `lastModStartDate`/`lastModEndDate` and
//! `cveId` filters; supports `hasKev` for KEV-only listing. Enforces a
//! per-process minimum inter-request delay derived from NVD's published
//! ceilings (~5 req/30s anonymous, ~50 req/30s with an API key) — a
//! distributed limiter (C8) is used on top of this when multiple workers
//! share the key (see `the_collective::memory::RateLimiter`).

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::ClientError;
use crate::retry::with_retry;
use the_normalizer::nvd::NvdCve;

const DEFAULT_BASE_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";
const MAX_RESULTS_PER_PAGE: u32 = 2000;

/// Query parameters for one NVD page fetch.
#[derive(Debug, Clone, Default)]
pub struct NvdQuery {
    pub start_index: u32,
    pub results_per_page: u32,
    pub last_mod_start_date: Option<DateTime<Utc>>,
    pub last_mod_end_date: Option<DateTime<Utc>>,
    pub cve_id: Option<String>,
    pub has_kev: bool,
}

impl NvdQuery {
    pub fn recent(days: i64) -> Self {
        let now = Utc::now();
        Self {
            start_index: 0,
            results_per_page: MAX_RESULTS_PER_PAGE,
            last_mod_start_date: Some(now - chrono::Duration::days(days)),
            last_mod_end_date: Some(now),
            cve_id: None,
            has_kev: false,
        }
    }

    pub fn single(cve_id: impl Into<String>) -> Self {
        Self {
            start_index: 0,
            results_per_page: 1,
            cve_id: Some(cve_id.into()),
            ..Default::default()
        }
    }
}

/// One page of NVD results: raw records, the cursor for the next page (if
/// any remain), and the total result count reported by the API.
pub struct NvdPage {
    pub records: Vec<NvdCve>,
    pub next_start_index: Option<u32>,
    pub total_results: u32,
}

#[derive(Debug, serde::Deserialize)]
struct NvdApiResponse {
    #[serde(rename = "totalResults")]
    total_results: u32,
    #[serde(rename = "resultsPerPage")]
    results_per_page: u32,
    #[serde(rename = "startIndex")]
    start_index: u32,
    vulnerabilities: Vec<NvdVulnWrapper>,
}

#[derive(Debug, serde::Deserialize)]
struct NvdVulnWrapper {
    cve: NvdCve,
}

pub struct NvdClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl NvdClient {
    pub fn new(api_key: Option<String>) -> Self {
        // ~5 req/30s anonymous -> 6s; ~50 req/30s with key -> 0.6s.
        let min_interval = if api_key.is_some() {
            Duration::from_millis(600)
        } else {
            Duration::from_secs(6)
        };

        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn throttle(&self) {
        let wait = {
            let mut last = self.last_request.lock().unwrap();
            let now = Instant::now();
            let wait = last
                .map(|t| self.min_interval.saturating_sub(now.duration_since(t)))
                .unwrap_or(Duration::ZERO);
            *last = Some(now + wait);
            wait
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Fetch one page, retrying transient failures per `retry::with_retry`.
    pub async fn fetch_page(&self, query: &NvdQuery) -> Result<NvdPage, ClientError> {
        with_retry(|| self.fetch_page_once(query)).await
    }

    async fn fetch_page_once(&self, query: &NvdQuery) -> Result<NvdPage, ClientError> {
        self.throttle().await;

        let mut req = self.http.get(&self.base_url).query(&[
            ("startIndex", query.start_index.to_string()),
            (
                "resultsPerPage",
                query
                    .results_per_page
                    .min(MAX_RESULTS_PER_PAGE)
                    .max(1)
                    .to_string(),
            ),
        ]);

        if let Some(cve_id) = &query.cve_id {
            req = req.query(&[("cveId", cve_id.as_str())]);
        }
        if let (Some(start), Some(end)) = (query.last_mod_start_date, query.last_mod_end_date) {
            req = req.query(&[
                ("lastModStartDate", start.to_rfc3339()),
                ("lastModEndDate", end.to_rfc3339()),
            ]);
        }
        if query.has_kev {
            req = req.query(&[("hasKev", "")]);
        }
        if let Some(key) = &self.api_key {
            req = req.header("apiKey", key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ClientError::Retryable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30));
            return Err(ClientError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(ClientError::Retryable(format!("HTTP {status}")));
        }
        if status.is_client_error() {
            return Err(ClientError::Permanent(format!("HTTP {status}")));
        }

        let body: NvdApiResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))?;

        let records = body.vulnerabilities.into_iter().map(|w| w.cve).collect();
        let next_start = body.start_index + body.results_per_page;
        let next_start_index = if next_start < body.total_results {
            Some(next_start)
        } else {
            None
        };

        Ok(NvdPage {
            records,
            next_start_index,
            total_results: body.total_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_page_parses_records_and_cursor() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "resultsPerPage": 1,
            "startIndex": 0,
            "totalResults": 2,
            "format": "NVD_CVE",
            "version": "2.0",
            "timestamp": "2024-01-01T00:00:00.000",
            "vulnerabilities": [{
                "cve": {
                    "id": "CVE-2024-0001",
                    "published": "2024-01-01T00:00:00.000",
                    "lastModified": "2024-01-02T00:00:00.000",
                    "descriptions": [{"lang": "en", "value": "desc"}]
                }
            }]
        });

        Mock::given(method("GET"))
            .and(query_param("startIndex", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = NvdClient::new(None).with_base_url(server.uri());
        let page = client
            .fetch_page(&NvdQuery {
                start_index: 0,
                results_per_page: 1,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, "CVE-2024-0001");
        assert_eq!(page.next_start_index, Some(1));
    }

    #[tokio::test]
    async fn test_rate_limited_response_surfaces_retry_hint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("Retry-After", "12"),
            )
            .mount(&server)
            .await;

        let client = NvdClient::new(None).with_base_url(server.uri());
        let result = client.fetch_page_once(&NvdQuery::recent(1)).await;
        match result {
            Err(ClientError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(12));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_permanent_4xx_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = NvdClient::new(None).with_base_url(server.uri());
        let result = client.fetch_page(&NvdQuery::recent(1)).await;
        assert!(matches!(result, Err(ClientError::Permanent(_))));
    }
}
