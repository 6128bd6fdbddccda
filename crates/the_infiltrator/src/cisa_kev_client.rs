//! CISA KEV client: a single JSON document, periodic full-refresh semantics
//! (not incremental).

use crate::error::ClientError;
use crate::retry::with_retry;
use the_normalizer::cisa_kev::CisaKevCatalog;

const DEFAULT_KEV_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";

pub struct CisaKevClient {
    http: reqwest::Client,
    url: String,
}

impl CisaKevClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            url: DEFAULT_KEV_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Fetch the whole catalog. Retries transient failures; the caller
    /// merges every entry, which is a full refresh each time.
    pub async fn fetch_all(&self) -> Result<CisaKevCatalog, ClientError> {
        with_retry(|| self.fetch_once()).await
    }

    async fn fetch_once(&self) -> Result<CisaKevCatalog, ClientError> {
        let response = self
            .http
            .get(&self.url)
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

        response
            .json::<CisaKevCatalog>()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))
    }
}

impl Default for CisaKevClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_all_parses_catalog() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "vulnerabilities": [{
                "cveID": "CVE-2024-0001",
                "vulnerabilityName": "Widget RCE",
                "shortDescription": "desc",
                "dateAdded": "2024-01-01",
                "dueDate": "2024-02-01",
                "cwes": ["CWE-94"],
                "notes": ""
            }]
        });

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = CisaKevClient::new().with_url(server.uri());
        let catalog = client.fetch_all().await.unwrap();
        assert_eq!(catalog.vulnerabilities.len(), 1);
        assert_eq!(catalog.vulnerabilities[0].cve_id, "CVE-2024-0001");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = CisaKevClient::new().with_url(server.uri());
        let result = client.fetch_once().await;
        assert!(matches!(result, Err(ClientError::Malformed(_))));
    }
}
