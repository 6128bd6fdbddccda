//! Raw NVD JSON 2.0 record shapes and their projection into the canonical
//! [`Vulnerability`].

use serde::Deserialize;
use std::collections::BTreeSet;
use the_foundation::{SourceTag, Severity, Vulnerability};

use crate::{cpe, cve_id, cwe, references};

/// One `vulnerabilities[].cve` object from `GET /cves/2.0`.
#[derive(Debug, Clone, Deserialize)]
pub struct NvdCve {
    pub id: String,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(rename = "lastModified", default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub descriptions: Vec<NvdDescription>,
    #[serde(default)]
    pub metrics: Option<NvdMetrics>,
    #[serde(default)]
    pub weaknesses: Vec<NvdWeakness>,
    #[serde(default)]
    pub references: Vec<NvdReference>,
    #[serde(default)]
    pub configurations: Vec<NvdConfiguration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NvdDescription {
    pub lang: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NvdMetrics {
    #[serde(rename = "cvssMetricV31", default)]
    pub cvss_v31: Vec<NvdCvssMetric>,
    #[serde(rename = "cvssMetricV30", default)]
    pub cvss_v30: Vec<NvdCvssMetric>,
    #[serde(rename = "cvssMetricV2", default)]
    pub cvss_v2: Vec<NvdCvssMetric>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NvdCvssMetric {
    #[serde(rename = "cvssData")]
    pub cvss_data: NvdCvssData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NvdCvssData {
    #[serde(rename = "baseScore")]
    pub base_score: f64,
    #[serde(rename = "vectorString")]
    pub vector_string: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NvdWeakness {
    #[serde(default)]
    pub description: Vec<NvdDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NvdReference {
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NvdConfiguration {
    #[serde(default)]
    pub nodes: Vec<NvdNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NvdNode {
    #[serde(rename = "cpeMatch", default)]
    pub cpe_match: Vec<NvdCpeMatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NvdCpeMatch {
    #[serde(default)]
    pub vulnerable: bool,
    pub criteria: String,
}

/// Parse an RFC-3339-ish NVD timestamp (`2024-02-01T00:00:00.000` or with a
/// `Z`/offset suffix) into a UTC instant.
fn parse_nvd_timestamp(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    // NVD sometimes omits the trailing offset entirely.
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
}

/// Prefer v3.1 > v3.0 > v2.0.
fn best_cvss(metrics: &NvdMetrics) -> Option<(f64, String)> {
    metrics
        .cvss_v31
        .first()
        .or_else(|| metrics.cvss_v30.first())
        .or_else(|| metrics.cvss_v2.first())
        .map(|m| (m.cvss_data.base_score, m.cvss_data.vector_string.clone()))
}

/// Prefer an English description, falling back to the first available.
fn best_description(descriptions: &[NvdDescription]) -> Option<String> {
    descriptions
        .iter()
        .find(|d| d.lang == "en")
        .or_else(|| descriptions.first())
        .map(|d| d.value.clone())
}

/// Project one raw NVD CVE record into the canonical [`Vulnerability`] shape.
/// Returns `None` if the record has no valid CVE id.
pub fn normalize(raw: &NvdCve) -> Option<Vulnerability> {
    let cve_id = cve_id::normalize(&raw.id)?;
    let now = chrono::Utc::now();

    let mut v = Vulnerability::new_from_source(cve_id, SourceTag::nvd(), now);

    v.description = best_description(&raw.descriptions)
        .map(|d| truncate_description(&d));
    v.title = v
        .description
        .as_deref()
        .map(|d| d.chars().take(120).collect());

    if let Some((score, vector)) = raw.metrics.as_ref().and_then(best_cvss) {
        v.cvss_score = Some(score);
        v.cvss_vector = Some(vector);
        v.severity = Severity::from_cvss_score(score);
    }

    v.published_at = raw.published.as_deref().and_then(parse_nvd_timestamp);
    v.modified_at = raw.last_modified.as_deref().and_then(parse_nvd_timestamp);

    for weakness in &raw.weaknesses {
        for d in &weakness.description {
            v.cwe_ids.extend(cwe::extract(&d.value));
        }
    }

    let mut vendors = BTreeSet::new();
    let mut products = BTreeSet::new();
    let mut affected = BTreeSet::new();
    for config in &raw.configurations {
        for node in &config.nodes {
            for m in &node.cpe_match {
                if let Some(parsed) = cpe::parse(&m.criteria) {
                    vendors.insert(parsed.vendor.clone());
                    products.insert(parsed.product.clone());
                    affected.insert(cpe::affected_product_tuple(&parsed));
                }
            }
        }
    }
    v.vendors = vendors;
    v.products = products;
    v.affected_products = affected;

    for r in &raw.references {
        if let Some(reference) = references::build_reference(&r.url, r.tags.clone()) {
            v.references.push(reference);
        }
    }

    Some(v)
}

/// Cap description length; NVD records occasionally carry multi-kilobyte
/// descriptions.
fn truncate_description(d: &str) -> String {
    const MAX_BYTES: usize = 20 * 1024;
    if d.len() <= MAX_BYTES {
        return d.to_string();
    }
    let mut end = MAX_BYTES;
    while !d.is_char_boundary(end) {
        end -= 1;
    }
    d[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NvdCve {
        NvdCve {
            id: "cve-2024-0001".to_string(),
            published: Some("2024-02-01T00:00:00.000".to_string()),
            last_modified: Some("2024-02-05T00:00:00.000".to_string()),
            descriptions: vec![NvdDescription {
                lang: "en".to_string(),
                value: "A remote attacker could exploit CWE-79 in widget.".to_string(),
            }],
            metrics: Some(NvdMetrics {
                cvss_v31: vec![NvdCvssMetric {
                    cvss_data: NvdCvssData {
                        base_score: 7.5,
                        vector_string: "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:N/A:N".to_string(),
                    },
                }],
                ..Default::default()
            }),
            weaknesses: vec![NvdWeakness {
                description: vec![NvdDescription {
                    lang: "en".to_string(),
                    value: "CWE-79".to_string(),
                }],
            }],
            references: vec![NvdReference {
                url: "https://nvd.nist.gov/vuln/detail/CVE-2024-0001".to_string(),
                tags: vec![],
            }],
            configurations: vec![NvdConfiguration {
                nodes: vec![NvdNode {
                    cpe_match: vec![NvdCpeMatch {
                        vulnerable: true,
                        criteria: "cpe:2.3:a:apache:log4j:2.14.1:*:*:*:*:*:*:*".to_string(),
                    }],
                }],
            }],
        }
    }

    #[test]
    fn test_normalize_full_record() {
        let v = normalize(&sample()).unwrap();
        assert_eq!(v.cve_id, "CVE-2024-0001");
        assert_eq!(v.cvss_score, Some(7.5));
        assert_eq!(v.severity, Severity::High);
        assert!(v.cwe_ids.contains("CWE-79"));
        assert!(v.vendors.contains("apache"));
        assert!(v.affected_products.contains("apache:log4j:2.14.1"));
        assert_eq!(v.references.len(), 1);
        assert!(v.sources.contains(&SourceTag::nvd()));
    }

    #[test]
    fn test_normalize_rejects_invalid_id() {
        let mut raw = sample();
        raw.id = "not-a-cve".to_string();
        assert!(normalize(&raw).is_none());
    }

    #[test]
    fn test_severity_derived_when_absent() {
        let mut raw = sample();
        raw.metrics = None;
        let v = normalize(&raw).unwrap();
        assert_eq!(v.severity, Severity::Unknown);
        assert_eq!(v.cvss_score, None);
    }
}
