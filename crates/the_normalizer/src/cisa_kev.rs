//! Raw CISA KEV catalog shape and its projection into the canonical
//! [`Vulnerability`]. `{vulnerabilities: [{cveID,
//! vulnerabilityName, shortDescription, dateAdded, dueDate, cwes[], notes}]}`.

use chrono::NaiveDate;
use serde::Deserialize;
use the_foundation::{SourceTag, Vulnerability};

use crate::{cve_id, cwe};

#[derive(Debug, Clone, Deserialize)]
pub struct CisaKevCatalog {
    pub vulnerabilities: Vec<CisaKevEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CisaKevEntry {
    #[serde(rename = "cveID")]
    pub cve_id: String,
    #[serde(rename = "vulnerabilityName")]
    pub vulnerability_name: String,
    #[serde(rename = "shortDescription")]
    pub short_description: String,
    #[serde(rename = "dateAdded")]
    pub date_added: String,
    #[serde(rename = "dueDate")]
    pub due_date: String,
    #[serde(default)]
    pub cwes: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(rename = "knownRansomwareCampaignUse", default)]
    pub known_ransomware_campaign_use: Option<String>,
}

/// Project one KEV entry into the canonical shape. KEV presence is itself
/// the `exploited_in_the_wild = true` signal; every
/// CISA KEV entry is, by construction, a confirmed exploited CVE.
pub fn normalize(raw: &CisaKevEntry) -> Option<Vulnerability> {
    let id = cve_id::normalize(&raw.cve_id)?;
    let now = chrono::Utc::now();

    let mut v = Vulnerability::new_from_source(id, SourceTag::cisa_kev(), now);
    v.title = Some(raw.vulnerability_name.clone());
    v.description = Some(raw.short_description.clone());
    v.exploited_in_the_wild = true;
    v.cisa_due_date = NaiveDate::parse_from_str(&raw.due_date, "%Y-%m-%d").ok();

    for token in &raw.cwes {
        v.cwe_ids.extend(cwe::extract(token));
    }
    v.cwe_ids.extend(cwe::extract(&raw.notes));

    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CisaKevEntry {
        CisaKevEntry {
            cve_id: "CVE-2024-0001".to_string(),
            vulnerability_name: "Widget Co Widget RCE".to_string(),
            short_description: "Widget allows remote code execution.".to_string(),
            date_added: "2024-02-15".to_string(),
            due_date: "2024-03-01".to_string(),
            cwes: vec!["CWE-94".to_string()],
            notes: String::new(),
            known_ransomware_campaign_use: Some("Unknown".to_string()),
        }
    }

    #[test]
    fn test_normalize_sets_exploited_and_due_date() {
        let v = normalize(&sample()).unwrap();
        assert!(v.exploited_in_the_wild);
        assert_eq!(
            v.cisa_due_date,
            Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert!(v.cwe_ids.contains("CWE-94"));
        assert!(v.sources.contains(&SourceTag::cisa_kev()));
    }

    #[test]
    fn test_normalize_rejects_invalid_id() {
        let mut raw = sample();
        raw.cve_id = "garbage".to_string();
        assert!(normalize(&raw).is_none());
    }
}
