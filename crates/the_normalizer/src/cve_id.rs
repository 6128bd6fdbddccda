//! CVE identifier extraction and validation.

use once_cell::sync::Lazy;
use regex::Regex;

/// `CVE-YYYY-N{4,}`, anchored for validation, unanchored for free-text scan.
static CVE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"CVE-\d{4}-\d{4,}").unwrap());

/// Validate and case-normalize a candidate CVE id. Returns `None` if it
/// doesn't match the pattern anywhere in the input, case-insensitively.
pub fn normalize(candidate: &str) -> Option<String> {
    let upper = candidate.trim().to_ascii_uppercase();
    if CVE_PATTERN.is_match(&upper) && upper.starts_with("CVE-") {
        Some(upper)
    } else {
        None
    }
}

/// Scan free text (e.g. an RSS article body) for every CVE id mentioned,
/// deduplicated, in first-seen order.
pub fn extract_from_text(text: &str) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    for m in CVE_PATTERN.find_iter(&text.to_ascii_uppercase()) {
        let id = m.as_str().to_string();
        if seen.insert(id.clone()) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_valid() {
        assert_eq!(normalize("cve-2024-1234"), Some("CVE-2024-1234".to_string()));
        assert_eq!(normalize("CVE-2021-44228"), Some("CVE-2021-44228".to_string()));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize("not-a-cve"), None);
        assert_eq!(normalize("CVE-24-1"), None);
    }

    #[test]
    fn test_extract_from_text_dedup_and_order() {
        let text = "Affects CVE-2021-44228 and also cve-2021-44228 plus CVE-2022-0001.";
        let found = extract_from_text(text);
        assert_eq!(found, vec!["CVE-2021-44228".to_string(), "CVE-2022-0001".to_string()]);
    }
}
