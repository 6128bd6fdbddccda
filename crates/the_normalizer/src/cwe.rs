//! CWE token extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static CWE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"CWE-\d+").unwrap());

/// Extract `CWE-N` tokens from arbitrary text (weakness descriptions,
/// CISA's `cwes[]` array joined, or free text), deduplicated.
pub fn extract(text: &str) -> BTreeSet<String> {
    CWE_PATTERN
        .find_iter(&text.to_ascii_uppercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_multiple() {
        let text = "Weakness: CWE-79 (XSS) also related to cwe-89";
        let found = extract(text);
        assert!(found.contains("CWE-79"));
        assert!(found.contains("CWE-89"));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_extract_none() {
        assert!(extract("no weaknesses here").is_empty());
    }
}
