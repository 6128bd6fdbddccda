//! Reference URL collection and type classification.

use the_foundation::{Reference, ReferenceType};

/// Classify a reference by its source-supplied tag vocabulary. Grounded on
/// the NVD API's reference `tags[]` vocabulary.
pub fn classify_tags(tags: &[String]) -> ReferenceType {
    let has = |needle: &str| tags.iter().any(|t| t == needle);

    if has("Patch") {
        ReferenceType::Patch
    } else if has("Vendor Advisory") || has("Third Party Advisory") {
        ReferenceType::Advisory
    } else if has("Exploit") {
        ReferenceType::Exploit
    } else if has("Release Notes") || has("Product") {
        ReferenceType::Vendor
    } else {
        ReferenceType::Other
    }
}

/// Build a [`Reference`] from a URL and its source tags, discarding
/// non-HTTP(S) entries and classifying NVD's own domain as `nvd`.
pub fn build_reference(url: &str, tags: Vec<String>) -> Option<Reference> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return None;
    }

    let ref_type = if url.contains("nvd.nist.gov") {
        ReferenceType::Nvd
    } else {
        classify_tags(&tags)
    };

    Some(Reference {
        url: url.to_string(),
        ref_type,
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_patch() {
        assert_eq!(
            classify_tags(&["Patch".to_string()]),
            ReferenceType::Patch
        );
    }

    #[test]
    fn test_classify_advisory() {
        assert_eq!(
            classify_tags(&["Third Party Advisory".to_string()]),
            ReferenceType::Advisory
        );
    }

    #[test]
    fn test_build_reference_discards_non_http() {
        assert!(build_reference("ftp://example.com/x", vec![]).is_none());
    }

    #[test]
    fn test_build_reference_nvd_domain() {
        let r = build_reference("https://nvd.nist.gov/vuln/detail/CVE-2024-0001", vec![]).unwrap();
        assert_eq!(r.ref_type, ReferenceType::Nvd);
    }
}
