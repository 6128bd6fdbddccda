//! CPE URI parsing.
//!
//! Parses `cpe:2.3:a:vendor:product:version:...` (or the older unprefixed
//! `cpe:/a:vendor:product:version` form, both of which are colon-delimited
//! past the `a`/`o`/`h` part marker) into `(vendor, product, version)`.
//!
//! Splits on every `:` without honoring CPE 2.3's backslash-escaping of
//! literal colons within a field. The upstream connector this is grounded on
//! does the same naive split; reimplementers who need exact CPE 2.3
//! conformance should special-case escaped colons, but this mirrors the
//! fidelity of the system being rebuilt rather than the full standard.
pub struct ParsedCpe {
    pub vendor: String,
    pub product: String,
    pub version: Option<String>,
}

pub fn parse(uri: &str) -> Option<ParsedCpe> {
    let parts: Vec<&str> = uri.split(':').collect();
    if parts.len() < 5 {
        return None;
    }
    let vendor = parts[3].to_string();
    let product = parts[4].to_string();
    if vendor.is_empty() || product.is_empty() {
        return None;
    }
    let version = parts
        .get(5)
        .map(|s| s.to_string())
        .filter(|v| !v.is_empty() && v != "*" && v != "-");

    Some(ParsedCpe {
        vendor,
        product,
        version,
    })
}

/// Build the display form used for `affected_products`: `vendor:product` or
/// `vendor:product:version` when a concrete version is present.
pub fn affected_product_tuple(parsed: &ParsedCpe) -> String {
    match &parsed.version {
        Some(v) => format!("{}:{}:{}", parsed.vendor, parsed.product, v),
        None => format!("{}:{}", parsed.vendor, parsed.product),
    }
}

/// Normalize a vendor/product token for matching purposes: dots, spaces, and
/// underscores collapse to a single separator-free lowercase form. The
/// original token (not this one) is what gets stored for display.
pub fn normalize_for_matching(token: &str) -> String {
    token
        .to_ascii_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '_' | '-'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpe23() {
        let parsed = parse("cpe:2.3:a:apache:log4j:2.14.1:*:*:*:*:*:*:*").unwrap();
        assert_eq!(parsed.vendor, "apache");
        assert_eq!(parsed.product, "log4j");
        assert_eq!(parsed.version.as_deref(), Some("2.14.1"));
    }

    #[test]
    fn test_parse_cpe_no_version() {
        let parsed = parse("cpe:2.3:a:microsoft:windows:*:*:*:*:*:*:*:*").unwrap();
        assert_eq!(parsed.version, None);
        assert_eq!(affected_product_tuple(&parsed), "microsoft:windows");
    }

    #[test]
    fn test_parse_rejects_short_uri() {
        assert!(parse("cpe:2.3:a").is_none());
    }

    #[test]
    fn test_normalize_for_matching() {
        assert_eq!(normalize_for_matching("My_Product.Name"), "myproductname");
    }
}
