//! Rule-based fallback summarizer: the Enrichment Queue falls back to
//! this deterministic transformation when no summarizer provider is
//! reachable, rather than leaving the item unprocessed forever.
//!
//! Grounded on the teacher's template-based `generate_remediation_guidance`
//! (`the_infiltrator::scanner`, now superseded) for the "build a human
//! sentence from structured fields" idiom, adapted to the spec's contract:
//! strip the description to its first sentences, and synthesize a title of
//! the shape `{severity} {vuln_type} in {vendor} {product}`.

const TITLE_MAX_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 300;

/// Keyword → vulnerability-type phrase table, checked in order against a
/// lowercased description. First match wins; falls back to "vulnerability".
const VULN_TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("sql injection", "SQL injection vulnerability"),
    ("cross-site scripting", "cross-site scripting vulnerability"),
    ("xss", "cross-site scripting vulnerability"),
    ("remote code execution", "remote code execution vulnerability"),
    ("arbitrary code execution", "remote code execution vulnerability"),
    ("buffer overflow", "buffer overflow vulnerability"),
    ("out-of-bounds", "out-of-bounds memory vulnerability"),
    ("path traversal", "path traversal vulnerability"),
    ("directory traversal", "path traversal vulnerability"),
    ("denial of service", "denial-of-service vulnerability"),
    ("privilege escalation", "privilege escalation vulnerability"),
    ("authentication bypass", "authentication bypass vulnerability"),
    ("deserialization", "insecure deserialization vulnerability"),
    ("server-side request forgery", "server-side request forgery vulnerability"),
    ("ssrf", "server-side request forgery vulnerability"),
    ("csrf", "cross-site request forgery vulnerability"),
    ("information disclosure", "information disclosure vulnerability"),
    ("use-after-free", "use-after-free vulnerability"),
    ("null pointer", "null pointer dereference vulnerability"),
    ("integer overflow", "integer overflow vulnerability"),
];

/// Output of the rule-based shortener; mirrors the summarizer's own output
/// shape so callers don't need to branch on which path produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackSummary {
    pub simple_title: String,
    pub simple_description: String,
}

fn infer_vuln_type(description: &str) -> &'static str {
    let lower = description.to_lowercase();
    VULN_TYPE_KEYWORDS
        .iter()
        .find(|(kw, _)| lower.contains(kw))
        .map(|(_, phrase)| *phrase)
        .unwrap_or("vulnerability")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut truncated: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// First `n` sentences of `text`, split on `. `/`.\n`/EOF, joined back with
/// a single space. A "sentence" with no terminator at all is returned whole.
fn first_sentences(text: &str, n: usize) -> String {
    let mut sentences = Vec::new();
    let mut rest = text.trim();

    while sentences.len() < n && !rest.is_empty() {
        if let Some(idx) = rest.find(". ") {
            sentences.push(rest[..=idx].trim_end().to_string());
            rest = rest[idx + 2..].trim_start();
        } else {
            sentences.push(rest.trim_end_matches('.').to_string() + ".");
            rest = "";
        }
    }

    sentences.join(" ")
}

/// Build a fallback `{simple_title, simple_description}` pair from a
/// vulnerability's original title/description and structured fields, per
/// the "unavailable summarizer" error path.
///
/// `vendor`/`product` are the first (alphabetically, since the caller holds
/// a `BTreeSet`) of each set, or omitted from the title when absent.
pub fn fallback_summarize(
    original_title: Option<&str>,
    description: Option<&str>,
    severity: &str,
    vendor: Option<&str>,
    product: Option<&str>,
) -> FallbackSummary {
    let description = description.unwrap_or("No description available.");
    let vuln_type = infer_vuln_type(description);

    let title = match (vendor, product) {
        (Some(vendor), Some(product)) => format!("{severity} {vuln_type} in {vendor} {product}"),
        (Some(vendor), None) => format!("{severity} {vuln_type} in {vendor}"),
        (None, Some(product)) => format!("{severity} {vuln_type} in {product}"),
        (None, None) => original_title
            .map(|t| t.to_string())
            .unwrap_or_else(|| format!("{severity} {vuln_type}")),
    };

    FallbackSummary {
        simple_title: truncate_chars(&title, TITLE_MAX_CHARS),
        simple_description: truncate_chars(&first_sentences(description, 2), DESCRIPTION_MAX_CHARS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infers_sql_injection() {
        let s = fallback_summarize(
            None,
            Some("A SQL injection vulnerability allows an attacker to read arbitrary data. Patch immediately."),
            "CRITICAL",
            Some("Acme"),
            Some("Widget"),
        );
        assert_eq!(s.simple_title, "CRITICAL SQL injection vulnerability in Acme Widget");
    }

    #[test]
    fn test_unrecognized_keyword_defaults_to_vulnerability() {
        let s = fallback_summarize(None, Some("Something unusual happens."), "LOW", None, None);
        assert_eq!(s.simple_title, "LOW vulnerability");
    }

    #[test]
    fn test_title_respects_max_length() {
        let long_vendor = "A".repeat(200);
        let s = fallback_summarize(None, Some("desc"), "HIGH", Some(&long_vendor), Some("X"));
        assert!(s.simple_title.chars().count() <= TITLE_MAX_CHARS);
    }

    #[test]
    fn test_description_takes_first_two_sentences() {
        let desc = "First sentence here. Second sentence here. Third sentence should be dropped.";
        let s = fallback_summarize(None, Some(desc), "HIGH", None, None);
        assert_eq!(s.simple_description, "First sentence here. Second sentence here.");
    }

    #[test]
    fn test_no_description_falls_back_to_placeholder() {
        let s = fallback_summarize(None, None, "UNKNOWN", None, None);
        assert!(s.simple_description.contains("No description"));
    }
}
