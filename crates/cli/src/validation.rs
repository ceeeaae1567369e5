//! Client-side checks run before a rule is sent to the background process.

use regex::Regex;
use url::Url;

use rerouter_core::{RuleDraft, RuleType};

/// Complete a bare host such as `example.com` into an `https://` URL.
///
/// Values that already start with `*`, `http://` or `https://` are left alone,
/// as is anything that does not look like a host name.
pub fn normalize_url(value: &str) -> String {
    let value = value.trim();
    if value.starts_with('*') || value.starts_with("http://") || value.starts_with("https://") {
        return value.to_string();
    }

    let starts_alnum = value.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    if !starts_alnum || !value.contains('.') {
        return value.to_string();
    }

    if value.matches('.').count() == 1 && !value.starts_with("www.") {
        format!("https://www.{value}")
    } else {
        format!("https://{value}")
    }
}

/// An absolute `http` or `https` URL.
pub fn is_valid_redirect_url(value: &str) -> bool {
    Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Normalize and check a draft in place. The error text is shown to the user.
pub fn validate_draft(draft: &mut RuleDraft) -> Result<(), String> {
    if draft.from.trim().is_empty() {
        return Err("source pattern must not be empty".into());
    }

    match draft.kind {
        RuleType::Regex => {
            Regex::new(&draft.from).map_err(|e| format!("invalid regular expression: {e}"))?;
            if draft.regex_substitution.as_deref().unwrap_or("").is_empty() {
                return Err("regex rules need a substitution target".into());
            }
            draft.to = None;
        }
        RuleType::Wildcard => {
            draft.from = normalize_url(&draft.from);
            let to = normalize_url(draft.to.as_deref().unwrap_or(""));
            if !is_valid_redirect_url(&to) {
                return Err(format!("invalid redirect URL: {to}"));
            }
            draft.to = Some(to);
            draft.regex_substitution = None;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_domain_gets_scheme_and_www() {
        assert_eq!(normalize_url("example.com"), "https://www.example.com");
        assert_eq!(normalize_url("example.com/path"), "https://www.example.com/path");
    }

    #[test]
    fn subdomains_and_www_only_get_scheme() {
        assert_eq!(normalize_url("docs.example.com"), "https://docs.example.com");
        assert_eq!(normalize_url("www.example.com"), "https://www.example.com");
    }

    #[test]
    fn patterns_and_full_urls_are_untouched() {
        for v in ["*://a.com/*", "http://a.com", "https://a.com/x", "localhost", "-a.com", ""] {
            assert_eq!(normalize_url(v), v);
        }
    }

    #[test]
    fn redirect_url_must_be_absolute_http() {
        assert!(is_valid_redirect_url("https://a.com/"));
        assert!(is_valid_redirect_url("http://localhost:8080/x"));
        assert!(!is_valid_redirect_url("ftp://a.com/"));
        assert!(!is_valid_redirect_url("a.com"));
        assert!(!is_valid_redirect_url(""));
    }

    #[test]
    fn wildcard_draft_is_normalized() {
        let mut draft = RuleDraft::wildcard("n", "old.com", "new.com");
        validate_draft(&mut draft).unwrap();
        assert_eq!(draft.from, "https://www.old.com");
        assert_eq!(draft.to.as_deref(), Some("https://www.new.com"));
    }

    #[test]
    fn wildcard_draft_with_bad_target_is_rejected() {
        let mut draft = RuleDraft::wildcard("n", "*://a.com/*", "not a url");
        assert!(validate_draft(&mut draft).unwrap_err().contains("invalid redirect URL"));
    }

    #[test]
    fn regex_draft_must_compile() {
        let mut draft = RuleDraft::regex("n", "^https://(a", "https://b/\\1");
        assert!(validate_draft(&mut draft).unwrap_err().contains("regular expression"));

        let mut draft = RuleDraft::regex("n", "^https://a/(.*)", "https://b/\\1");
        validate_draft(&mut draft).unwrap();
        assert_eq!(draft.from, "^https://a/(.*)");
    }

    #[test]
    fn empty_source_is_rejected() {
        let mut draft = RuleDraft::wildcard("n", "  ", "https://b/");
        assert!(validate_draft(&mut draft).is_err());
    }
}
