// mcpscope-common/src/validation.rs
use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref HTTP_URL: Regex = Regex::new(r"(?i)^https?://\S+$").expect("static URL pattern");
    static ref HTTP_SCHEME: Regex = Regex::new(r"(?i)^https?://").expect("static scheme pattern");
}

/// A URL that failed validation, with one message per problem found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid URL: {}", .messages.join("; "))]
pub struct ValidationError {
    pub messages: Vec<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError {
            messages: vec![message.into()],
        }
    }
}

/// Trim whitespace and turn scheme-less input into an `https://` URL that
/// [`validate_url`] accepts. Input that already names an http(s) scheme is
/// only trimmed, and an empty input stays empty so the validator can report it.
///
/// When prefixing alone does not produce a valid URL, the host part is reduced
/// to DNS-safe labels and whitespace in the remainder is percent-encoded.
/// `https://localhost` is the last resort.
pub fn sanitize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || HTTP_SCHEME.is_match(trimmed) {
        return trimmed.to_string();
    }

    let prefixed = format!("https://{}", trimmed);
    if validate_url(&prefixed).is_ok() {
        return prefixed;
    }

    let split = trimmed.find(['/', '?', '#']).unwrap_or(trimmed.len());
    let (authority, rest) = trimmed.split_at(split);
    let rest = encode_whitespace(rest);
    let host = dns_safe_host(authority);

    [format!("https://{}{}", host, rest), format!("https://localhost{}", rest)]
        .into_iter()
        .find(|candidate| validate_url(candidate).is_ok())
        .unwrap_or_else(|| "https://localhost".to_string())
}

fn encode_whitespace(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_whitespace() { "%20".to_string() } else { c.to_string() })
        .collect()
}

// Keeps ASCII letters and digits, maps everything else to '-', and drops
// labels that end up empty. Punycode prefixes are removed since the rest of
// the label is no longer valid punycode.
fn dns_safe_host(authority: &str) -> String {
    let replaced: String = authority
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect();

    let labels: Vec<&str> = replaced
        .split('.')
        .map(|label| {
            let mut label = label.trim_matches('-');
            while let Some(stripped) = label.strip_prefix("xn--") {
                label = stripped.trim_matches('-');
            }
            label
        })
        .filter(|label| !label.is_empty())
        .collect();

    if labels.is_empty() {
        "localhost".to_string()
    } else {
        labels.join(".")
    }
}

/// Check that `raw` is an absolute http(s) URL with a host.
pub fn validate_url(raw: &str) -> Result<Url, ValidationError> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return Err(ValidationError::new("URL is required"));
    }

    let mut messages = Vec::new();
    if !HTTP_URL.is_match(candidate) {
        messages.push("URL must start with http:// or https:// and contain no spaces".to_string());
    }

    match Url::parse(candidate) {
        Ok(url) if url.host_str().map_or(true, str::is_empty) => {
            messages.push("URL must include a host".to_string());
        }
        Ok(url) if messages.is_empty() => return Ok(url),
        Ok(_) => {}
        Err(e) => messages.push(format!("URL could not be parsed: {}", e)),
    }

    Err(ValidationError { messages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sanitize_prepends_https_when_scheme_missing() {
        for raw in ["github.com", "  example.org/path ", "api.stripe.com:8443/v1", "localhost"] {
            let sanitized = sanitize_url(raw);
            assert_eq!(sanitized, format!("https://{}", raw.trim()));
            assert!(validate_url(&sanitized).is_ok(), "{} should validate", sanitized);
        }
    }

    #[test]
    fn sanitize_repairs_hosts_the_parser_rejects() {
        assert_eq!(sanitize_url("my site.com"), "https://my-site.com");
        assert_eq!(sanitize_url("a b"), "https://a-b");
        assert_eq!(sanitize_url("localhost:abc"), "https://localhost-abc");
        assert_eq!(sanitize_url("exa%mple.com"), "https://exa-mple.com");
        assert_eq!(sanitize_url("my site.com/some path?q=a b"), "https://my-site.com/some%20path?q=a%20b");
        for raw in ["[::1", "%%%", "-.-", "xn--zz.com", "1.2.3.4.5", "..", "\u{2028}x"] {
            let sanitized = sanitize_url(raw);
            assert!(sanitized.starts_with("https://"), "{:?} -> {}", raw, sanitized);
            assert!(validate_url(&sanitized).is_ok(), "{:?} -> {} should validate", raw, sanitized);
        }
    }

    proptest! {
        #[test]
        fn sanitized_scheme_less_input_always_validates(raw in any::<String>()) {
            prop_assume!(!raw.trim().is_empty());
            prop_assume!(!HTTP_SCHEME.is_match(raw.trim()));
            let sanitized = sanitize_url(&raw);
            prop_assert!(sanitized.starts_with("https://"));
            prop_assert!(validate_url(&sanitized).is_ok(), "{:?} -> {}", raw, sanitized);
        }

        #[test]
        fn sanitized_host_like_input_always_validates(raw in "[a-z0-9 %:.\\[\\]@/?#-]{1,24}") {
            prop_assume!(!raw.trim().is_empty());
            prop_assume!(!HTTP_SCHEME.is_match(raw.trim()));
            let sanitized = sanitize_url(&raw);
            prop_assert!(validate_url(&sanitized).is_ok(), "{:?} -> {}", raw, sanitized);
        }
    }

    #[test]
    fn sanitize_keeps_existing_scheme() {
        assert_eq!(sanitize_url(" http://example.com "), "http://example.com");
        assert_eq!(sanitize_url("HTTPS://Example.com"), "HTTPS://Example.com");
    }

    #[test]
    fn sanitize_leaves_blank_input_blank() {
        assert_eq!(sanitize_url("   "), "");
    }

    #[test]
    fn github_sanitizes_to_https() {
        assert_eq!(sanitize_url("github.com"), "https://github.com");
        let url = validate_url("https://github.com").unwrap();
        assert_eq!(url.host_str(), Some("github.com"));
    }

    #[test]
    fn blank_is_rejected() {
        let err = validate_url(" \t").unwrap_err();
        assert_eq!(err.messages, vec!["URL is required".to_string()]);
    }

    #[test]
    fn missing_scheme_is_rejected() {
        let err = validate_url("github.com").unwrap_err();
        assert!(err.messages[0].contains("http://"));
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert!(validate_url("ftp://files.example.com").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn hostless_url_is_rejected() {
        let err = validate_url("https://").unwrap_err();
        assert!(!err.messages.is_empty());
    }

    #[test]
    fn error_display_joins_messages() {
        let err = ValidationError {
            messages: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "invalid URL: a; b");
    }
}
