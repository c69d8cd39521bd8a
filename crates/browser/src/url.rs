//! URL validation before navigation (SPEC_FULL.md §C.4, recovered from the
//! original's `_validate_url`): a bare host is promoted to `https://`; a
//! scheme other than `http`/`https` is rejected outright since the Page
//! Driver contract assumes a valid, navigable URL is always supplied.

use nav_domain::error::{Error, Result};

/// Normalizes `raw` into a URL the driver can navigate to, or rejects it.
pub fn validate_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Other("empty URL".into()));
    }
    if let Some((scheme, _)) = trimmed.split_once("://") {
        return match scheme.to_lowercase().as_str() {
            "http" | "https" => Ok(trimmed.to_string()),
            other => Err(Error::Other(format!("unsupported URL scheme: {other}"))),
        };
    }
    Ok(format!("https://{trimmed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https_prefix() {
        assert_eq!(validate_url("acme.test/login").unwrap(), "https://acme.test/login");
    }

    #[test]
    fn explicit_http_is_kept() {
        assert_eq!(validate_url("http://acme.test").unwrap(), "http://acme.test");
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(validate_url("   ").is_err());
    }
}
