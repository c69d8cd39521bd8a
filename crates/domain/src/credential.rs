use serde::{Deserialize, Serialize};

/// A site's stored login, decrypted only on demand via the process key
/// (spec.md §6: credential DB, per-host encryption key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteCredential {
    pub site_id: i64,
    pub site_name: String,
    pub url: String,
    pub username_enc: Vec<u8>,
    pub password_enc: Vec<u8>,
}

/// Registrable-domain comparison used by the secret resolver (spec.md §4.6
/// stage 2) and the credential store lookup. Two URLs "match" when their
/// host, minus exactly one leading subdomain label, are equal — enough to
/// treat `www.acme.test` and `login.acme.test` as the same site without
/// pulling in a public-suffix-list dependency the teacher never carried.
pub fn base_domains_match(a: &str, b: &str) -> bool {
    match (registrable_domain(a), registrable_domain(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn registrable_domain(url: &str) -> Option<String> {
    let host = extract_host(url)?;
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        Some(host)
    } else {
        Some(labels[labels.len() - 2..].join("."))
    }
}

fn extract_host(url: &str) -> Option<String> {
    let without_scheme = url.split("://").last().unwrap_or(url);
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .split('@')
        .last()
        .unwrap_or(without_scheme)
        .split(':')
        .next()
        .unwrap_or(without_scheme);
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomains_of_the_same_site_match() {
        assert!(base_domains_match(
            "https://login.acme.test/signin",
            "https://www.acme.test/"
        ));
    }

    #[test]
    fn different_sites_do_not_match() {
        assert!(!base_domains_match(
            "https://acme.test",
            "https://other.test"
        ));
    }
}
