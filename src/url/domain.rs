use super::matcher::matches_wildcard;
use url::{Host, Url};

/// Extracts the lowercase host of a URL
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(String)` - The lowercase host
/// * `None` - If the URL has no host
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Reduces a host to its registrable domain
///
/// Resolved against the public suffix list, private section included, so
/// tenants of shared hosts such as `github.io` are separate sites. IP
/// addresses, and hosts that are themselves a public suffix, are returned
/// unchanged.
///
/// # Examples
///
/// ```
/// use affiliate_scout::url::registrable_domain;
///
/// assert_eq!(registrable_domain("blog.acme.io"), "acme.io");
/// assert_eq!(registrable_domain("shop.acme.co.uk"), "acme.co.uk");
/// assert_eq!(registrable_domain("acme.github.io"), "acme.github.io");
/// assert_eq!(registrable_domain("127.0.0.1"), "127.0.0.1");
/// ```
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();

    if matches!(
        Host::parse(&host),
        Ok(Host::Ipv4(_)) | Ok(Host::Ipv6(_))
    ) {
        return host;
    }

    match psl::domain_str(&host) {
        Some(domain) => domain.to_string(),
        None => host,
    }
}

/// Returns true when `candidate` belongs to the same site as `base`
///
/// Same site means the exact host, or any host under the same registrable
/// domain, so subdomains count.
pub fn is_same_site(base: &Url, candidate: &Url) -> bool {
    let (Some(base_host), Some(candidate_host)) =
        (extract_domain(base), extract_domain(candidate))
    else {
        return false;
    };

    if base_host == candidate_host {
        return true;
    }

    let pattern = format!("*.{}", registrable_domain(&base_host));
    matches_wildcard(&pattern, &candidate_host)
}
