/// Checks if a host matches a domain pattern
///
/// A pattern of the form `*.acme.io` matches the bare domain and every
/// subdomain below it. Any other pattern is an exact match.
///
/// # Arguments
///
/// * `pattern` - The domain pattern, optionally starting with "*."
/// * `candidate` - The lowercase host to check
///
/// # Examples
///
/// ```
/// use affiliate_scout::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.acme.io", "acme.io"));
/// assert!(matches_wildcard("*.acme.io", "partners.acme.io"));
/// assert!(!matches_wildcard("*.acme.io", "notacme.io"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}
