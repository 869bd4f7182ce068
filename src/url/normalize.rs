use crate::UrlError;
use url::Url;

/// Query parameters that never change page content
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "_ga",
];

/// Normalizes a raw target URL from the input list
///
/// This is the validation gate every target passes before any fetch.
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Reject empty values and the literal `nan` left behind by spreadsheet exports
/// 3. Reject values with interior whitespace
/// 4. Prefix `https://` when no http(s) scheme is present
/// 5. Parse and require a non-empty host
///
/// # Arguments
///
/// * `raw` - The URL string as read from the input list
///
/// # Returns
///
/// * `Ok(String)` - The prefixed URL string, used verbatim as `url_root`
/// * `Err(UrlError)` - The value cannot be crawled
///
/// # Examples
///
/// ```
/// use affiliate_scout::url::normalize_target_url;
///
/// assert_eq!(normalize_target_url(" acme.io ").unwrap(), "https://acme.io");
/// assert!(normalize_target_url("not a url").is_err());
/// ```
pub fn normalize_target_url(raw: &str) -> Result<String, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Err(UrlError::Empty);
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(UrlError::Malformed(format!(
            "URL contains whitespace: {}",
            trimmed
        )));
    }

    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else if lower.contains("://") {
        let scheme = trimmed.split("://").next().unwrap_or_default();
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            scheme
        )));
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| UrlError::Parse(e.to_string()))?;
    match url.host_str() {
        Some(host) if !host.is_empty() && host_looks_valid(host) => Ok(candidate),
        Some(host) => Err(UrlError::Malformed(format!("Invalid host: {}", host))),
        None => Err(UrlError::MissingDomain),
    }
}

/// A bare word such as `localhost` or `acme` is accepted only when it is an IP
/// address or contains at least one dot
fn host_looks_valid(host: &str) -> bool {
    host.contains('.') || host.starts_with('[') || host == "localhost"
}

/// Canonicalizes a discovered link so that equivalent links compare equal
///
/// Drops the fragment, removes dot segments and trailing slashes from the
/// path, and strips tracking parameters. The result is a comparison key only;
/// links are fetched as written.
///
/// # Arguments
///
/// * `url` - An absolute http(s) URL
///
/// # Returns
///
/// The canonical form of the URL
pub fn canonicalize_link(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);

    let path = normalize_path(url.path());
    url.set_path(&path);

    if url.query().is_some() {
        let params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    url
}

/// Removes dot segments, duplicate slashes and the trailing slash
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
