use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.[a-z]{2,}\b").unwrap()
});

/// Hosts that show up in page source but never belong to the site owner
const EXCLUDED_HOSTS: &[&str] = &["sentry.io", "wixpress.com", "example.com", "sentry-next.wixpress.com"];

/// Asset suffixes that the address pattern mistakes for domains (`logo@2x.png`)
const ASSET_SUFFIXES: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".avif",
];

const GENERIC_PATTERNS: &[&str] = &["noreply", "no-reply", "support", "privacy", "jobs", "contact@", "hello@"];
const PARTNER_KEYWORDS: &[&str] = &["partner", "affiliate", "biz", "growth", "marketing"];

/// Extracts contact emails from page text
///
/// Addresses are lowercased; tracking and asset hosts are discarded.
pub fn extract_emails(text: &str) -> BTreeSet<String> {
    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|email| !is_excluded(email))
        .collect()
}

/// Extracts the address of a `mailto:` href
pub fn email_from_mailto(href: &str) -> Option<String> {
    let rest = href.trim();
    let rest = rest
        .get(..7)
        .filter(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
        .map(|_| &rest[7..])?;
    let address = rest.split('?').next().unwrap_or_default().trim();
    let m = EMAIL_RE.find(address)?;
    let email = m.as_str().to_lowercase();
    (!is_excluded(&email)).then_some(email)
}

fn is_excluded(email: &str) -> bool {
    let Some((_, host)) = email.rsplit_once('@') else {
        return true;
    };

    if ASSET_SUFFIXES.iter().any(|suffix| host.ends_with(suffix)) {
        return true;
    }

    EXCLUDED_HOSTS
        .iter()
        .any(|excluded| host == *excluded || host.ends_with(&format!(".{}", excluded)))
}

/// Rates how useful an address is for a partnership inquiry
///
/// * `3` - partnership or marketing mailbox
/// * `2` - any other personal or team address
/// * `1` - generic support or no-reply mailbox
/// * `0` - empty
pub fn score_email(email: &str) -> u8 {
    if email.is_empty() {
        return 0;
    }
    let lower = email.to_lowercase();
    if GENERIC_PATTERNS.iter().any(|p| lower.contains(p)) {
        1
    } else if PARTNER_KEYWORDS.iter().any(|k| lower.contains(k)) {
        3
    } else {
        2
    }
}

/// Picks the highest scoring address; ties go to the alphabetically first
pub fn best_email<'a, I>(emails: I) -> Option<(&'a str, u8)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&str, u8)> = None;
    for email in emails {
        let score = score_email(email);
        if score == 0 {
            continue;
        }
        best = match best {
            Some((current, current_score))
                if current_score > score || (current_score == score && current <= email) =>
            {
                Some((current, current_score))
            }
            _ => Some((email, score)),
        };
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_and_lowercases() {
        let emails = extract_emails("Write to Partners@Acme.io or sales@acme.io today.");
        assert_eq!(
            emails.into_iter().collect::<Vec<_>>(),
            vec!["partners@acme.io", "sales@acme.io"]
        );
    }

    #[test]
    fn test_filters_tracking_hosts() {
        let text = "abc123@o1.ingest.sentry.io user@sentry-next.wixpress.com demo@example.com real@acme.io";
        let emails = extract_emails(text);
        assert_eq!(emails.len(), 1);
        assert!(emails.contains("real@acme.io"));
    }

    #[test]
    fn test_filters_asset_names() {
        let emails = extract_emails("<img src=\"logo@2x.png\"> hero@3x.webp");
        assert!(emails.is_empty());
    }

    #[test]
    fn test_mailto() {
        assert_eq!(
            email_from_mailto("mailto:Affiliates@Acme.io?subject=Hi"),
            Some("affiliates@acme.io".to_string())
        );
        assert_eq!(email_from_mailto("MAILTO:a@acme.io"), Some("a@acme.io".to_string()));
        assert_eq!(email_from_mailto("https://acme.io"), None);
        assert_eq!(email_from_mailto("mailto:someone@example.com"), None);
    }

    #[test]
    fn test_score_email() {
        assert_eq!(score_email(""), 0);
        assert_eq!(score_email("noreply@acme.io"), 1);
        assert_eq!(score_email("hello@acme.io"), 1);
        assert_eq!(score_email("jane@acme.io"), 2);
        assert_eq!(score_email("partners@acme.io"), 3);
    }

    #[test]
    fn test_best_email() {
        let emails = ["support@acme.io", "jane@acme.io", "affiliates@acme.io"];
        assert_eq!(best_email(emails), Some(("affiliates@acme.io", 3)));
        assert_eq!(best_email(Vec::<&str>::new()), None);
        assert_eq!(
            best_email(["zed@acme.io", "amy@acme.io"]),
            Some(("amy@acme.io", 2))
        );
    }
}
