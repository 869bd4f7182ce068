use super::catalog::WeightedTerm;
use std::collections::BTreeSet;
use url::Url;

/// Repeated occurrences of a phrase stop adding evidence after this many
pub const OCCURRENCE_CAP: usize = 3;

/// Multiplier applied to a phrase found inside anchor text
pub const ANCHOR_MULTIPLIER: f64 = 2.0;

/// Fixed bonus for each strong indicator present on the page
pub const STRONG_INDICATOR_BONUS: f64 = 8.0;

/// Raw URL score that maps to a normalized score of 1.0
pub const URL_NORMALIZER: f64 = 10.0;

/// Raw content score that maps to a normalized score of 1.0
pub const CONTENT_NORMALIZER: f64 = 40.0;

/// Pages with fewer tokens are treated as interstitials
pub const MIN_TOKENS: usize = 50;

const DENSITY_BONUS_THRESHOLD: f64 = 0.01;
const DENSITY_PENALTY_THRESHOLD: f64 = 0.20;

/// Evidence carried by a URL alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlScore {
    /// Normalized score in [0, 1]
    pub score: f64,
    /// Matched URL fragments
    pub signals: BTreeSet<String>,
}

/// Evidence carried by a page's text and anchors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentScore {
    /// Normalized score in [0, 1]
    pub score: f64,
    /// Distinct catalog phrases found in the body text
    pub body_matches: BTreeSet<String>,
    /// Distinct catalog phrases found inside anchor text
    pub anchor_matches: BTreeSet<String>,
    /// Trimmed text of the anchors that contained a catalog phrase
    pub anchor_texts: BTreeSet<String>,
    /// Strong indicators present in the body text
    pub strong_indicators: BTreeSet<String>,
    pub token_count: usize,
}

/// Scores a URL against weighted path fragments
///
/// Only the path is considered when the URL parses; otherwise the whole
/// lowercase string is searched.
pub fn score_url(url: &str, patterns: &[WeightedTerm]) -> UrlScore {
    let haystack = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => url.to_lowercase(),
    };

    let mut raw = 0.0;
    let mut signals = BTreeSet::new();
    for pattern in patterns {
        if haystack.contains(&pattern.term) {
            raw += pattern.weight;
            signals.insert(pattern.term.clone());
        }
    }

    UrlScore {
        score: (raw / URL_NORMALIZER).min(1.0),
        signals,
    }
}

/// Scores page text and anchor labels against the content phrases
///
/// # Arguments
///
/// * `text` - Visible page text
/// * `anchors` - Visible text of every anchor on the page
/// * `terms` - Deduplicated weighted content phrases
/// * `strong_indicators` - Phrases that add a fixed bonus
pub fn score_content(
    text: &str,
    anchors: &[String],
    terms: &[WeightedTerm],
    strong_indicators: &[String],
) -> ContentScore {
    let text_lower = text.to_lowercase();
    let token_count = text_lower.split_whitespace().count();

    let mut result = ContentScore {
        token_count,
        ..Default::default()
    };
    let mut raw = 0.0;
    let mut matched_tokens = 0usize;

    for term in terms {
        let count = text_lower.matches(term.term.as_str()).count();
        if count == 0 {
            continue;
        }
        raw += term.weight * count.min(OCCURRENCE_CAP) as f64;
        matched_tokens += count * term.term.split_whitespace().count().max(1);
        result.body_matches.insert(term.term.clone());
    }

    for anchor in anchors {
        let label = anchor.trim();
        if label.is_empty() {
            continue;
        }
        let label_lower = label.to_lowercase();
        for term in terms {
            if label_lower.contains(term.term.as_str()) {
                if result.anchor_matches.insert(term.term.clone()) {
                    raw += term.weight * ANCHOR_MULTIPLIER;
                }
                result.anchor_texts.insert(collapse_whitespace(label));
            }
        }
    }

    for indicator in strong_indicators {
        if text_lower.contains(indicator.as_str()) {
            raw += STRONG_INDICATOR_BONUS;
            result.strong_indicators.insert(indicator.clone());
        }
    }

    if token_count > 0 {
        let density = matched_tokens as f64 / token_count as f64;
        if density > DENSITY_PENALTY_THRESHOLD {
            raw *= 0.8;
        } else if density > DENSITY_BONUS_THRESHOLD {
            raw *= 1.2;
        }
    }

    if token_count < MIN_TOKENS {
        raw *= 0.5;
    }

    result.score = (raw / CONTENT_NORMALIZER).min(1.0);
    result
}

/// Combines URL and content evidence: `1 - (1 - url)(1 - content)`
pub fn page_confidence(url_score: f64, content_score: f64) -> f64 {
    let url = url_score.clamp(0.0, 1.0);
    let content = content_score.clamp(0.0, 1.0);
    1.0 - (1.0 - url) * (1.0 - content)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> Vec<WeightedTerm> {
        vec![
            WeightedTerm::new("affiliate program", 3.0),
            WeightedTerm::new("become an affiliate", 4.0),
            WeightedTerm::new("partner with us", 3.0),
        ]
    }

    fn filler(n: usize) -> String {
        vec!["lorem"; n].join(" ")
    }

    #[test]
    fn test_score_url_matches_path_only() {
        let patterns = vec![
            WeightedTerm::new("/affiliate", 5.0),
            WeightedTerm::new("/partners", 4.0),
        ];
        let score = score_url("https://acme.io/affiliate", &patterns);
        assert_eq!(score.score, 0.5);
        assert!(score.signals.contains("/affiliate"));

        // host is ignored
        let score = score_url("https://affiliate.acme.io/", &patterns);
        assert_eq!(score.score, 0.0);
    }

    #[test]
    fn test_score_url_caps_at_one() {
        let patterns = vec![WeightedTerm::new("/affiliate", 12.0)];
        assert_eq!(score_url("https://acme.io/affiliate", &patterns).score, 1.0);
    }

    #[test]
    fn test_occurrence_cap() {
        let once = format!("affiliate program {}", filler(200));
        let many = format!("{} {}", "affiliate program ".repeat(10), filler(200));
        let a = score_content(&once, &[], &terms(), &[]);
        let b = score_content(&many, &[], &terms(), &[]);
        assert!(b.score > a.score);
        // ten repetitions score like three
        let three = format!("{} {}", "affiliate program ".repeat(3), filler(200));
        let c = score_content(&three, &[], &terms(), &[]);
        assert_eq!(b.body_matches, c.body_matches);
    }

    #[test]
    fn test_anchor_bonus_once_per_phrase() {
        let text = format!("become an affiliate {}", filler(100));
        let anchors = vec![
            "  Become an Affiliate ".to_string(),
            "Become an affiliate today".to_string(),
        ];
        let score = score_content(&text, &anchors, &terms(), &[]);
        assert_eq!(score.anchor_matches.len(), 1);
        assert!(score.anchor_texts.contains("Become an Affiliate"));
        assert!(score.anchor_texts.contains("Become an affiliate today"));
    }

    #[test]
    fn test_short_page_penalty() {
        let short = "affiliate program partner with us";
        let long = format!("{} {}", short, filler(60));
        let s = score_content(short, &[], &terms(), &[]);
        let l = score_content(&long, &[], &terms(), &[]);
        assert!(s.token_count < MIN_TOKENS);
        assert!(s.score < l.score);
    }

    #[test]
    fn test_strong_indicator_bonus() {
        let text = format!("log in to your affiliate dashboard {}", filler(100));
        let strong = vec!["affiliate dashboard".to_string()];
        let score = score_content(&text, &[], &terms(), &strong);
        assert!(score.strong_indicators.contains("affiliate dashboard"));
        assert!(score.score > 0.0);
    }

    #[test]
    fn test_no_matches_scores_zero() {
        let score = score_content(&filler(100), &["Pricing".to_string()], &terms(), &[]);
        assert_eq!(score.score, 0.0);
        assert!(score.body_matches.is_empty());
        assert!(score.anchor_texts.is_empty());
    }

    #[test]
    fn test_page_confidence() {
        assert_eq!(page_confidence(0.0, 0.0), 0.0);
        assert_eq!(page_confidence(1.0, 0.2), 1.0);
        assert!((page_confidence(0.5, 0.5) - 0.75).abs() < 1e-9);
    }
}
