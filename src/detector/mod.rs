//! Affiliate program detection
//!
//! Pure scoring over URLs, page text and anchor labels. The detector is built
//! once from a [`KeywordCatalog`] and shared read-only by every controller.

mod catalog;
mod emails;
mod scoring;

pub use catalog::{KeywordCatalog, WeightedTerm};
pub use emails::{best_email, email_from_mailto, extract_emails, score_email};
pub use scoring::{page_confidence, score_content, score_url, ContentScore, UrlScore};

use std::collections::BTreeSet;

/// Which rule qualified a page as affiliate-bearing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionReason {
    /// A strong indicator phrase is present
    StrongIndicator,
    /// A catalog phrase appears inside anchor text
    AnchorText,
    /// Two or more distinct phrases in the body with enough confidence
    MultipleMatches,
}

/// Outcome of classifying a single page
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub is_affiliate: bool,
    pub reason: Option<DetectionReason>,
    /// Page confidence in [0, 1]
    pub confidence: f64,
    /// Matched URL fragments, phrases and anchor labels
    pub signals: BTreeSet<String>,
}

/// Scores pages against a keyword catalog
#[derive(Debug, Clone)]
pub struct AffiliateDetector {
    catalog: KeywordCatalog,
    content_terms: Vec<WeightedTerm>,
    min_confidence: f64,
}

impl AffiliateDetector {
    pub fn new(catalog: KeywordCatalog, min_confidence: f64) -> Self {
        let content_terms = catalog.content_terms();
        Self {
            catalog,
            content_terms,
            min_confidence,
        }
    }

    pub fn catalog(&self) -> &KeywordCatalog {
        &self.catalog
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Terms that rank a discovered link ahead of the others
    pub fn priority_terms(&self) -> &[String] {
        &self.catalog.priority_link_terms
    }

    pub fn score_url(&self, url: &str) -> UrlScore {
        score_url(url, &self.catalog.url_patterns)
    }

    pub fn score_content(&self, text: &str, anchors: &[String]) -> ContentScore {
        score_content(
            text,
            anchors,
            &self.content_terms,
            &self.catalog.strong_indicators,
        )
    }

    /// Decides whether a page advertises an affiliate program
    ///
    /// A page qualifies when a strong indicator is present, when a catalog
    /// phrase appears inside anchor text, or when at least two distinct
    /// phrases appear in the body and the page confidence reaches
    /// `min_confidence`.
    ///
    /// # Arguments
    ///
    /// * `url` - Final URL of the page
    /// * `text` - Visible page text
    /// * `anchors` - Visible text of the page's anchors
    pub fn classify(&self, url: &str, text: &str, anchors: &[String]) -> Detection {
        let url_score = self.score_url(url);
        let content = self.score_content(text, anchors);
        let confidence = page_confidence(url_score.score, content.score);

        let reason = if !content.strong_indicators.is_empty() {
            Some(DetectionReason::StrongIndicator)
        } else if !content.anchor_matches.is_empty() {
            Some(DetectionReason::AnchorText)
        } else if content.body_matches.len() >= 2 && confidence >= self.min_confidence {
            Some(DetectionReason::MultipleMatches)
        } else {
            None
        };

        let mut signals = url_score.signals;
        signals.extend(content.body_matches);
        signals.extend(content.anchor_texts);
        signals.extend(content.strong_indicators);

        Detection {
            is_affiliate: reason.is_some(),
            reason,
            confidence,
            signals,
        }
    }
}

impl Default for AffiliateDetector {
    fn default() -> Self {
        Self::new(KeywordCatalog::builtin(), 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padding() -> String {
        "Our product helps teams ship faster with fewer bugs and happier customers. ".repeat(8)
    }

    #[test]
    fn test_anchor_rule() {
        let detector = AffiliateDetector::default();
        let detection = detector.classify(
            "https://acme.io",
            &format!("{} Become an Affiliate", padding()),
            &["Pricing".to_string(), "Become an Affiliate".to_string()],
        );
        assert!(detection.is_affiliate);
        assert_eq!(detection.reason, Some(DetectionReason::AnchorText));
        assert!(detection.signals.contains("Become an Affiliate"));
        assert!(detection.signals.contains("become an affiliate"));
    }

    #[test]
    fn test_strong_indicator_rule() {
        let detector = AffiliateDetector::default();
        let detection = detector.classify(
            "https://acme.io/login",
            &format!("{} Sign in to the affiliate dashboard.", padding()),
            &[],
        );
        assert_eq!(detection.reason, Some(DetectionReason::StrongIndicator));
    }

    #[test]
    fn test_multiple_matches_rule() {
        let detector = AffiliateDetector::default();
        let text = format!(
            "{} Our referral program pays a revenue share on every sale.",
            padding()
        );
        let detection = detector.classify("https://acme.io/about", &text, &[]);
        assert!(detection.is_affiliate);
        assert_eq!(detection.reason, Some(DetectionReason::MultipleMatches));
        assert!(detection.confidence > 0.0);
    }

    #[test]
    fn test_min_confidence_gates_multiple_matches() {
        let detector = AffiliateDetector::new(KeywordCatalog::builtin(), 0.99);
        let text = format!(
            "{} Our referral program pays a revenue share on every sale.",
            padding()
        );
        let detection = detector.classify("https://acme.io/about", &text, &[]);
        assert!(!detection.is_affiliate);
        assert_eq!(detection.reason, None);
    }

    #[test]
    fn test_single_body_match_is_not_enough() {
        let detector = AffiliateDetector::default();
        let text = format!("{} We love to earn money.", padding());
        let detection = detector.classify("https://acme.io", &text, &[]);
        assert!(!detection.is_affiliate);
        assert!(detection.signals.contains("earn money"));
    }

    #[test]
    fn test_url_signal_recorded() {
        let detector = AffiliateDetector::default();
        let detection = detector.classify("https://acme.io/partners", &padding(), &[]);
        assert!(!detection.is_affiliate);
        assert!(detection.confidence > 0.0);
        assert!(detection.signals.contains("/partners"));
    }

    #[test]
    fn test_deterministic() {
        let detector = AffiliateDetector::default();
        let text = format!("{} programa de afiliados y programa de socios", padding());
        let anchors = vec!["Partner with us".to_string()];
        let a = detector.classify("https://acme.io/partner", &text, &anchors);
        let b = detector.classify("https://acme.io/partner", &text, &anchors);
        assert_eq!(a, b);
    }
}
