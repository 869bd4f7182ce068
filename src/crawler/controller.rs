//! Per-target crawl controller
//!
//! A target goes through at most two passes: a lightweight pass, and a heavy
//! pass when the lightweight one found nothing and a browser is available.
//! Each pass fetches the home page, classifies it, then explores discovered
//! links until it finds affiliate evidence or runs out of page budget.

use super::discover::{discover, parse_sitemap};
use super::fetcher::FetchStrategy;
use super::parser::{parse_html, ParsedPage};
use crate::detector::{AffiliateDetector, Detection};
use crate::model::{CrawlResult, CrawlResultBuilder, StatusCategory, Target};
use crate::state::{CrawlPhase, PhaseTracker};
use crate::url::normalize_target_url;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Outcome of one pass over a target
struct Pass {
    builder: CrawlResultBuilder,
    home_ok: bool,
}

/// Drives targets through the lightweight pass and the heavy fallback
#[derive(Clone)]
pub struct TargetController {
    lightweight: Arc<dyn FetchStrategy>,
    heavy: Option<Arc<dyn FetchStrategy>>,
    detector: Arc<AffiliateDetector>,
    max_pages: u32,
    use_sitemap: bool,
}

impl TargetController {
    /// Creates a controller
    ///
    /// # Arguments
    ///
    /// * `lightweight` - Strategy used for the first pass
    /// * `heavy` - Fallback strategy, `None` when the browser is disabled
    /// * `detector` - Shared affiliate detector
    /// * `max_pages` - Page budget per pass, home page included
    /// * `use_sitemap` - Whether `/sitemap.xml` feeds link discovery
    pub fn new(
        lightweight: Arc<dyn FetchStrategy>,
        heavy: Option<Arc<dyn FetchStrategy>>,
        detector: Arc<AffiliateDetector>,
        max_pages: u32,
        use_sitemap: bool,
    ) -> Self {
        Self {
            lightweight,
            heavy,
            detector,
            max_pages: max_pages.max(1),
            use_sitemap,
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.heavy.is_some()
    }

    /// Produces the result for one target
    ///
    /// Never fails: validation and fetch failures become result fields.
    pub async fn run(&self, target: &Target) -> CrawlResult {
        let url_root = match normalize_target_url(&target.url) {
            Ok(url) => url,
            Err(e) => {
                debug!("Target '{}' has an invalid URL: {}", target.name, e);
                return CrawlResult::validation_error(&target.name, &target.url);
            }
        };

        let mut sitemap: Option<Vec<Url>> = None;

        let light = self
            .run_pass(self.lightweight.as_ref(), &target.name, &url_root, &mut sitemap)
            .await;
        if light.builder.is_affiliate_found() {
            return light.builder.finish();
        }

        let Some(heavy) = &self.heavy else {
            return light.builder.finish();
        };

        debug!("No evidence for '{}' with lightweight fetch, falling back to browser", target.name);
        let heavy = self
            .run_pass(heavy.as_ref(), &target.name, &url_root, &mut sitemap)
            .await;

        let (mut primary, secondary) = if !heavy.home_ok && light.home_ok {
            (light.builder, heavy.builder)
        } else {
            (heavy.builder, light.builder)
        };
        primary.merge_evidence(&secondary.finish());
        primary.finish()
    }

    async fn run_pass(
        &self,
        strategy: &dyn FetchStrategy,
        name: &str,
        url_root: &str,
        sitemap: &mut Option<Vec<Url>>,
    ) -> Pass {
        let mut phase = PhaseTracker::new();
        let mut builder = CrawlResultBuilder::new(name, url_root, strategy.method());

        enter(&mut phase, CrawlPhase::FetchHome);
        let home = match strategy.fetch(url_root).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(
                    "Home page of '{}' failed with {} fetch ({}): {}",
                    name,
                    strategy.method(),
                    e.kind(),
                    e
                );
                builder.set_status(e.status_category());
                enter(&mut phase, CrawlPhase::FetchFailed);
                enter(&mut phase, CrawlPhase::Done);
                return Pass {
                    builder,
                    home_ok: false,
                };
            }
        };

        builder.set_status(StatusCategory::Http(home.status));
        builder.page_checked();
        enter(&mut phase, CrawlPhase::Classify);

        let base = match Url::parse(&home.final_url).or_else(|_| Url::parse(url_root)) {
            Ok(base) => base,
            Err(e) => {
                warn!("Cannot resolve links for '{}': {}", name, e);
                enter(&mut phase, CrawlPhase::Done);
                return Pass {
                    builder,
                    home_ok: true,
                };
            }
        };

        let page = parse_html(&home.body, &base);
        let detection = self.inspect(&mut builder, &base, &page);
        if detection.is_affiliate {
            builder.mark_affiliate(url_root, detection.confidence);
            enter(&mut phase, CrawlPhase::Done);
            return Pass {
                builder,
                home_ok: true,
            };
        }

        let sitemap_urls = self.sitemap_urls(&base, sitemap).await;
        let budget = self.max_pages.saturating_sub(builder.pages_checked()) as usize;
        let links = discover(
            &page,
            &base,
            &sitemap_urls,
            self.detector.priority_terms(),
            budget,
        );

        for link in links {
            if builder.pages_checked() >= self.max_pages {
                break;
            }
            enter(&mut phase, CrawlPhase::ExploreLinks);

            let outcome = match strategy.fetch(link.as_str()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Skipping {} for '{}': {}", link, name, e);
                    continue;
                }
            };
            builder.page_checked();

            let page_url = Url::parse(&outcome.final_url).unwrap_or_else(|_| link.clone());
            let page = parse_html(&outcome.body, &page_url);
            let detection = self.inspect(&mut builder, &link, &page);
            if detection.is_affiliate {
                builder.mark_affiliate(link.as_str(), detection.confidence);
                break;
            }
        }

        enter(&mut phase, CrawlPhase::Done);
        Pass {
            builder,
            home_ok: true,
        }
    }

    /// Classifies a page and folds its evidence into the builder
    fn inspect(&self, builder: &mut CrawlResultBuilder, url: &Url, page: &ParsedPage) -> Detection {
        let detection = self
            .detector
            .classify(url.as_str(), &page.text, &page.anchor_labels());
        debug!(
            "Checked {} (confidence {:.2}, affiliate: {})",
            url, detection.confidence, detection.is_affiliate
        );

        builder.add_emails(page.emails.iter().cloned());
        builder.add_keywords(detection.signals.iter().cloned());
        builder.observe_confidence(detection.confidence);
        detection
    }

    /// Sitemap links of the site, fetched at most once per target
    async fn sitemap_urls(&self, base: &Url, cache: &mut Option<Vec<Url>>) -> Vec<Url> {
        if !self.use_sitemap {
            return Vec::new();
        }
        if let Some(urls) = cache {
            return urls.clone();
        }

        let urls = match self.lightweight.fetch_sitemap(base).await {
            Some(xml) => parse_sitemap(&xml),
            None => Vec::new(),
        };
        *cache = Some(urls.clone());
        urls
    }
}

fn enter(phase: &mut PhaseTracker, next: CrawlPhase) {
    if let Err(e) = phase.advance(next) {
        warn!("{}", e);
    }
}
