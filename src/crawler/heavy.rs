//! Heavy fetch strategy: headless browser automation
//!
//! Each fetch leases a browser, opens a blank page with a fresh profile,
//! navigates under a timeout, optionally scrolls and moves the mouse like a
//! visitor would, then reads the rendered HTML.

use super::browser_pool::{BrowserPool, BrowserSettings};
use super::fetcher::{FetchError, FetchOutcome, FetchStrategy};
use super::profile::BrowserProfile;
use crate::model::FetchMethod;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::Page;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SCROLL_STEPS: u32 = 3;

/// Browser-backed fetcher sharing a [`BrowserPool`]
pub struct BrowserFetcher {
    pool: Arc<BrowserPool>,
    simulate_human: bool,
}

impl BrowserFetcher {
    pub fn new(pool: Arc<BrowserPool>, simulate_human: bool) -> Self {
        Self {
            pool,
            simulate_human,
        }
    }

    pub fn pool(&self) -> &Arc<BrowserPool> {
        &self.pool
    }

    async fn render(
        &self,
        page: &Page,
        url: &str,
        profile: &BrowserProfile,
        settings: &BrowserSettings,
    ) -> Result<FetchOutcome, FetchError> {
        page.set_user_agent(identity_override(profile))
            .await
            .map_err(|e| FetchError::Automation(format!("failed to set user agent: {}", e)))?;

        let headers = Headers::new(serde_json::json!({
            "Accept-Language": profile.accept_language,
            "Upgrade-Insecure-Requests": "1",
        }));
        if let Err(e) = page.execute(SetExtraHttpHeadersParams::new(headers)).await {
            debug!("Could not set extra headers for {}: {}", url, e);
        }

        match tokio::time::timeout(settings.navigation_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(FetchError::Automation(format!(
                    "navigation to {} failed: {}",
                    url, e
                )))
            }
            Err(_) => {
                return Err(FetchError::Automation(format!(
                    "navigation to {} timed out after {:?}",
                    url, settings.navigation_timeout
                )))
            }
        }

        if self.simulate_human {
            simulate_visitor(page, profile.viewport).await;
        }

        let body = page
            .content()
            .await
            .map_err(|e| FetchError::Automation(format!("failed to read content: {}", e)))?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(FetchOutcome {
            status: 200,
            body,
            final_url,
        })
    }
}

/// User agent override carrying the profile's language and platform
fn identity_override(profile: &BrowserProfile) -> SetUserAgentOverrideParams {
    let mut identity = SetUserAgentOverrideParams::new(profile.user_agent.clone());
    identity.accept_language = Some(profile.accept_language.clone());
    identity.platform = Some(profile.platform.clone());
    identity
}

/// Scrolls through the page and moves the mouse with short random pauses
async fn simulate_visitor(page: &Page, viewport: (u32, u32)) {
    for step in 1..=SCROLL_STEPS {
        let (x, y, pause) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(0..viewport.0),
                rng.gen_range(0..viewport.1),
                rng.gen_range(150..450),
            )
        };

        let script = format!(
            "window.scrollTo(0, document.body.scrollHeight * {step} / {SCROLL_STEPS}); \
             document.dispatchEvent(new MouseEvent('mousemove', {{clientX: {x}, clientY: {y}, bubbles: true}}));"
        );
        if let Err(e) = page.evaluate(script).await {
            debug!("Visitor simulation step failed: {}", e);
            return;
        }
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }
}

#[async_trait]
impl FetchStrategy for BrowserFetcher {
    fn method(&self) -> FetchMethod {
        FetchMethod::Heavy
    }

    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let lease = self.pool.acquire().await?;
        let settings = self.pool.settings().clone();

        let opened = match lease.browser() {
            Some(browser) => browser
                .new_page("about:blank")
                .await
                .map_err(|e| format!("failed to open page: {}", e)),
            None => Err("lease has no browser".to_string()),
        };
        let page = match opened {
            Ok(page) => page,
            Err(message) => {
                // a browser that cannot open a tab has most likely crashed
                lease.release(false).await;
                return Err(FetchError::Automation(message));
            }
        };

        let profile = BrowserProfile::random();
        let result = self.render(&page, url, &profile, &settings).await;

        let page_closed = match page.close().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to close page for {}: {}", url, e);
                false
            }
        };

        lease.release(page_closed).await;
        result
    }
}
