//! Bounded pool of headless browsers for the heavy strategy
//!
//! The pool owns every browser process. A fetch leases one browser for its
//! whole duration, so a browser never serves two fetches at once. Browsers are
//! recycled after a fixed number of uses and torn down on [`BrowserPool::shutdown`].

use super::fetcher::FetchError;
use crate::config::BrowserConfig as BrowserSection;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Launch parameters shared by every browser in the pool
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub pool_size: usize,
    pub navigation_timeout: Duration,
    pub max_uses: u32,
}

impl From<&BrowserSection> for BrowserSettings {
    fn from(config: &BrowserSection) -> Self {
        Self {
            headless: config.headless,
            pool_size: config.pool_size.max(1),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            max_uses: config.max_uses_per_browser.max(1),
        }
    }
}

/// A live browser process and its CDP event loop
struct PooledBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    uses: u32,
}

impl PooledBrowser {
    async fn launch(settings: &BrowserSettings) -> Result<Self, FetchError> {
        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .request_timeout(settings.navigation_timeout)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(FetchError::Automation)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Automation(format!("failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            uses: 0,
        })
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Browser wait failed: {}", e);
        }
        self.handler.abort();
    }
}

/// Why a returned browser is shut down instead of kept idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetireReason {
    Unhealthy,
    WornOut,
    PoolClosed,
}

fn retire_reason(uses: u32, max_uses: u32, healthy: bool, closed: bool) -> Option<RetireReason> {
    if closed {
        Some(RetireReason::PoolClosed)
    } else if !healthy {
        Some(RetireReason::Unhealthy)
    } else if uses >= max_uses {
        Some(RetireReason::WornOut)
    } else {
        None
    }
}

/// Bounded set of reusable browsers
pub struct BrowserPool {
    settings: BrowserSettings,
    slots: Semaphore,
    idle: Mutex<VecDeque<PooledBrowser>>,
    launched: AtomicUsize,
    closed: AtomicBool,
}

impl BrowserPool {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            slots: Semaphore::new(settings.pool_size),
            settings,
            idle: Mutex::new(VecDeque::new()),
            launched: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    /// Number of browser processes launched over the pool's lifetime
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn idle_list(&self) -> std::sync::MutexGuard<'_, VecDeque<PooledBrowser>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Waits for a free slot and leases a browser, launching one if needed
    ///
    /// # Returns
    ///
    /// * `Ok(BrowserLease)` - Exclusive use of a browser until released
    /// * `Err(FetchError::Automation)` - The pool is closed or launch failed
    pub async fn acquire(&self) -> Result<BrowserLease<'_>, FetchError> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| FetchError::Automation("browser pool is closed".to_string()))?;

        if self.is_closed() {
            return Err(FetchError::Automation("browser pool is closed".to_string()));
        }

        let reused = self.idle_list().pop_back();
        let browser = match reused {
            Some(browser) => browser,
            None => {
                let browser = PooledBrowser::launch(&self.settings).await?;
                let count = self.launched.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Launched browser #{}", count);
                browser
            }
        };

        Ok(BrowserLease {
            pool: self,
            browser: Some(browser),
            _permit: permit,
        })
    }

    /// Returns a browser to the idle list or tears it down
    ///
    /// A browser is launched only when none is idle, so leased plus idle
    /// browsers never exceed the slot count.
    async fn put_back(&self, mut browser: PooledBrowser, healthy: bool) {
        browser.uses += 1;

        if let Some(reason) =
            retire_reason(browser.uses, self.settings.max_uses, healthy, self.is_closed())
        {
            debug!("Retiring browser after {} use(s): {:?}", browser.uses, reason);
            browser.shutdown().await;
            return;
        }

        self.idle_list().push_back(browser);
    }

    /// Closes the pool and every idle browser
    ///
    /// Leased browsers are torn down when their lease ends.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.slots.close();

        let drained: Vec<PooledBrowser> = self.idle_list().drain(..).collect();
        if !drained.is_empty() {
            debug!("Closing {} idle browser(s)", drained.len());
        }
        for browser in drained {
            browser.shutdown().await;
        }
    }
}

/// Exclusive use of one pooled browser
pub struct BrowserLease<'a> {
    pool: &'a BrowserPool,
    browser: Option<PooledBrowser>,
    _permit: SemaphorePermit<'a>,
}

impl BrowserLease<'_> {
    pub fn browser(&self) -> Option<&Browser> {
        self.browser.as_ref().map(|b| &b.browser)
    }

    /// Ends the lease; an unhealthy browser is shut down instead of reused
    pub async fn release(mut self, healthy: bool) {
        if let Some(browser) = self.browser.take() {
            self.pool.put_back(browser, healthy).await;
        }
    }
}

impl Drop for BrowserLease<'_> {
    fn drop(&mut self) {
        // reached when the fetch task is aborted mid-lease
        if let Some(browser) = self.browser.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(browser.shutdown());
                }
                Err(_) => warn!("Dropping a leased browser outside the runtime"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BrowserSettings {
        BrowserSettings {
            headless: true,
            pool_size: 2,
            navigation_timeout: Duration::from_secs(5),
            max_uses: 3,
        }
    }

    #[test]
    fn test_settings_from_config_clamps_zeroes() {
        let mut section = BrowserSection::default();
        section.pool_size = 0;
        section.max_uses_per_browser = 0;
        section.navigation_timeout_secs = 12;

        let settings = BrowserSettings::from(&section);
        assert_eq!(settings.pool_size, 1);
        assert_eq!(settings.max_uses, 1);
        assert_eq!(settings.navigation_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_browser_kept_until_max_uses() {
        assert_eq!(retire_reason(1, 3, true, false), None);
        assert_eq!(retire_reason(2, 3, true, false), None);
        assert_eq!(retire_reason(3, 3, true, false), Some(RetireReason::WornOut));
    }

    #[test]
    fn test_unhealthy_browser_retired_immediately() {
        assert_eq!(retire_reason(1, 3, false, false), Some(RetireReason::Unhealthy));
    }

    #[test]
    fn test_closed_pool_retires_every_browser() {
        assert_eq!(retire_reason(1, 3, true, true), Some(RetireReason::PoolClosed));
        assert_eq!(retire_reason(5, 3, false, true), Some(RetireReason::PoolClosed));
    }

    #[tokio::test]
    async fn test_acquire_after_shutdown_fails_without_launching() {
        let pool = BrowserPool::new(settings());
        pool.shutdown().await;
        assert!(pool.is_closed());

        match pool.acquire().await {
            Err(FetchError::Automation(message)) => assert!(message.contains("closed")),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("closed pool handed out a browser"),
        }
        assert_eq!(pool.launched(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let pool = BrowserPool::new(settings());
        pool.shutdown().await;
        pool.shutdown().await;
        assert!(pool.is_closed());
        assert_eq!(pool.launched(), 0);
    }
}
