//! Rotating client identities for both fetch strategies

use rand::seq::SliceRandom;
use rand::Rng;

const USER_AGENTS: &[(&str, &str)] = &[
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Win32",
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "MacIntel",
    ),
    (
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        "Linux x86_64",
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "MacIntel",
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        "Win32",
    ),
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en-US,en;q=0.8,fr;q=0.6",
    "en-US,en;q=0.9,de;q=0.7",
    "en-US,en;q=0.9,es;q=0.8",
];

const VIEWPORTS: &[(u32, u32)] = &[(1920, 1080), (1366, 768), (1536, 864), (1440, 900), (1280, 800)];

pub const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Identity presented to a site for one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept_language: String,
    pub platform: String,
    pub viewport: (u32, u32),
}

impl BrowserProfile {
    /// Picks a fresh profile from the built-in pool
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let (user_agent, platform) = USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        let accept_language = ACCEPT_LANGUAGES
            .choose(&mut rng)
            .copied()
            .unwrap_or(ACCEPT_LANGUAGES[0]);
        let (width, height) = VIEWPORTS.choose(&mut rng).copied().unwrap_or(VIEWPORTS[0]);

        // small jitter so the window size is not an exact fingerprint
        let viewport = (width - rng.gen_range(0..16), height - rng.gen_range(0..16));

        Self {
            user_agent: user_agent.to_string(),
            accept_language: accept_language.to_string(),
            platform: platform.to_string(),
            viewport,
        }
    }
}
