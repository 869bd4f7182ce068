//! Phases of a single target's crawl pass
use std::fmt;

/// A pass moves `Start → FetchHome → (Classify | FetchFailed) →
/// [ExploreLinks]* → Done`. The lightweight and heavy passes each walk this
/// sequence once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Nothing fetched yet
    Start,

    /// Fetching the target's home page
    FetchHome,

    /// Running the detector on the home page
    Classify,

    /// The home page fetch failed
    FetchFailed,

    /// Visiting discovered internal links
    ExploreLinks,

    /// The pass is over
    Done,
}

impl CrawlPhase {
    /// Returns true if this is the terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if moving from this phase to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;
        matches!(
            (self, next),
            (Start, FetchHome)
                | (FetchHome, Classify)
                | (FetchHome, FetchFailed)
                | (Classify, ExploreLinks)
                | (Classify, Done)
                | (ExploreLinks, ExploreLinks)
                | (ExploreLinks, Done)
                | (FetchFailed, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::FetchHome => "fetch_home",
            Self::Classify => "classify",
            Self::FetchFailed => "fetch_failed",
            Self::ExploreLinks => "explore_links",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid phase transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: CrawlPhase,
    pub to: CrawlPhase,
}

/// Current phase of a pass, checked against the transition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTracker {
    current: CrawlPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: CrawlPhase::Start,
        }
    }

    pub fn current(&self) -> CrawlPhase {
        self.current
    }

    /// Moves to `next`; an illegal move leaves the phase unchanged
    pub fn advance(&mut self, next: CrawlPhase) -> Result<(), InvalidTransition> {
        if !self.current.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        self.current = next;
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
