//! Resource self-throttling between batches
//!
//! RSS comes from `/proc/self/statm` and CPU time from `/proc/self/stat`.
//! On other platforms both read as zero and the crawler never backs off.

use crate::config::ThrottleConfig;
use std::time::Instant;

/// Fraction of the memory limit that triggers a backoff
const MEMORY_HIGH_WATER: f64 = 0.9;

/// Kernel clock ticks per second; 100 on every mainstream Linux build
const CLOCK_TICKS: f64 = 100.0;

const PAGE_KB: u64 = 4;

/// Resource usage at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResourceSample {
    pub rss_mb: u64,
    /// Process CPU since the previous sample, 100 meaning one full core
    pub cpu_percent: f64,
}

impl ResourceSample {
    /// Whether the crawler should pause before the next batch
    pub fn exceeds(&self, limits: &ThrottleConfig) -> bool {
        let memory_limit = limits.memory_limit_mb as f64 * MEMORY_HIGH_WATER;
        self.rss_mb as f64 > memory_limit || self.cpu_percent > limits.cpu_limit_percent
    }
}

/// Samples the process's own resource usage
#[derive(Debug)]
pub struct ResourceMonitor {
    last_cpu_ticks: u64,
    last_sampled: Instant,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        Self {
            last_cpu_ticks: read_cpu_ticks().unwrap_or(0),
            last_sampled: Instant::now(),
        }
    }

    /// Reads current RSS and CPU usage since the last call
    pub fn sample(&mut self) -> ResourceSample {
        let now = Instant::now();
        let ticks = read_cpu_ticks().unwrap_or(self.last_cpu_ticks);
        let elapsed = now.duration_since(self.last_sampled).as_secs_f64();

        let cpu_percent = if elapsed > 0.0 {
            let used = ticks.saturating_sub(self.last_cpu_ticks) as f64 / CLOCK_TICKS;
            used / elapsed * 100.0
        } else {
            0.0
        };

        self.last_cpu_ticks = ticks;
        self.last_sampled = now;

        ResourceSample {
            rss_mb: read_rss_mb().unwrap_or(0),
            cpu_percent,
        }
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
fn read_rss_mb() -> Option<u64> {
    let content = std::fs::read_to_string("/proc/self/statm").ok()?;
    parse_statm_rss_mb(&content)
}

#[cfg(not(target_os = "linux"))]
fn read_rss_mb() -> Option<u64> {
    None
}

#[cfg(target_os = "linux")]
fn read_cpu_ticks() -> Option<u64> {
    let content = std::fs::read_to_string("/proc/self/stat").ok()?;
    parse_stat_cpu_ticks(&content)
}

#[cfg(not(target_os = "linux"))]
fn read_cpu_ticks() -> Option<u64> {
    None
}

/// Resident pages (second field of statm) converted to MB
fn parse_statm_rss_mb(statm: &str) -> Option<u64> {
    let pages = statm.split_whitespace().nth(1)?.parse::<u64>().ok()?;
    Some(pages * PAGE_KB / 1024)
}

/// User plus system time in clock ticks (fields 14 and 15 of stat)
///
/// The command name in field 2 may contain spaces, so fields are counted
/// from the closing parenthesis.
fn parse_stat_cpu_ticks(stat: &str) -> Option<u64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime = fields.get(11)?.parse::<u64>().ok()?;
    let stime = fields.get(12)?.parse::<u64>().ok()?;
    Some(utime + stime)
}
