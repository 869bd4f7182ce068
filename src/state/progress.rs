//! Durable record of completed targets and aggregate counters
//!
//! The progress file is rewritten after every completed target through a
//! temp file and a rename, so an interrupted run never leaves a torn file.

use crate::model::{CrawlResult, FetchMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const STAT_OK: &str = "OK";
pub const STAT_ERROR: &str = "ERROR";
pub const STAT_AFFILIATE_FOUND: &str = "AFFILIATE_FOUND";
pub const STAT_LIGHTWEIGHT_USED: &str = "LIGHTWEIGHT_USED";
pub const STAT_HEAVY_USED: &str = "HEAVY_USED";
pub const STAT_PAGES_CHECKED: &str = "PAGES_CHECKED";

/// Progress store errors
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a target ended in error, kept for re-testing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub status_code: String,
    pub method_used: FetchMethod,
    pub last_tested: DateTime<Utc>,
    #[serde(default)]
    pub pages_checked: u32,
    /// Set for validation failures, which were never counted against a method
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unfetched: bool,
}

/// The persisted progress document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    #[serde(default)]
    pub processed_tools: BTreeSet<String>,

    #[serde(default)]
    pub error_tools: BTreeSet<String>,

    #[serde(default)]
    pub error_details: BTreeMap<String, ErrorDetail>,

    #[serde(default)]
    pub stats: BTreeMap<String, u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

fn method_stat(method: FetchMethod) -> &'static str {
    match method {
        FetchMethod::Lightweight => STAT_LIGHTWEIGHT_USED,
        FetchMethod::Heavy => STAT_HEAVY_USED,
    }
}

impl ProgressState {
    pub fn is_processed(&self, name: &str) -> bool {
        self.processed_tools.contains(name)
    }

    pub fn stat(&self, key: &str) -> u64 {
        self.stats.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &str) {
        *self.stats.entry(key.to_string()).or_insert(0) += 1;
    }

    fn add(&mut self, key: &str, amount: u64) {
        *self.stats.entry(key.to_string()).or_insert(0) += amount;
    }

    fn decrement(&mut self, key: &str, amount: u64) {
        if let Some(value) = self.stats.get_mut(key) {
            *value = value.saturating_sub(amount);
        }
    }

    /// Folds one completed target into the state
    ///
    /// # Returns
    ///
    /// `false` when the target was already processed; nothing is counted twice.
    pub fn record(&mut self, result: &CrawlResult, now: DateTime<Utc>) -> bool {
        if !self.processed_tools.insert(result.tool_name.clone()) {
            return false;
        }

        if result.is_ok() {
            self.bump(STAT_OK);
        } else {
            self.bump(STAT_ERROR);
            self.error_tools.insert(result.tool_name.clone());
            self.error_details.insert(
                result.tool_name.clone(),
                ErrorDetail {
                    status_code: result.status_code.to_string(),
                    method_used: result.method_used,
                    last_tested: now,
                    pages_checked: result.pages_checked,
                    unfetched: !result.fetch_attempted,
                },
            );
        }

        if result.affiliate_found {
            self.bump(STAT_AFFILIATE_FOUND);
        }
        if result.fetch_attempted {
            self.bump(method_stat(result.method_used));
        }
        self.add(STAT_PAGES_CHECKED, u64::from(result.pages_checked));
        self.last_updated = Some(now);
        true
    }

    /// Forgets every error target so the next run crawls them again
    ///
    /// The counters each target contributed are subtracted so the re-run does
    /// not double-count.
    ///
    /// # Returns
    ///
    /// Names of the targets that were reset
    pub fn retest_errors(&mut self) -> Vec<String> {
        let names: Vec<String> = std::mem::take(&mut self.error_tools).into_iter().collect();

        for name in &names {
            self.processed_tools.remove(name);
            self.decrement(STAT_ERROR, 1);

            match self.error_details.remove(name) {
                Some(detail) => {
                    if !detail.unfetched {
                        self.decrement(method_stat(detail.method_used), 1);
                    }
                    self.decrement(STAT_PAGES_CHECKED, u64::from(detail.pages_checked));
                }
                None => warn!("No error details for {}, method counters left as is", name),
            }
        }

        if !names.is_empty() {
            self.last_updated = Some(Utc::now());
        }
        names
    }
}

/// Shared, serialized access to the progress file
pub struct ProgressStore {
    path: PathBuf,
    state: Mutex<ProgressState>,
}

impl ProgressStore {
    /// Opens the store, starting empty when the file is missing or unreadable
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Self::load_state(&path).await;
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Reads a progress file, tolerating absence and corruption
    pub async fn load_state(path: &Path) -> ProgressState {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No progress file at {}, starting fresh", path.display());
                return ProgressState::default();
            }
            Err(e) => {
                warn!(
                    "Could not read progress file {}: {}; starting fresh",
                    path.display(),
                    e
                );
                return ProgressState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    "Progress file {} is not valid ({}); starting fresh",
                    path.display(),
                    e
                );
                ProgressState::default()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> ProgressState {
        self.state.lock().await.clone()
    }

    pub async fn is_processed(&self, name: &str) -> bool {
        self.state.lock().await.is_processed(name)
    }

    /// Records a completed target and flushes
    ///
    /// The in-memory state is updated even when the flush fails, so a later
    /// flush still persists it.
    pub async fn record(&self, result: &CrawlResult) -> Result<bool, ProgressError> {
        let mut state = self.state.lock().await;
        let recorded = state.record(result, Utc::now());
        if recorded {
            write_atomic(&self.path, &state).await?;
        }
        Ok(recorded)
    }

    /// Stores the config hash and returns the previous one
    pub async fn set_config_hash(&self, hash: &str) -> Result<Option<String>, ProgressError> {
        let mut state = self.state.lock().await;
        let previous = state.config_hash.replace(hash.to_string());
        if previous.as_deref() != Some(hash) {
            write_atomic(&self.path, &state).await?;
        }
        Ok(previous)
    }

    /// Resets all error targets and flushes
    pub async fn retest_errors(&self) -> Result<Vec<String>, ProgressError> {
        let mut state = self.state.lock().await;
        let names = state.retest_errors();
        if !names.is_empty() {
            write_atomic(&self.path, &state).await?;
        }
        Ok(names)
    }

    pub async fn flush(&self) -> Result<(), ProgressError> {
        let state = self.state.lock().await;
        write_atomic(&self.path, &state).await
    }
}

/// Writes the state to a sibling temp file and renames it into place
async fn write_atomic(path: &Path, state: &ProgressState) -> Result<(), ProgressError> {
    let json = serde_json::to_string_pretty(state)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
