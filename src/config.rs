//! Engine settings and the session activity log.

use crate::dataops::{DEFAULT_CHANGE_DESCRIPTION, RangePolicy};
use crate::error::{DataOpsError, Result, ResultExt as _};
use crate::integrity::HashAlgorithm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

pub const ENV_HASH_ALGORITHM: &str = "INSIGHT_DATAOPS_HASH_ALGORITHM";
pub const ENV_OUT_OF_RANGE: &str = "INSIGHT_DATAOPS_OUT_OF_RANGE";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Activity entries kept before the oldest are evicted (default: 100)
    pub activity_log_capacity: usize,
    /// Rows included in a planner request (default: 10)
    pub planner_sample_rows: usize,
    /// Upper bound on one planner call, in seconds (default: 30)
    pub planner_timeout_secs: u64,
    pub hash_algorithm: HashAlgorithm,
    /// Handling of edit/delete targets that match no row
    pub out_of_range: RangePolicy,
    pub default_change_description: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            activity_log_capacity: 100,
            planner_sample_rows: 10,
            planner_timeout_secs: 30,
            hash_algorithm: HashAlgorithm::default(),
            out_of_range: RangePolicy::default(),
            default_change_description: DEFAULT_CHANGE_DESCRIPTION.to_owned(),
        }
    }
}

impl Settings {
    /// Platform config location, e.g. `~/.config/insight-dataops/settings.json` on Linux.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| DataOpsError::Other("Failed to determine config directory".to_owned()))?;
        Ok(base.join("insight-dataops").join("settings.json"))
    }

    /// Load settings from `path`, falling back to defaults when the file does not exist.
    /// Environment overrides are applied on top.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings {}", path.display()))?;
            serde_json::from_str::<Self>(&content)
                .with_context(|| format!("Failed to parse settings {}", path.display()))?
        } else {
            tracing::debug!("No settings at {}, using defaults", path.display());
            Self::default()
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_HASH_ALGORITHM) {
            match raw.parse() {
                Ok(algorithm) => self.hash_algorithm = algorithm,
                Err(e) => tracing::warn!("Ignoring {ENV_HASH_ALGORITHM}: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_OUT_OF_RANGE) {
            match raw.trim().to_lowercase().as_str() {
                "tolerate" => self.out_of_range = RangePolicy::Tolerate,
                "reject" => self.out_of_range = RangePolicy::Reject,
                other => tracing::warn!("Ignoring {ENV_OUT_OF_RANGE}: unknown policy '{other}'"),
            }
        }
    }

    pub fn planner_timeout(&self) -> Duration {
        Duration::from_secs(self.planner_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Info,
    Action,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub agent: String,
    pub message: String,
    pub kind: ActivityKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ActivityEntry {
    pub fn new(agent: impl Into<String>, message: impl Into<String>, kind: ActivityKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent: agent.into(),
            message: message.into(),
            kind,
            timestamp: Utc::now(),
            correlation_id: None,
            duration_ms: None,
        }
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

/// Bounded ring buffer of recent activity. The oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: ActivityEntry) {
        match entry.kind {
            ActivityKind::Info | ActivityKind::Action => tracing::info!(
                agent = %entry.agent,
                correlation_id = ?entry.correlation_id,
                "{}",
                entry.message
            ),
            ActivityKind::Error => tracing::error!(
                agent = %entry.agent,
                correlation_id = ?entry.correlation_id,
                "{}",
                entry.message
            ),
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn log(&mut self, agent: &str, message: impl Into<String>, kind: ActivityKind) {
        self.push(ActivityEntry::new(agent, message, kind));
    }

    /// Newest first.
    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter().rev()
    }

    pub fn latest(&self) -> Option<&ActivityEntry> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(Settings::default().activity_log_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip_through_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            hash_algorithm: HashAlgorithm::Sha256,
            out_of_range: RangePolicy::Reject,
            planner_sample_rows: 5,
            ..Settings::default()
        };
        settings.save(&path)?;

        let mut loaded: Settings = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        loaded.apply_overrides(|_| None);
        assert_eq!(loaded, settings);
        Ok(())
    }

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let settings = Settings::load(dir.path().join("absent.json"))?;
        assert_eq!(settings.activity_log_capacity, 100);
        assert_eq!(settings.planner_timeout(), Duration::from_secs(30));
        assert_eq!(settings.default_change_description, "Applied transformations");
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let settings: Settings = serde_json::from_str(r#"{"planner_timeout_secs": 5}"#)?;
        assert_eq!(settings.planner_timeout_secs, 5);
        assert_eq!(settings.planner_sample_rows, 10);
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ nope")?;
        assert!(Settings::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_overrides() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| match key {
            ENV_HASH_ALGORITHM => Some("sha256".to_owned()),
            ENV_OUT_OF_RANGE => Some("REJECT".to_owned()),
            _ => None,
        });
        assert_eq!(settings.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(settings.out_of_range, RangePolicy::Reject);

        settings.apply_overrides(|_| Some("bogus".to_owned()));
        assert_eq!(settings.hash_algorithm, HashAlgorithm::Sha256);
    }

    #[test]
    fn test_activity_log_is_bounded_and_newest_first() {
        let mut log = ActivityLog::new(3);
        for i in 0..5 {
            log.log("DataOps", format!("event {i}"), ActivityKind::Info);
        }
        assert_eq!(log.len(), 3);
        let messages: Vec<&str> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["event 4", "event 3", "event 2"]);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_activity_entry_builders() {
        let entry = ActivityEntry::new("Planner", "planned", ActivityKind::Action)
            .with_correlation_id("req-1")
            .with_duration(Duration::from_millis(42));
        assert_eq!(entry.correlation_id.as_deref(), Some("req-1"));
        assert_eq!(entry.duration_ms, Some(42));
    }
}
