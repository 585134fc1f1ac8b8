//! Configuration for the schedule engine.
//!
//! Maps directly to `schedz.toml`. Every section is optional; missing keys
//! fall back to the values the engine was tuned with.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedzConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Schedule text loading.
    #[serde(default)]
    pub loader: LoaderConfig,
    /// Per-tick execution.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Counters and tick timing.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl SchedzConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `SchedzError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::SchedzError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether agents are ticked at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output: pretty or json.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Schedule text loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Reject a whole source on its first authoring error.
    #[serde(default)]
    pub strict: bool,
    /// Tasks a single schedule definition may list.
    #[serde(default = "default_50")]
    pub max_tasks_per_schedule: usize,
    /// Longest accepted string argument, in characters.
    #[serde(default = "default_63")]
    pub max_string_len: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_tasks_per_schedule: 50,
            max_string_len: 63,
        }
    }
}

/// Per-tick execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Task transitions a channel may make in one tick.
    #[serde(default = "default_10")]
    pub max_tasks_run: u32,
    /// Back-to-back failed schedules before a channel is forced idle.
    #[serde(default = "default_5")]
    pub max_consecutive_failures: u32,
    /// Schedule used when selection declines or a lookup misses.
    #[serde(default = "default_idle_schedule")]
    pub idle_schedule: String,
    /// Schedule behavior modules fall back to on task failure.
    #[serde(default = "default_fail_schedule")]
    pub fail_schedule: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tasks_run: 10,
            max_consecutive_failures: 5,
            idle_schedule: "SCHED_IDLE_STAND".to_string(),
            fail_schedule: "SCHED_FAIL".to_string(),
        }
    }
}

/// Counters and tick timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Update engine counters.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
    /// Per-tick wall-time budget for all agents (ms).
    #[serde(default = "default_2_0")]
    pub tick_budget_ms: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            tick_budget_ms: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_idle_schedule() -> String { "SCHED_IDLE_STAND".to_string() }
fn default_fail_schedule() -> String { "SCHED_FAIL".to_string() }
fn default_2_0() -> f64 { 2.0 }
fn default_5() -> u32 { 5 }
fn default_10() -> u32 { 10 }
fn default_50() -> usize { 50 }
fn default_63() -> usize { 63 }
