//! TOML configuration for the monitor.
//!
//! Values come from, in order of precedence: command-line flags, an explicit
//! `--config` file, the file named by `PULSECHECK_CONFIG`, `./pulsecheck.toml`,
//! and finally compiled-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::probes::http::{HttpProbeOptions, DEFAULT_ACCEPT, DEFAULT_USER_AGENT};
use crate::probes::Target;
use crate::scheduler::RunPlan;

pub const CONFIG_ENV: &str = "PULSECHECK_CONFIG";
pub const LOCAL_CONFIG: &str = "pulsecheck.toml";

/// Fatal configuration problems, reported before any probe runs.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no targets configured")]
    EmptyTargets,

    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("{field} must be a positive number of seconds, got {value}")]
    InvalidSeconds { field: &'static str, value: f64 },

    #[error("max_rounds must be at least 1")]
    ZeroMaxRounds,

    #[error("report_every must be at least 1")]
    ZeroReportEvery,
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: ScheduleConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The effective configuration and where it came from.
///
/// Loading happens before the tracing subscriber exists, so anything worth
/// reporting about the search is carried here and logged by the caller.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: MonitorConfig,
    /// File the configuration was read from, `None` for compiled-in defaults.
    pub source: Option<PathBuf>,
    /// `PULSECHECK_CONFIG` named a file that could not be loaded.
    pub env_failure: Option<(PathBuf, anyhow::Error)>,
}

impl LoadedConfig {
    /// Log the outcome of the config search.
    pub fn report(&self) {
        if let Some((path, e)) = &self.env_failure {
            warn!(
                path = %path.display(),
                error = %e,
                "{} set but file could not be loaded, trying fallback",
                CONFIG_ENV
            );
        }
        match &self.source {
            Some(path) => info!(path = %path.display(), "Loaded monitor configuration"),
            None => debug!("No config file found, using compiled-in defaults"),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load `explicit` if given (errors are fatal), otherwise try the
    /// environment override and the local file, falling back to defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<LoadedConfig> {
        if let Some(path) = explicit {
            return Ok(LoadedConfig {
                config: Self::load(path)?,
                source: Some(path.to_path_buf()),
                env_failure: None,
            });
        }

        let mut env_failure = None;
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(env_path);
            match Self::load(&path) {
                Ok(config) => {
                    return Ok(LoadedConfig { config, source: Some(path), env_failure: None });
                }
                Err(e) => env_failure = Some((path, e)),
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            return Ok(LoadedConfig {
                config: Self::load(local)?,
                source: Some(local.to_path_buf()),
                env_failure,
            });
        }

        Ok(LoadedConfig { config: Self::default(), source: None, env_failure })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }

    /// Validate and convert into a schedulable plan.
    pub fn plan(&self) -> Result<RunPlan, ConfigError> {
        let m = &self.monitor;
        if m.report_every == 0 {
            return Err(ConfigError::ZeroReportEvery);
        }

        let targets = m
            .targets
            .iter()
            .map(|t| Target::parse(t))
            .collect::<Result<Vec<_>, _>>()?;

        let mut plan = RunPlan::new(targets, secs("interval", m.interval_secs)?)
            .with_timeout(secs("timeout", m.timeout_secs)?);
        if let Some(max) = m.max_rounds {
            plan = plan.with_max_rounds(max);
        }
        if let Some(d) = m.duration_secs {
            plan = plan.with_duration(secs("duration", d)?);
        }

        plan.validate()?;
        Ok(plan)
    }

    pub fn probe_timeout(&self) -> Result<Duration, ConfigError> {
        secs("timeout", self.monitor.timeout_secs)
    }

    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.health.slow_threshold_ms)
    }

    pub fn probe_options(&self) -> HttpProbeOptions {
        HttpProbeOptions {
            user_agent: self.http.user_agent.clone(),
            accept: self.http.accept.clone(),
            keywords: self.http.keywords.clone(),
            preview_lines: self.http.preview_lines,
        }
    }
}

/// Positive, finite seconds into a `Duration`.
fn secs(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::InvalidSeconds { field, value });
    }
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidSeconds { field, value })
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// URLs to poll. Bare hosts get `http://` prepended.
    pub targets: Vec<String>,
    /// Seconds between round starts.
    pub interval_secs: f64,
    /// Per-probe timeout in seconds.
    pub timeout_secs: f64,
    /// Stop after this many rounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u64>,
    /// Stop once this many seconds have passed since the first round.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Print running stats every N rounds.
    pub report_every: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            interval_secs: 2.0,
            timeout_secs: 10.0,
            max_rounds: None,
            duration_secs: None,
            report_every: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Successful responses slower than this are flagged as slow.
    pub slow_threshold_ms: u64,
    /// Keep at most this many lines in the event log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_capacity: Option<usize>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { slow_threshold_ms: 1000, log_capacity: None }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept: String,
    /// Keywords reported when found in a successful response body.
    pub keywords: Vec<String>,
    /// Leading body lines logged at debug level.
    pub preview_lines: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            keywords: ["server", "online", "status", "success", "error"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            preview_lines: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit logs as JSON lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
