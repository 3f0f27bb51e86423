//! Probe executor: one HTTP request against one target, measured and classified.

pub mod body;
pub mod http;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use body::BodyDigest;
pub use http::HttpProbe;

/// An endpoint to poll. Immutable once scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Parse user input into a target URL.
    ///
    /// Input without a scheme gets `http://` prepended. The result must be an
    /// absolute http or https URL.
    pub fn parse(input: &str) -> Result<Self, crate::config::ConfigError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(crate::config::ConfigError::InvalidTarget {
                target: input.to_string(),
                reason: "empty".to_string(),
            });
        }

        let url = if has_scheme(trimmed) {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let parsed = reqwest::Url::parse(&url).map_err(|e| crate::config::ConfigError::InvalidTarget {
            target: input.to_string(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(Self(url)),
            other => Err(crate::config::ConfigError::InvalidTarget {
                target: input.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }

    /// Wrap a string without validation. Used by tests and custom probes
    /// whose targets are not URLs.
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// True when `input` starts with `scheme://`. A `://` inside a path or
/// query does not count.
fn has_scheme(input: &str) -> bool {
    input.split_once("://").is_some_and(|(scheme, _)| {
        scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a probe failed. Failures are ordinary result values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "code")]
pub enum ErrorKind {
    /// No response within the probe timeout.
    Timeout,
    /// Connection refused, reset, or name resolution failed.
    Connect,
    /// Any other transport-level failure while sending the request.
    Request,
    /// The response arrived but its body could not be read.
    Body,
    /// The server answered with a 4xx or 5xx status.
    Status(u16),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Connect => write!(f, "connection failed"),
            ErrorKind::Request => write!(f, "request failed"),
            ErrorKind::Body => write!(f, "body read failed"),
            ErrorKind::Status(code) => write!(f, "http status {}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum Outcome {
    Success {
        status_code: u16,
        latency_ms: f64,
        body_size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        digest: Option<BodyDigest>,
    },
    Failure {
        error_kind: ErrorKind,
        latency_ms: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn latency_ms(&self) -> f64 {
        match self {
            Outcome::Success { latency_ms, .. } | Outcome::Failure { latency_ms, .. } => *latency_ms,
        }
    }

    /// HTTP status of the response, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Outcome::Success { status_code, .. } => Some(*status_code),
            Outcome::Failure { error_kind: ErrorKind::Status(code), .. } => Some(*code),
            Outcome::Failure { .. } => None,
        }
    }
}

/// The result of a single probe. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub target: Target,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
}

impl ProbeResult {
    /// Build a result from a completed HTTP exchange. Status >= 400 is a failure.
    pub fn from_status(target: Target, status_code: u16, latency_ms: f64, body_size: u64) -> Self {
        let outcome = if status_code >= 400 {
            Outcome::Failure {
                error_kind: ErrorKind::Status(status_code),
                latency_ms,
                message: None,
            }
        } else {
            Outcome::Success {
                status_code,
                latency_ms,
                body_size,
                digest: None,
            }
        };

        Self { target, timestamp: Utc::now(), outcome }
    }

    pub fn failure(target: Target, error_kind: ErrorKind, latency_ms: f64, message: Option<String>) -> Self {
        Self {
            target,
            timestamp: Utc::now(),
            outcome: Outcome::Failure { error_kind, latency_ms, message },
        }
    }

    pub fn with_digest(mut self, digest: BodyDigest) -> Self {
        if let Outcome::Success { digest: slot, .. } = &mut self.outcome {
            *slot = Some(digest);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Advisory health label. Never changes control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLabel {
    Healthy,
    Slow,
    ClientError,
    ServerError,
    Unreachable,
}

impl HealthLabel {
    /// Short marker appended to event log lines, empty for healthy results.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            HealthLabel::Healthy => None,
            HealthLabel::Slow => Some("slow"),
            HealthLabel::ClientError => Some("client error"),
            HealthLabel::ServerError => Some("server error"),
            HealthLabel::Unreachable => Some("unreachable"),
        }
    }
}

impl fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker().unwrap_or("healthy"))
    }
}

/// Label a result: status >= 500 is a server error, 4xx a client error,
/// anything slower than `slow_threshold` is slow even on 2xx.
pub fn classify(outcome: &Outcome, slow_threshold: Duration) -> HealthLabel {
    match outcome.status_code() {
        Some(code) if code >= 500 => HealthLabel::ServerError,
        Some(code) if code >= 400 => HealthLabel::ClientError,
        Some(_) if outcome.latency_ms() > slow_threshold.as_secs_f64() * 1000.0 => HealthLabel::Slow,
        Some(_) => HealthLabel::Healthy,
        None => HealthLabel::Unreachable,
    }
}

/// Trait for all probes. Implementations must fold every failure into the
/// returned [`ProbeResult`]; nothing is propagated.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &Target, timeout: Duration) -> ProbeResult;
}
