use super::body::{self, BodyDigest};
use super::{ErrorKind, Probe, ProbeResult, Target};
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = concat!("pulsecheck/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_ACCEPT: &str = "application/json,text/html,text/plain";

/// Most body bytes kept in memory for keyword and preview inspection.
pub const MAX_INSPECT_BYTES: usize = 64 * 1024;

/// Request and body-inspection settings for [`HttpProbe`].
#[derive(Debug, Clone)]
pub struct HttpProbeOptions {
    pub user_agent: String,
    pub accept: String,
    pub keywords: Vec<String>,
    pub preview_lines: usize,
}

impl Default for HttpProbeOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            keywords: Vec::new(),
            preview_lines: 0,
        }
    }
}

/// HTTP GET probe recording status code, latency and body size.
pub struct HttpProbe {
    client: Client,
    accept: String,
    keywords: Vec<String>,
    preview_lines: usize,
}

impl HttpProbe {
    pub fn new(options: HttpProbeOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            accept: options.accept,
            keywords: options.keywords,
            preview_lines: options.preview_lines,
        })
    }

    fn inspect(&self, target: &Target, bytes: &[u8]) -> Option<BodyDigest> {
        if self.keywords.is_empty() && self.preview_lines == 0 {
            return None;
        }

        let text = String::from_utf8_lossy(bytes);
        let digest = body::digest(&text, &self.keywords, self.preview_lines);
        for (i, line) in digest.preview.iter().enumerate() {
            debug!(url = %target, line = i + 1, "{}", line);
        }
        Some(digest).filter(|d| !d.is_empty())
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &Target, timeout: Duration) -> ProbeResult {
        let timestamp = Utc::now();
        let start = Instant::now();

        let sent = self
            .client
            .get(target.as_str())
            .header(ACCEPT, self.accept.as_str())
            .timeout(timeout)
            .send()
            .await;

        let mut result = match sent {
            Ok(response) => {
                let status_code = response.status().as_u16();

                match read_body(response, MAX_INSPECT_BYTES).await {
                    Ok((bytes, body_size)) => {
                        let latency_ms = as_ms(start.elapsed());
                        let result =
                            ProbeResult::from_status(target.clone(), status_code, latency_ms, body_size);

                        match result.is_success().then(|| self.inspect(target, &bytes)).flatten() {
                            Some(digest) => result.with_digest(digest),
                            None => result,
                        }
                    }
                    Err(e) => ProbeResult::failure(
                        target.clone(),
                        error_kind(&e),
                        as_ms(start.elapsed()),
                        Some(e.to_string()),
                    ),
                }
            }
            Err(e) => ProbeResult::failure(
                target.clone(),
                error_kind(&e),
                as_ms(start.elapsed()),
                Some(e.to_string()),
            ),
        };

        result.timestamp = timestamp;
        result
    }
}

/// Stream the body, keeping at most `limit` bytes. The reported size is
/// `Content-Length` when present, else the number of bytes received; with a
/// declared length the read stops once `limit` bytes are kept.
async fn read_body(mut response: Response, limit: usize) -> Result<(Vec<u8>, u64), reqwest::Error> {
    let declared = response.content_length();
    let mut kept = Vec::new();
    let mut received = 0u64;

    while let Some(chunk) = response.chunk().await? {
        received += chunk.len() as u64;
        let room = limit.saturating_sub(kept.len()).min(chunk.len());
        kept.extend_from_slice(&chunk[..room]);
        if declared.is_some() && kept.len() >= limit {
            break;
        }
    }

    Ok((kept, declared.unwrap_or(received)))
}

fn error_kind(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        ErrorKind::Timeout
    } else if e.is_connect() {
        ErrorKind::Connect
    } else if e.is_body() || e.is_decode() {
        ErrorKind::Body
    } else {
        ErrorKind::Request
    }
}

pub(crate) fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
