//! Response body digest: keyword hits and a short preview.

use serde::{Deserialize, Serialize};

/// Lines longer than this are cut and suffixed with `...`.
const PREVIEW_LINE_MAX: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyDigest {
    /// Configured keywords found in the body (case-insensitive), in configured order.
    pub keywords: Vec<String>,
    /// First non-empty trimmed lines of the body.
    pub preview: Vec<String>,
}

impl BodyDigest {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.preview.is_empty()
    }
}

/// Scan `body` for `keywords` and take up to `preview_lines` non-empty lines
/// from the start of the body.
pub fn digest(body: &str, keywords: &[String], preview_lines: usize) -> BodyDigest {
    let lowered = body.to_lowercase();
    let keywords = keywords
        .iter()
        .filter(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
        .cloned()
        .collect();

    let preview = body
        .lines()
        .take(preview_lines)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(truncate_line)
        .collect();

    BodyDigest { keywords, preview }
}

fn truncate_line(line: &str) -> String {
    if line.chars().count() > PREVIEW_LINE_MAX {
        let cut: String = line.chars().take(PREVIEW_LINE_MAX).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}
