//! Best-effort compliance score extraction from model prose.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A score read out of free text.
///
/// Serializes as `{"parsed": 72}` or `"unparseable"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceScore {
    Parsed(u8),
    Unparseable,
}

impl ComplianceScore {
    pub fn value(self) -> Option<u8> {
        match self {
            ComplianceScore::Parsed(n) => Some(n),
            ComplianceScore::Unparseable => None,
        }
    }
}

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"(\d{1,3}(?:\.\d+)?)\s*/\s*100\b", r"(\d{1,3}(?:\.\d+)?)\s*%"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

fn first_score(text: &str) -> Option<u8> {
    patterns().iter().find_map(|re| {
        re.captures_iter(text).find_map(|c| {
            let value: f64 = c.get(1)?.as_str().parse().ok()?;
            (0.0..=100.0).contains(&value).then(|| value.round() as u8)
        })
    })
}

/// Find an `NN/100` or `NN%` score.
///
/// Text after the first "score" mention is searched first, so a percentage
/// quoted in a finding does not shadow the headline score.
pub fn parse_score(text: &str) -> ComplianceScore {
    let lower = text.to_ascii_lowercase();
    let after_heading = lower
        .find("score")
        .and_then(|i| text.get(i..))
        .and_then(first_score);
    match after_heading.or_else(|| first_score(text)) {
        Some(n) => ComplianceScore::Parsed(n),
        None => ComplianceScore::Unparseable,
    }
}
