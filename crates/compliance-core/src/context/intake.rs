//! Input intake: cut oversized documents to a safe size before analysis.

use crate::context::budget::{CHARS_PER_TOKEN, estimate_tokens};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default safe input size in estimated tokens.
pub const DEFAULT_SAFE_INPUT_TOKENS: usize = 12_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedInput {
    pub text: String,
    pub truncated: bool,
    pub original_token_estimate: usize,
    /// Set when `truncated` is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Truncation flags as they appear in a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation_notice: Option<String>,
    pub original_token_estimate: usize,
}

impl Truncation {
    /// Combine the flags of two inputs analyzed together.
    pub fn merge(self, other: Truncation) -> Truncation {
        let truncation_notice = match (self.truncation_notice, other.truncation_notice) {
            (Some(a), Some(b)) => Some(format!("{a}\n{b}")),
            (a, b) => a.or(b),
        };
        Truncation {
            truncated: self.truncated || other.truncated,
            truncation_notice,
            original_token_estimate: self.original_token_estimate + other.original_token_estimate,
        }
    }
}

impl PreparedInput {
    pub fn truncation(&self) -> Truncation {
        Truncation {
            truncated: self.truncated,
            truncation_notice: self.notice.clone(),
            original_token_estimate: self.original_token_estimate,
        }
    }

    /// Input that passed through unchanged.
    pub fn untouched(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            original_token_estimate: estimate_tokens(&text),
            text,
            truncated: false,
            notice: None,
        }
    }
}

fn truncation_notice(original_tokens: usize, safe_limit_tokens: usize) -> String {
    format!(
        "[Input truncated: the document was ~{original_tokens} tokens, above the safe limit of \
         {safe_limit_tokens} tokens. Only the first {} characters were analyzed; reduce the \
         document size or use a different mode for full coverage.]",
        safe_limit_tokens * CHARS_PER_TOKEN
    )
}

/// Keep at most `safe_limit_tokens × 4` characters of `text`.
///
/// Oversized input is cut on a character boundary and a notice is
/// appended to the kept text.
pub fn prepare(text: &str, safe_limit_tokens: usize) -> PreparedInput {
    let original = estimate_tokens(text);
    if original <= safe_limit_tokens {
        return PreparedInput::untouched(text);
    }

    let keep = safe_limit_tokens * CHARS_PER_TOKEN;
    let head: String = text.chars().take(keep).collect();
    let notice = truncation_notice(original, safe_limit_tokens);
    warn!("Input truncated from ~{original} to {safe_limit_tokens} tokens");

    PreparedInput {
        text: format!("{head}\n\n{notice}"),
        truncated: true,
        original_token_estimate: original,
        notice: Some(notice),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_input_passes_through() {
        let prepared = prepare("short policy", DEFAULT_SAFE_INPUT_TOKENS);
        assert!(!prepared.truncated);
        assert_eq!(prepared.text, "short policy");
        assert!(prepared.notice.is_none());
        assert_eq!(prepared.original_token_estimate, 3);
    }

    #[test]
    fn fifty_thousand_chars_cut_to_forty_eight() {
        let text = "p".repeat(50_000);
        let prepared = prepare(&text, 12_000);
        assert!(prepared.truncated);
        assert_eq!(prepared.original_token_estimate, 12_500);

        let notice = prepared.notice.clone().unwrap();
        assert!(prepared.text.ends_with(&notice));
        let head: String = prepared.text.chars().take_while(|c| *c == 'p').collect();
        assert_eq!(head.len(), 48_000);
        assert!(notice.contains("12500"));
    }

    #[test]
    fn merged_truncation_keeps_both_notices() {
        let long = prepare(&"n".repeat(400), 50);
        let short = prepare("pssi", 50);
        let merged = long.truncation().merge(short.truncation());
        assert!(merged.truncated);
        assert_eq!(merged.truncation_notice, long.notice);
        assert_eq!(merged.original_token_estimate, 101);

        let both = long.truncation().merge(long.truncation());
        assert_eq!(both.truncation_notice.unwrap().lines().count(), 2);
    }

    #[test]
    fn exact_limit_is_not_truncated() {
        let text = "a".repeat(48_000);
        assert!(!prepare(&text, 12_000).truncated);
    }

    #[test]
    fn cuts_on_char_boundaries() {
        let text = "é".repeat(100);
        let prepared = prepare(&text, 10);
        assert!(prepared.truncated);
        assert!(prepared.text.starts_with(&"é".repeat(40)));
        assert!(!prepared.text.starts_with(&"é".repeat(41)));
    }
}
