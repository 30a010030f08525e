//! Configuration for orchestration runs.
//!
//! Every field has a default; override with the `with_*` builders or overlay
//! the `COMPLIANCE_*` environment variables with
//! [`OrchestratorConfig::from_env`].
//!
//! ```ignore
//! let config = OrchestratorConfig::default()
//!     .with_max_cycles(3)
//!     .with_token_ceiling(40_000)
//!     .with_model("openai/gpt-4o-mini");
//! ```

use crate::DEFAULT_MODEL;
use crate::context::budget::DEFAULT_STOP_FRACTION;
use crate::context::intake::DEFAULT_SAFE_INPUT_TOKENS;
use crate::reasoning::DEFAULT_MAX_ROUNDS;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Tunables for [`Orchestrator`](super::orchestrator::Orchestrator) and the
/// single-pass analyzers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on plan/act/reflect cycles.
    pub max_cycles: usize,
    /// Estimated-token ceiling for one run.
    pub token_ceiling: usize,
    /// Fraction of the ceiling at which no new cycle starts.
    pub stop_fraction: f64,
    /// Prior cycles condensed into each prompt.
    pub history_window: usize,
    /// Characters of results and logs shown to the reflection prompt.
    pub reflection_view_chars: usize,
    /// Characters of the report shown to the synthesis prompt.
    pub report_view_chars: usize,
    pub model: String,
    /// Model turns allowed within one tool-calling exchange.
    pub max_tool_rounds: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Inputs above this many estimated tokens are truncated at intake.
    pub safe_input_tokens: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_cycles: 2,
            token_ceiling: 60_000,
            stop_fraction: DEFAULT_STOP_FRACTION,
            history_window: 3,
            reflection_view_chars: 2000,
            report_view_chars: 3000,
            model: DEFAULT_MODEL.into(),
            max_tool_rounds: DEFAULT_MAX_ROUNDS,
            max_tokens: 4096,
            temperature: 0.0,
            safe_input_tokens: DEFAULT_SAFE_INPUT_TOKENS,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overlaid with `COMPLIANCE_MODEL`, `COMPLIANCE_MAX_CYCLES`
    /// and `COMPLIANCE_TOKEN_CEILING`.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(model) = lookup("COMPLIANCE_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }
        if let Some(n) = parse_var(&lookup, "COMPLIANCE_MAX_CYCLES") {
            self.max_cycles = n;
        }
        if let Some(n) = parse_var(&lookup, "COMPLIANCE_TOKEN_CEILING") {
            self.token_ceiling = n;
        }
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn with_token_ceiling(mut self, ceiling: usize) -> Self {
        self.token_ceiling = ceiling;
        self
    }

    /// Clamped to `0.0..=1.0`.
    pub fn with_stop_fraction(mut self, fraction: f64) -> Self {
        self.stop_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn with_history_window(mut self, cycles: usize) -> Self {
        self.history_window = cycles;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_safe_input_tokens(mut self, tokens: usize) -> Self {
        self.safe_input_tokens = tokens;
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {key}={raw:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let c = OrchestratorConfig::default();
        assert_eq!(c.max_cycles, 2);
        assert_eq!(c.token_ceiling, 60_000);
        assert_eq!(c.history_window, 3);
        assert_eq!(c.reflection_view_chars, 2000);
        assert_eq!(c.report_view_chars, 3000);
        assert_eq!(c.safe_input_tokens, 12_000);
        assert_eq!(c.model, DEFAULT_MODEL);
    }

    #[test]
    fn env_overlay_applies_valid_values() {
        let c = OrchestratorConfig::default().overlay(env(&[
            ("COMPLIANCE_MODEL", "openai/gpt-4o-mini"),
            ("COMPLIANCE_MAX_CYCLES", "4"),
            ("COMPLIANCE_TOKEN_CEILING", " 90000 "),
        ]));
        assert_eq!(c.model, "openai/gpt-4o-mini");
        assert_eq!(c.max_cycles, 4);
        assert_eq!(c.token_ceiling, 90_000);
    }

    #[test]
    fn env_overlay_ignores_invalid_values() {
        let c = OrchestratorConfig::default().overlay(env(&[
            ("COMPLIANCE_MAX_CYCLES", "many"),
            ("COMPLIANCE_MODEL", "  "),
        ]));
        assert_eq!(c.max_cycles, 2);
        assert_eq!(c.model, DEFAULT_MODEL);
    }

    #[test]
    fn stop_fraction_is_clamped() {
        assert_eq!(OrchestratorConfig::default().with_stop_fraction(1.5).stop_fraction, 1.0);
    }
}
