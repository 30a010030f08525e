//! Run-scoped token budget.
//!
//! Every prompt and response that passes through an orchestration run is
//! charged here at an estimated `chars / 4` tokens. The loop consults the
//! tracker before starting any new reasoning work and stops once usage
//! crosses the configured fraction of the ceiling.

use serde::{Deserialize, Serialize};

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Default fraction of the ceiling at which new work is refused.
pub const DEFAULT_STOP_FRACTION: f64 = 0.8;

/// Estimated token cost of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// What a charge paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeKind {
    Input,
    Context,
    Response,
    ReflectionPrompt,
    ReflectionAnswer,
    SynthesisPrompt,
    SynthesisAnswer,
}

/// One ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub kind: ChargeKind,
    pub tokens: usize,
}

/// Budget figures attached to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub estimated_tokens: usize,
    pub max_limit: usize,
}

/// Monotonic token counter with a ceiling.
///
/// ```ignore
/// let mut budget = BudgetTracker::new(60_000);
/// budget.add(ChargeKind::Input, &policy_text);
/// if budget.should_stop() {
///     // halt before the next reasoning call
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    ceiling: usize,
    stop_fraction: f64,
    consumed: usize,
    ledger: Vec<Charge>,
}

impl BudgetTracker {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            stop_fraction: DEFAULT_STOP_FRACTION,
            consumed: 0,
            ledger: Vec::new(),
        }
    }

    /// Clamped to `0.0..=1.0`.
    pub fn with_stop_fraction(mut self, fraction: f64) -> Self {
        self.stop_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Charge `text` and return its estimated cost.
    pub fn add(&mut self, kind: ChargeKind, text: &str) -> usize {
        let tokens = estimate_tokens(text);
        self.consumed = self.consumed.saturating_add(tokens);
        self.ledger.push(Charge { kind, tokens });
        tokens
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// `(ceiling - consumed) / ceiling`. Negative once over budget; a zero
    /// ceiling reports `0.0`.
    pub fn remaining_fraction(&self) -> f64 {
        if self.ceiling == 0 {
            return 0.0;
        }
        (self.ceiling as f64 - self.consumed as f64) / self.ceiling as f64
    }

    /// True once usage reaches `stop_fraction × ceiling`.
    pub fn should_stop(&self) -> bool {
        self.consumed as f64 >= self.stop_fraction * self.ceiling as f64
    }

    /// True once the whole ceiling is spent.
    pub fn is_exhausted(&self) -> bool {
        self.consumed >= self.ceiling
    }

    pub fn ledger(&self) -> &[Charge] {
        &self.ledger
    }

    pub fn usage(&self) -> TokenUsage {
        TokenUsage {
            estimated_tokens: self.consumed,
            max_limit: self.ceiling,
        }
    }

    pub fn to_log_string(&self) -> String {
        format!(
            "~{} / {} tokens ({:.0}% used, {} charges)",
            self.consumed,
            self.ceiling,
            (1.0 - self.remaining_fraction()) * 100.0,
            self.ledger.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_is_chars_over_four() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(50_000)), 12_500);
        // Characters, not bytes.
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn consumed_equals_ledger_sum() {
        let mut budget = BudgetTracker::new(1_000);
        budget.add(ChargeKind::Input, &"a".repeat(400));
        budget.add(ChargeKind::Context, &"b".repeat(41));
        budget.add(ChargeKind::Response, "short");
        let sum: usize = budget.ledger().iter().map(|c| c.tokens).sum();
        assert_eq!(budget.consumed(), sum);
        assert_eq!(budget.consumed(), 100 + 10 + 1);
        assert_eq!(budget.ledger()[1].kind, ChargeKind::Context);
    }

    #[test]
    fn stops_at_eighty_percent() {
        let mut budget = BudgetTracker::new(100);
        budget.add(ChargeKind::Input, &"x".repeat(316));
        assert_eq!(budget.consumed(), 79);
        assert!(!budget.should_stop());
        budget.add(ChargeKind::Context, "xxxx");
        assert!(budget.should_stop());
        assert!((budget.remaining_fraction() - 0.2).abs() < 1e-9);
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn custom_stop_fraction() {
        let mut budget = BudgetTracker::new(100).with_stop_fraction(0.5);
        budget.add(ChargeKind::Input, &"x".repeat(200));
        assert!(budget.should_stop());
        assert_eq!(BudgetTracker::new(1).with_stop_fraction(7.0).stop_fraction, 1.0);
    }

    #[test]
    fn remaining_fraction_goes_negative_when_over() {
        let mut budget = BudgetTracker::new(10);
        budget.add(ChargeKind::Input, &"x".repeat(80));
        assert!(budget.remaining_fraction() < 0.0);
        assert!(budget.is_exhausted());
        assert_eq!(BudgetTracker::new(0).remaining_fraction(), 0.0);
        assert!(BudgetTracker::new(0).should_stop());
    }

    #[test]
    fn usage_serializes_for_reports() {
        let mut budget = BudgetTracker::new(60_000);
        budget.add(ChargeKind::Input, "abcdefgh");
        let json = serde_json::to_value(budget.usage()).unwrap();
        assert_eq!(json, serde_json::json!({"estimated_tokens": 2, "max_limit": 60000}));
        assert!(budget.to_log_string().starts_with("~2 / 60000 tokens"));
    }
}
