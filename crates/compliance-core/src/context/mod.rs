//! Run-scoped resource control: budgets, condensation and input intake.
//!
//! 1. **[`budget`]** — [`BudgetTracker`] keeps a ledger of estimated token
//!    charges against a ceiling and tells the loop when to stop (80% by
//!    default).
//!
//! 2. **[`condenser`]** — folds the last few cycle records into a bounded
//!    history for the next prompt: tool results cut to 500 characters, long
//!    trace logs reduced to their actions plus a sample of reasoning steps.
//!
//! 3. **[`intake`]** — cuts oversized input documents at the boundary and
//!    flags the cut so reports say they are partial.

pub mod budget;
pub mod condenser;
pub mod intake;

pub use budget::{BudgetTracker, Charge, ChargeKind, TokenUsage, estimate_tokens};
pub use condenser::{CondensedCycle, CondensedInvocation, condense, reduce_trace, render_history};
pub use intake::{PreparedInput, Truncation, prepare};
