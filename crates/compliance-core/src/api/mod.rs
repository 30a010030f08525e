//! API interaction support.
//!
//! [`retry`] detects transient errors (429, 5xx, network timeouts) and
//! retries them with configurable exponential backoff and jitter. It also
//! recognizes context-length overflows, which, like 400/401 errors, are
//! never retried.

pub mod retry;

pub use retry::{RetryConfig, is_context_length_error, retry_api_call};
