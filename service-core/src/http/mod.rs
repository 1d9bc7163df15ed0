//! Helpers for outbound HTTP calls to upstream services.

pub mod retry;

pub use retry::{Retryable, RetryConfig, is_retryable_status, retry_call};
