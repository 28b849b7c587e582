//! Utility modules.

pub mod retry;
pub mod text;

pub use retry::{RetryConfig, Retryable, with_retry};
pub use text::{excerpt, has_usable_text};
