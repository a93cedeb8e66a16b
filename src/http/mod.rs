//! HTTP transport with retry logic and error classification.

mod client;
mod retry;

pub use client::{HttpClient, USER_AGENT};
pub use retry::{MAX_RETRIES, NonRetryableError, RETRY_DELAY_MS, check_retryable, classify_error};
