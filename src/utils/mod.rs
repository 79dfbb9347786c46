//! Utility modules supporting archive operations.
//!
//! - [`RateLimiter`]: token bucket applied to every outbound request
//! - [`ConcurrencyGate`]: bounds the number of requests in flight
//! - [`RetryConfig`] / [`with_retry`]: exponential backoff for transient upstream errors
//! - [`validate_record_id`]: rejects identifiers that could alter a request path
//!
//! # Admission
//!
//! ```rust
//! use trove_master::utils::{ConcurrencyGate, RateLimiter};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiter::new(2.0, 5)?;
//! let gate = ConcurrencyGate::new(4)?;
//!
//! let _slot = gate.acquire().await?;
//! limiter.acquire().await;
//! // ... perform the request while holding the slot
//! # Ok(())
//! # }
//! ```

mod gate;
mod rate_limit;
mod retry;
mod validate;

pub use gate::{ConcurrencyGate, GatePermit};
pub use rate_limit::RateLimiter;
pub use retry::{with_retry, RetryConfig, Retryable};
pub use validate::{validate_query_text, validate_record_id, ValidationError, MAX_ID_LENGTH};
