//! Exponential backoff and retry-count policies.
//!
//! Two retry loops share one delay function but normalize the requested
//! retry count differently:
//!
//! - **Request retries** (the Client's 401 loop): anything below 1 becomes the
//!   default. At least one retry is always needed so that an expired cached
//!   token can be replaced.
//! - **Token-fetch retries** (the acquirer's loop): a negative request becomes
//!   the default, zero is honored (exactly one attempt).
//!
//! Attempt `n` (starting at 1 for the first retry) waits `unit * 2^n`. The
//! first attempt is never delayed.

use async_trait::async_trait;
use std::time::Duration;

/// Default retry count for both loops.
pub const DEFAULT_RETRY_COUNT: u32 = 5;

/// Default backoff unit.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Backoff delays and retry-count normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    unit: Duration,
    default_retries: u32,
}

impl BackoffPolicy {
    /// Create a policy. A `default_retries` of 0 is raised to 1, since the
    /// request loop needs one retry to replace a rejected cached token.
    #[must_use]
    pub fn new(unit: Duration, default_retries: u32) -> Self {
        Self {
            unit,
            default_retries: default_retries.max(1),
        }
    }

    /// Set the backoff unit.
    #[must_use]
    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Set the default retry count (at least 1).
    #[must_use]
    pub fn with_default_retries(mut self, retries: u32) -> Self {
        self.default_retries = retries.max(1);
        self
    }

    #[must_use]
    pub fn default_retries(&self) -> u32 {
        self.default_retries
    }

    /// Delay before retry `attempt` (`unit * 2^attempt`, saturating).
    ///
    /// Attempt 0 is the initial call and is not delayed.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.unit.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Effective retry count for the Client's request loop.
    #[must_use]
    pub fn request_retries(&self, requested: i32) -> u32 {
        match u32::try_from(requested) {
            Ok(retries) if retries >= 1 => retries,
            _ => self.default_retries,
        }
    }

    /// Effective retry count for the token-fetch loop.
    #[must_use]
    pub fn token_fetch_retries(&self, requested: i32) -> u32 {
        u32::try_from(requested).unwrap_or(self.default_retries)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_UNIT, DEFAULT_RETRY_COUNT)
    }
}

/// Waits between retry attempts.
///
/// Injected so tests can observe requested delays without real waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer. Only the calling task is suspended.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
