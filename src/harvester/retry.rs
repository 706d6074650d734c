//! Retry/backoff controller
//!
//! This is the only place retry policy is decided. [`resolve`] repeatedly
//! invokes the fetcher, waiting out an exponentially increasing delay after
//! each transient failure, and always returns a terminal [`Resolution`]:
//! `Found` and `Absent` immediately, `Failed` once the retry budget is
//! exhausted or a permanent condition is hit.

use crate::config::HarvesterConfig;
use crate::harvester::fetcher::fetch;
use crate::model::{CandidateId, FetchOutcome, Resolution};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::watch;

/// Reason prefix for a resolution that ran out of retries
pub const REASON_RETRIES_EXHAUSTED: &str = "retries_exhausted";

/// Reason for a resolution cut short by shutdown drain
pub const REASON_SHUTDOWN: &str = "interrupted by shutdown";

/// Retry policy applied to every resolution
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retry attempts beyond the first; a resolution makes at most
    /// `max_retries + 1` fetch attempts
    pub max_retries: u32,

    /// Base delay, doubled per attempt
    pub base_delay: Duration,

    /// Delay cap for server errors and timeouts
    pub cap: Duration,

    /// Delay cap for explicit rate-limit responses, which deserve a longer
    /// cool-off than ordinary server errors
    pub rate_limit_cap: Duration,
}

impl RetryPolicy {
    /// Builds a policy from the harvester configuration
    pub fn from_config(config: &HarvesterConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            cap: Duration::from_millis(config.backoff_cap_ms),
            rate_limit_cap: Duration::from_millis(config.rate_limit_cap_ms),
        }
    }

    /// Backoff delay before retry number `attempt + 1`
    pub fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let cap = if rate_limited { self.rate_limit_cap } else { self.cap };
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(cap)
    }
}

/// Resolves one candidate ID to a terminal outcome
///
/// On a transient failure the task sleeps out the backoff delay and retries,
/// up to the policy's budget. The sleep races against the cancellation
/// signal: a resolution cancelled mid-backoff terminates as
/// `Failed(`[`REASON_SHUTDOWN`]`)` rather than being silently abandoned, so
/// every dispatched ID still reaches the store.
pub async fn resolve(
    client: &Client,
    base_url: &str,
    id: CandidateId,
    policy: &RetryPolicy,
    mut cancel: watch::Receiver<bool>,
) -> Resolution {
    for attempt in 0..=policy.max_retries {
        if attempt > 0 && *cancel.borrow() {
            return Resolution::Failed {
                reason: REASON_SHUTDOWN.to_string(),
            };
        }

        match fetch(client, base_url, id, attempt).await {
            FetchOutcome::Found(record) => return Resolution::Found(record),
            FetchOutcome::Absent => return Resolution::Absent,
            FetchOutcome::Permanent { reason } => return Resolution::Failed { reason },
            FetchOutcome::Transient {
                reason,
                rate_limited,
            } => {
                if attempt == policy.max_retries {
                    tracing::debug!("ID {}: retry budget exhausted ({})", id, reason);
                    return Resolution::Failed {
                        reason: format!("{REASON_RETRIES_EXHAUSTED}: {reason}"),
                    };
                }

                let delay = policy.delay_for(attempt, rate_limited);
                tracing::trace!(
                    "ID {}: transient failure ({}), retrying in {:?}",
                    id,
                    reason,
                    delay
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = cancel.changed() => {
                        if changed.is_ok() && *cancel.borrow() {
                            return Resolution::Failed {
                                reason: REASON_SHUTDOWN.to_string(),
                            };
                        }
                    }
                }
            }
        }
    }

    // The loop always returns within max_retries + 1 iterations.
    Resolution::Failed {
        reason: REASON_RETRIES_EXHAUSTED.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(1000),
            cap: Duration::from_millis(16_000),
            rate_limit_cap: Duration::from_millis(32_000),
        }
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = test_policy();
        assert_eq!(policy.delay_for(0, false), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1, false), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2, false), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(3, false), Duration::from_millis(8000));
    }

    #[test]
    fn test_delay_caps() {
        let policy = test_policy();
        assert_eq!(policy.delay_for(10, false), Duration::from_millis(16_000));
        // Rate-limit responses get the longer cool-off cap.
        assert_eq!(policy.delay_for(10, true), Duration::from_millis(32_000));
    }

    #[test]
    fn test_policy_from_config() {
        let config = HarvesterConfig::default();
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
    }

    // Attempt counting and terminal conversion are exercised against mock
    // servers in the integration tests.
}
