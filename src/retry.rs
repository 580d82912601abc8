//! Bounded Polling for Eventually-Visible Writes
//!
//! Webhook deliveries are ordered by firing time, not by handler
//! completion: `invoice.payment_succeeded` can arrive while the
//! `checkout.session.completed` handler is still writing the customer
//! binding it depends on. Rather than ad hoc sleep loops at each call
//! site, the wait is a single primitive parameterized by attempt count
//! and interval.

use std::future::Future;
use std::time::Duration;

/// How often and how long to poll before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of attempts, including the first immediate one
    pub attempts: u32,
    /// Pause between consecutive attempts
    pub interval: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Worst-case time spent sleeping across all attempts.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.attempts.saturating_sub(1)
    }
}

/// Poll `op` until it yields a value.
///
/// Calls `op` up to `policy.attempts` times, sleeping `policy.interval`
/// between attempts. Returns the first `Some(_)`, or `Ok(None)` once the
/// attempts are exhausted. An `Err` from `op` aborts immediately: the
/// underlying failure is not something more polling will fix.
pub async fn poll_until_some<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    for attempt in 0..policy.attempts {
        if attempt > 0 {
            tokio::time::sleep(policy.interval).await;
        }
        if let Some(value) = op().await? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}
