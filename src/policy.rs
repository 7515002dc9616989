use {std::time::Duration, tokio_util::sync::CancellationToken};

#[cfg(test)]
mod tests;

/// How a [`DocumentLock`](crate::DocumentLock) is acquired on behalf of a guarded
/// ontology.
///
/// The default policy blocks until the lock becomes available and releases it with the
/// regular (unfair) protocol.
///
/// With a timeout, acquisition fails with [`Error::Timeout`](crate::Error::Timeout)
/// once the timeout expires. With a cancel token, the wait is split into slices of
/// [`poll_interval`](Self::poll_interval) and fails with
/// [`Error::Cancelled`](crate::Error::Cancelled) as soon as the token is observed to be
/// cancelled. The token is only polled, so no async runtime is needed.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use concurrent_ontology::{AcquirePolicy, CancellationToken};
///
/// let token = CancellationToken::new();
/// let policy = AcquirePolicy::default()
///     .with_timeout(Duration::from_secs(5))
///     .with_cancel_token(token.clone())
///     .with_fair_unlock(true);
/// assert_eq!(policy.timeout(), Some(Duration::from_secs(5)));
/// assert!(policy.fair_unlock());
/// ```
#[derive(Clone, Debug)]
pub struct AcquirePolicy {
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    fair_unlock: bool,
    poll_interval: Duration,
}

impl Default for AcquirePolicy {
    fn default() -> Self {
        Self {
            timeout: None,
            cancel: None,
            fair_unlock: false,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }
}

impl AcquirePolicy {
    /// Slice length used while waiting with a cancel token.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

    const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

    /// Blocks until the lock is available.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Releases the exclusive mode with the fair protocol, handing the lock directly to
    /// the next waiter.
    pub fn with_fair_unlock(mut self, fair: bool) -> Self {
        self.fair_unlock = fair;
        self
    }

    /// Intervals shorter than one millisecond are raised to one millisecond.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Self::MIN_POLL_INTERVAL);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cancel_token(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    pub fn fair_unlock(&self) -> bool {
        self.fair_unlock
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
