use {
    crate::{AcquirePolicy, CancellationToken},
    std::{thread, time::Duration},
};

#[test]
fn default_is_unbounded() {
    let policy = AcquirePolicy::default();
    assert_eq!(policy.timeout(), None);
    assert!(policy.cancel_token().is_none());
    assert!(!policy.fair_unlock());
    assert_eq!(policy.poll_interval(), AcquirePolicy::DEFAULT_POLL_INTERVAL);
}

#[test]
fn timeout_can_be_cleared() {
    let policy = AcquirePolicy::unbounded().with_timeout(Duration::from_millis(3));
    assert_eq!(policy.timeout(), Some(Duration::from_millis(3)));
    assert_eq!(policy.without_timeout().timeout(), None);
}

#[test]
fn poll_interval_is_clamped() {
    let policy = AcquirePolicy::default().with_poll_interval(Duration::ZERO);
    assert_eq!(policy.poll_interval(), Duration::from_millis(1));
    let policy = policy.with_poll_interval(Duration::from_millis(25));
    assert_eq!(policy.poll_interval(), Duration::from_millis(25));
}

#[test]
fn cancel_is_shared_between_clones() {
    let token = CancellationToken::new();
    let policy = AcquirePolicy::default().with_cancel_token(token.clone());
    assert!(!policy.cancel_token().unwrap().is_cancelled());
    thread::scope(|s| {
        s.spawn(|| token.cancel()).join().unwrap();
    });
    assert!(policy.cancel_token().unwrap().is_cancelled());
    // Cancellation is sticky.
    token.cancel();
    assert!(token.is_cancelled());
}
