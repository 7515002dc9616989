#[cfg(doc)]
use crate::guarded::GuardedOntology;
use {
    crate::{
        error::{Error, Result},
        execution_unit::execution_unit_id,
        policy::AcquirePolicy,
    },
    opera::{PhantomNotSend, PhantomNotSync},
    parking_lot::{
        RawRwLock,
        lock_api::{
            RawRwLock as RawRwLockTrait, RawRwLockFair, RawRwLockRecursive,
            RawRwLockRecursiveTimed, RawRwLockTimed,
        },
    },
    static_assertions::{assert_impl_all, assert_not_impl_any},
    std::{
        fmt::{self, Debug, Display, Formatter},
        mem::ManuallyDrop,
        ptr,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering::Relaxed},
        },
        time::{Duration, Instant},
    },
};

#[cfg(test)]
mod tests;

/// The two modes of a [`DocumentLock`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl Display for LockMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        })
    }
}

/// A reader/writer lock that serializes writes to one ontology document.
///
/// A [`DocumentLock`] is a handle. Cloning it does not create a new lock; all clones
/// refer to the same underlying primitive and compare equal. Every
/// [`GuardedOntology`] that observes or mutates a given document must be bound to a
/// clone of the same [`DocumentLock`]. The party that owns the document (for example
/// an [`OntologyManager`](crate::OntologyManager)) creates the lock and hands out
/// clones.
///
/// The shared mode is recursive: a thread that already holds it can acquire it again,
/// even while a writer is waiting. Readers are therefore admitted ahead of waiting
/// writers.
///
/// The exclusive mode is not re-entrant. Requesting either mode while the current
/// thread already holds the exclusive mode is detected: the blocking methods panic and
/// the policy-driven methods return [`Error::Reentrant`].
///
/// # Example
///
/// ```
/// use concurrent_ontology::DocumentLock;
///
/// let lock = DocumentLock::default();
/// let handle = lock.clone();
/// assert_eq!(lock, handle);
///
/// let guard = lock.write();
/// assert!(handle.is_locked_exclusive());
/// assert!(handle.try_read().is_none());
/// drop(guard);
/// assert!(!handle.is_locked());
/// ```
#[derive(Clone, Default)]
pub struct DocumentLock {
    shared: Arc<Shared>,
}

struct Shared {
    // We enforce the following invariant:
    // if writer != 0, then raw is locked exclusively and the execution unit with the id
    // writer locked it.
    raw: RawRwLock,
    // Only the execution unit holding the exclusive mode stores to this field.
    writer: AtomicUsize,
}

/// Shared access to a [`DocumentLock`].
///
/// The shared mode is released when this guard is dropped.
pub struct ReadGuard<'a> {
    lock: &'a DocumentLock,
    _phantom_not_send: PhantomNotSend,
    _phantom_not_sync: PhantomNotSync,
}

/// Exclusive access to a [`DocumentLock`].
///
/// The exclusive mode is released when this guard is dropped, including while
/// unwinding.
pub struct WriteGuard<'a> {
    lock: &'a DocumentLock,
    _phantom_not_send: PhantomNotSend,
    _phantom_not_sync: PhantomNotSync,
}

assert_impl_all!(DocumentLock: Send, Sync, Clone);
assert_not_impl_any!(ReadGuard<'_>: Sync, Send);
assert_not_impl_any!(WriteGuard<'_>: Sync, Send);

impl Default for Shared {
    fn default() -> Self {
        Self {
            raw: RawRwLock::INIT,
            writer: AtomicUsize::new(0),
        }
    }
}

impl DocumentLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether this lock is held in either mode.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.shared.raw.is_locked()
    }

    /// Returns whether this lock is held in the exclusive mode.
    #[inline]
    pub fn is_locked_exclusive(&self) -> bool {
        self.shared.raw.is_locked_exclusive()
    }

    /// Returns the mode this lock is currently held in, if any.
    ///
    /// The answer may be stale by the time it is returned.
    pub fn state(&self) -> Option<LockMode> {
        if self.is_locked_exclusive() {
            Some(LockMode::Exclusive)
        } else if self.is_locked() {
            Some(LockMode::Shared)
        } else {
            None
        }
    }

    /// Returns whether the current thread holds the exclusive mode.
    ///
    /// # Example
    ///
    /// ```
    /// use std::thread;
    /// use concurrent_ontology::DocumentLock;
    ///
    /// let lock = DocumentLock::default();
    /// let _guard = lock.write();
    /// assert!(lock.is_write_locked_by_current_thread());
    ///
    /// thread::scope(|scope| {
    ///     let handle = scope.spawn(|| {
    ///         assert!(!lock.is_write_locked_by_current_thread());
    ///     });
    ///     handle.join().unwrap();
    /// });
    /// ```
    #[inline]
    pub fn is_write_locked_by_current_thread(&self) -> bool {
        self.shared.writer.load(Relaxed) == execution_unit_id()
    }

    /// Acquires the shared mode, blocking while a writer holds the lock.
    ///
    /// Waiting writers do not block this call.
    ///
    /// # Panics
    ///
    /// Panics if the current thread holds the exclusive mode.
    #[inline]
    pub fn read(&self) -> ReadGuard<'_> {
        self.assert_not_reentrant();
        self.read_blocking()
    }

    #[inline]
    fn read_blocking(&self) -> ReadGuard<'_> {
        self.shared.raw.lock_shared_recursive();
        // SAFETY: - We've just locked the shared mode.
        unsafe { self.make_read_guard() }
    }

    /// Acquires the exclusive mode, blocking while any other guard exists.
    ///
    /// # Panics
    ///
    /// Panics if the current thread holds the exclusive mode.
    ///
    /// # Example
    ///
    /// ```
    /// use concurrent_ontology::DocumentLock;
    ///
    /// let lock = DocumentLock::default();
    /// let _guard = lock.write();
    /// assert!(lock.is_locked_exclusive());
    /// ```
    #[inline]
    pub fn write(&self) -> WriteGuard<'_> {
        self.assert_not_reentrant();
        self.write_blocking()
    }

    #[inline]
    fn write_blocking(&self) -> WriteGuard<'_> {
        self.shared.raw.lock_exclusive();
        // SAFETY: - We've just locked the exclusive mode.
        unsafe { self.make_write_guard() }
    }

    #[inline]
    fn assert_not_reentrant(&self) {
        assert!(
            !self.is_write_locked_by_current_thread(),
            "document lock is already held exclusively by the current thread",
        );
    }

    /// Attempts to acquire the shared mode without blocking.
    #[inline]
    pub fn try_read(&self) -> Option<ReadGuard<'_>> {
        self.shared.raw.try_lock_shared_recursive().then(|| {
            // SAFETY: - We've just locked the shared mode.
            unsafe { self.make_read_guard() }
        })
    }

    /// Attempts to acquire the shared mode until a timeout has expired.
    #[inline]
    pub fn try_read_for(&self, duration: Duration) -> Option<ReadGuard<'_>> {
        self.shared.raw.try_lock_shared_recursive_for(duration).then(|| {
            // SAFETY: - We've just locked the shared mode.
            unsafe { self.make_read_guard() }
        })
    }

    /// Attempts to acquire the shared mode until a deadline is reached.
    #[inline]
    pub fn try_read_until(&self, instant: Instant) -> Option<ReadGuard<'_>> {
        self.shared.raw.try_lock_shared_recursive_until(instant).then(|| {
            // SAFETY: - We've just locked the shared mode.
            unsafe { self.make_read_guard() }
        })
    }

    /// Attempts to acquire the exclusive mode without blocking.
    ///
    /// # Example
    ///
    /// ```
    /// use std::thread;
    /// use concurrent_ontology::DocumentLock;
    ///
    /// let lock = DocumentLock::default();
    /// let _guard = lock.read();
    ///
    /// thread::scope(|scope| {
    ///     let join_handle = scope.spawn(|| {
    ///         // Readers can share the lock, writers cannot.
    ///         assert!(lock.try_read().is_some());
    ///         assert!(lock.try_write().is_none());
    ///     });
    ///     join_handle.join().unwrap();
    /// });
    /// ```
    #[inline]
    pub fn try_write(&self) -> Option<WriteGuard<'_>> {
        self.shared.raw.try_lock_exclusive().then(|| {
            // SAFETY: - We've just locked the exclusive mode.
            unsafe { self.make_write_guard() }
        })
    }

    /// Attempts to acquire the exclusive mode until a timeout has expired.
    ///
    /// # Example
    ///
    /// ```
    /// use std::thread;
    /// use std::time::Duration;
    /// use concurrent_ontology::DocumentLock;
    ///
    /// let timeout = Duration::from_millis(50);
    /// let lock = DocumentLock::default();
    /// let _guard = lock.write();
    ///
    /// thread::scope(|scope| {
    ///     let join_handle = scope.spawn(|| {
    ///         assert!(lock.try_write_for(timeout).is_none());
    ///     });
    ///     join_handle.join().unwrap();
    /// });
    /// ```
    #[inline]
    pub fn try_write_for(&self, duration: Duration) -> Option<WriteGuard<'_>> {
        self.shared.raw.try_lock_exclusive_for(duration).then(|| {
            // SAFETY: - We've just locked the exclusive mode.
            unsafe { self.make_write_guard() }
        })
    }

    /// Attempts to acquire the exclusive mode until a deadline is reached.
    #[inline]
    pub fn try_write_until(&self, instant: Instant) -> Option<WriteGuard<'_>> {
        self.shared.raw.try_lock_exclusive_until(instant).then(|| {
            // SAFETY: - We've just locked the exclusive mode.
            unsafe { self.make_write_guard() }
        })
    }

    /// Acquires the shared mode as described by `policy`.
    pub fn read_with(&self, policy: &AcquirePolicy) -> Result<ReadGuard<'_>> {
        self.acquire(
            LockMode::Shared,
            policy,
            || self.read_blocking(),
            |deadline| self.try_read_until(deadline),
        )
    }

    /// Acquires the exclusive mode as described by `policy`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::thread;
    /// use std::time::Duration;
    /// use concurrent_ontology::{AcquirePolicy, DocumentLock, Error};
    ///
    /// let lock = DocumentLock::default();
    /// let policy = AcquirePolicy::default().with_timeout(Duration::from_millis(20));
    /// let _guard = lock.read();
    ///
    /// thread::scope(|scope| {
    ///     let join_handle = scope.spawn(|| {
    ///         let result = lock.write_with(&policy);
    ///         assert!(matches!(result, Err(Error::Timeout { .. })));
    ///     });
    ///     join_handle.join().unwrap();
    /// });
    /// ```
    pub fn write_with(&self, policy: &AcquirePolicy) -> Result<WriteGuard<'_>> {
        self.acquire(
            LockMode::Exclusive,
            policy,
            || self.write_blocking(),
            |deadline| self.try_write_until(deadline),
        )
    }

    fn acquire<G>(
        &self,
        mode: LockMode,
        policy: &AcquirePolicy,
        block: impl FnOnce() -> G,
        try_until: impl Fn(Instant) -> Option<G>,
    ) -> Result<G> {
        if self.is_write_locked_by_current_thread() {
            tracing::debug!(
                lock = ?self.addr(),
                %mode,
                "refusing re-entrant document lock request"
            );
            return Err(Error::Reentrant { mode });
        }
        let started = Instant::now();
        let deadline = policy
            .timeout()
            .and_then(|timeout| started.checked_add(timeout));
        let Some(token) = policy.cancel_token() else {
            return match deadline {
                None => Ok(block()),
                Some(deadline) => try_until(deadline).ok_or_else(|| self.timed_out(mode, started)),
            };
        };
        loop {
            if token.is_cancelled() {
                tracing::debug!(lock = ?self.addr(), %mode, "document lock acquisition cancelled");
                return Err(Error::Cancelled { mode });
            }
            let slice = Instant::now() + policy.poll_interval();
            let until = deadline.map_or(slice, |deadline| deadline.min(slice));
            if let Some(guard) = try_until(until) {
                return Ok(guard);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(self.timed_out(mode, started));
            }
        }
    }

    #[cold]
    fn timed_out(&self, mode: LockMode, started: Instant) -> Error {
        let waited = started.elapsed();
        tracing::debug!(lock = ?self.addr(), %mode, ?waited, "timed out waiting for document lock");
        Error::Timeout { mode, waited }
    }

    /// # Safety
    ///
    /// - The current execution unit must just have locked the shared mode and must
    ///   transfer it to the returned guard.
    #[inline]
    unsafe fn make_read_guard(&self) -> ReadGuard<'_> {
        ReadGuard {
            lock: self,
            _phantom_not_send: Default::default(),
            _phantom_not_sync: Default::default(),
        }
    }

    /// # Safety
    ///
    /// - The current execution unit must just have locked the exclusive mode and must
    ///   transfer it to the returned guard.
    #[inline]
    unsafe fn make_write_guard(&self) -> WriteGuard<'_> {
        // Since we're holding the exclusive mode, storing our id upholds the invariant.
        self.shared.writer.store(execution_unit_id(), Relaxed);
        WriteGuard {
            lock: self,
            _phantom_not_send: Default::default(),
            _phantom_not_sync: Default::default(),
        }
    }

    /// # Safety
    ///
    /// - The current execution unit must hold the exclusive mode through a guard that
    ///   is not used afterwards.
    #[inline]
    unsafe fn force_unlock_exclusive<const FAIR: bool>(&self) {
        debug_assert_eq!(self.shared.writer.load(Relaxed), execution_unit_id());
        // The writer field must be cleared before the raw lock is released, otherwise
        // the next holder's store could be overwritten.
        self.shared.writer.store(0, Relaxed);
        // SAFETY: - By the requirements of this function, the exclusive mode is held.
        unsafe {
            if FAIR {
                self.shared.raw.unlock_exclusive_fair();
            } else {
                self.shared.raw.unlock_exclusive();
            }
        }
    }

    /// # Safety
    ///
    /// - The current execution unit must hold the shared mode through a guard that is
    ///   not used afterwards.
    #[inline]
    unsafe fn force_unlock_shared<const FAIR: bool>(&self) {
        // SAFETY: - By the requirements of this function, the shared mode is held.
        unsafe {
            if FAIR {
                self.shared.raw.unlock_shared_fair();
            } else {
                self.shared.raw.unlock_shared();
            }
        }
    }

    #[inline]
    pub(crate) fn addr(&self) -> *const u8 {
        let addr: *const Shared = &*self.shared;
        addr.cast()
    }
}

impl Debug for DocumentLock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentLock")
            .field("id", &self.addr())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PartialEq for DocumentLock {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        ptr::eq::<Shared>(&*self.shared, &*other.shared)
    }
}

impl Eq for DocumentLock {}

impl ReadGuard<'_> {
    /// Releases the shared mode using the fair protocol.
    #[inline]
    pub fn unlock_fair(self) {
        let slf = ManuallyDrop::new(self);
        // SAFETY: - This guard owns the shared mode and is never used again.
        unsafe {
            slf.lock.force_unlock_shared::<true>();
        }
    }
}

impl WriteGuard<'_> {
    /// Releases the exclusive mode using the fair protocol.
    ///
    /// # Example
    ///
    /// ```
    /// use concurrent_ontology::DocumentLock;
    ///
    /// let lock = DocumentLock::default();
    /// let guard = lock.write();
    /// guard.unlock_fair();
    /// assert!(!lock.is_locked());
    /// ```
    #[inline]
    pub fn unlock_fair(self) {
        let slf = ManuallyDrop::new(self);
        // SAFETY: - This guard owns the exclusive mode and is never used again.
        unsafe {
            slf.lock.force_unlock_exclusive::<true>();
        }
    }
}

impl Drop for ReadGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: - By construction, this guard owns the shared mode.
        unsafe {
            self.lock.force_unlock_shared::<false>();
        }
    }
}

impl Drop for WriteGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: - By construction, this guard owns the exclusive mode.
        unsafe {
            self.lock.force_unlock_exclusive::<false>();
        }
    }
}

impl Debug for ReadGuard<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadGuard")
            .field("lock_id", &self.lock.addr())
            .finish_non_exhaustive()
    }
}

impl Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteGuard")
            .field("lock_id", &self.lock.addr())
            .finish_non_exhaustive()
    }
}
