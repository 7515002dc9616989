
/// Returns the ID of the current execution unit.
///
/// The ID is the address of a thread-local and is therefore never 0. Two threads that
/// are alive at the same time never observe the same ID.
///
/// [`DocumentLock`](crate::DocumentLock) stores this ID while a thread holds the
/// exclusive mode so that a second request from the same thread can be refused instead
/// of deadlocking.
///
/// A thread that terminates while holding the exclusive mode (e.g. because its guard
/// was leaked) may hand its ID to a later thread that re-uses the same thread-local
/// storage. Since the earlier thread's termination happens before the later thread
/// starts, the later thread is then treated as the holder. This is the same
/// happens-before chain a leaked guard would require anyway.
#[inline(always)]
pub(crate) fn execution_unit_id() -> usize {
    thread_local!(static EXECUTION_UNIT: u8 = const { 0 });
    EXECUTION_UNIT.with(|unit| {
        let unit: *const u8 = unit;
        unit as usize
    })
}
