//! Poison-tolerant access to the `RwLock<Arc<T>>` snapshots the stores share.
//!
//! Every store swaps a whole snapshot in one assignment, so a panic while a
//! guard is held cannot leave a half-built value behind. Recovering the guard
//! is always safe; the poisoning is only logged.

use std::sync::{Arc, LockResult, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn recover<G>(result: LockResult<G>, source: &'static str, op: &'static str, kind: &str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            target = "verso::lock",
            source,
            op,
            lock_kind = kind,
            "Recovered poisoned lock"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), source, op, "read")
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), source, op, "write")
}

/// Clone the current snapshot out, releasing the lock before the caller uses it.
pub(crate) fn snapshot<T>(lock: &RwLock<Arc<T>>, source: &'static str, op: &'static str) -> Arc<T> {
    Arc::clone(&rw_read(lock, source, op))
}

/// Publish `next` as the current snapshot.
pub(crate) fn swap<T>(lock: &RwLock<Arc<T>>, next: T, source: &'static str, op: &'static str) {
    *rw_write(lock, source, op) = Arc::new(next);
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn poisoned(value: Vec<u32>) -> Arc<RwLock<Arc<Vec<u32>>>> {
        let lock = Arc::new(RwLock::new(Arc::new(value)));
        let poisoner = Arc::clone(&lock);
        let _ = catch_unwind(AssertUnwindSafe(move || {
            let _guard = poisoner.write().expect("first write");
            panic!("poison the lock");
        }));
        assert!(lock.is_poisoned());
        lock
    }

    #[test]
    fn snapshot_survives_poisoning() {
        let lock = poisoned(vec![1, 2, 3]);
        assert_eq!(*snapshot(&lock, "util::lock::tests", "read"), vec![1, 2, 3]);
    }

    #[test]
    fn swap_replaces_snapshot_after_poisoning() {
        let lock = poisoned(vec![1]);
        let before = snapshot(&lock, "util::lock::tests", "read");

        swap(&lock, vec![4, 5], "util::lock::tests", "swap");

        assert_eq!(*before, vec![1]);
        assert_eq!(*snapshot(&lock, "util::lock::tests", "read"), vec![4, 5]);
    }
}
