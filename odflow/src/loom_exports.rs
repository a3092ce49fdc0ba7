#[cfg(odflow_loom)]
#[allow(unused_imports)]
pub(crate) mod sync {
    pub(crate) use loom::sync::{Arc, Condvar, LockResult, Mutex, MutexGuard, Weak};
    pub(crate) use std::sync::PoisonError;

    pub(crate) mod atomic {
        pub(crate) use loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    }
}
#[cfg(not(odflow_loom))]
#[allow(unused_imports)]
pub(crate) mod sync {
    pub(crate) use std::sync::{
        Arc, Condvar, LockResult, Mutex, MutexGuard, PoisonError, Weak,
    };

    pub(crate) mod atomic {
        pub(crate) use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    }
}

/// Locks a mutex, recovering the guard if a panicking thread poisoned it.
///
/// Actor panics are caught by the worker and reported to the run controller,
/// so a poisoned receiver or coordinator lock is still in a consistent state:
/// all critical sections only perform infallible bookkeeping.
pub(crate) fn lock<T>(mutex: &sync::Mutex<T>) -> sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(sync::PoisonError::into_inner)
}

/// Waits on a condition variable, recovering the guard on poisoning.
pub(crate) fn wait<'a, T>(
    condvar: &sync::Condvar,
    guard: sync::MutexGuard<'a, T>,
) -> sync::MutexGuard<'a, T> {
    condvar
        .wait(guard)
        .unwrap_or_else(sync::PoisonError::into_inner)
}

#[allow(unused_macros)]
macro_rules! debug_or_loom_assert {
    ($($arg:tt)*) => (if cfg!(any(debug_assertions, odflow_loom)) { assert!($($arg)*); })
}
#[allow(unused_imports)]
pub(crate) use debug_or_loom_assert;
