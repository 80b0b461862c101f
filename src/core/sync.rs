//! Synchronization utilities for lock poisoning
//!
//! Locks in this crate are never held across listener code, so a poisoned lock
//! means a panic inside the crate itself. Operations with a caller get the
//! poison converted into an error; the completion path has no caller and
//! recovers the guard instead.

use std::sync::{LockResult, MutexGuard, RwLockReadGuard, RwLockWriteGuard};

/// Convert a poisoned mutex into an application error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use mqbus::core::sync::handle_mutex_poison;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |msg| msg).unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). PoisonError: {:?}",
            poison_err
        ))
    })
}

/// Convert a poisoned RwLock write into an application error
pub fn handle_rwlock_write<T, E>(
    result: LockResult<RwLockWriteGuard<T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (RwLock write poisoned). PoisonError: {:?}",
            poison_err
        ))
    })
}

/// Take the guard out of a poisoned mutex, logging that it happened
pub fn recover_mutex<'a, T>(
    result: LockResult<MutexGuard<'a, T>>,
    context: &str,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|poison_err| {
        log::warn!("Recovering poisoned lock in {}", context);
        poison_err.into_inner()
    })
}

/// Take the read guard out of a poisoned RwLock, logging that it happened
pub fn recover_read<'a, T>(
    result: LockResult<RwLockReadGuard<'a, T>>,
    context: &str,
) -> RwLockReadGuard<'a, T> {
    result.unwrap_or_else(|poison_err| {
        log::warn!("Recovering poisoned lock in {}", context);
        poison_err.into_inner()
    })
}
