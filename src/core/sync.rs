//! Synchronization utilities for robust lock handling
//!
//! The bus never aborts for expected conditions, and a poisoned lock is not
//! an expected condition of the bus itself: it means a caller panicked while
//! holding one of our guards. We recover the guard and keep going instead of
//! cascading the panic into every other thread on the bus.

use std::sync::LockResult;

/// Recover the guard from a possibly-poisoned lock result.
///
/// Works for `Mutex::lock`, `RwLock::read`/`write` and the guard handed back
/// by `Condvar::wait`/`wait_timeout`, all of which return a `LockResult`.
/// Recovery is logged so the originating lifecycle bug stays visible without
/// taking the rest of the process down with it.
pub fn recover_poison<G>(result: LockResult<G>) -> G {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("recovering from poisoned lock: a thread panicked while holding a bus lock");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex, RwLock};
    use std::thread;

    #[test]
    fn recovers_value_from_healthy_mutex() {
        let mutex = Mutex::new(42);
        let guard = recover_poison(mutex.lock());
        assert_eq!(*guard, 42);
    }

    #[test]
    fn recovers_value_from_poisoned_mutex() {
        let mutex = Arc::new(Mutex::new(42));
        let poisoner = Arc::clone(&mutex);

        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("intentional panic to poison the mutex");
        })
        .join();

        let guard = recover_poison(mutex.lock());
        assert_eq!(*guard, 42);
    }

    #[test]
    fn recovers_rwlock_guards() {
        let rwlock = RwLock::new(7);
        {
            let mut write = recover_poison(rwlock.write());
            *write = 8;
        }
        let read = recover_poison(rwlock.read());
        assert_eq!(*read, 8);
    }
}
