use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};

/// Advisory mutual exclusion keyed on a string.
///
/// Holding the guard for `product:<id>` serializes sequencing for one
/// product while other products proceed; the resolver uses `match:<key>`
/// the same way. Reads (the auditor) take no keys at all.
#[derive(Clone)]
pub struct KeyedLock {
    inner: Arc<(Mutex<HashSet<String>>, Condvar)>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(HashSet::new()), Condvar::new())),
        }
    }

    /// Block until `key` is free, then hold it until the guard drops.
    pub fn acquire(&self, key: impl Into<String>) -> KeyedGuard {
        let key = key.into();
        let (held, freed) = &*self.inner;
        let mut held = held.lock().unwrap_or_else(|e| e.into_inner());
        while held.contains(&key) {
            held = freed.wait(held).unwrap_or_else(|e| e.into_inner());
        }
        held.insert(key.clone());
        KeyedGuard {
            inner: Arc::clone(&self.inner),
            key,
        }
    }
}

impl Default for KeyedLock {
    fn default() -> Self {
        Self::new()
    }
}

pub struct KeyedGuard {
    inner: Arc<(Mutex<HashSet<String>>, Condvar)>,
    key: String,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        let (held, freed) = &*self.inner;
        let mut held = held.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.key);
        freed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn same_key_excludes() {
        let lock = KeyedLock::new();
        let guard = lock.acquire("p1");

        let lock2 = lock.clone();
        let handle = thread::spawn(move || {
            let _g = lock2.acquire("p1");
        });

        // The spawned thread must block until we release.
        thread::sleep(std::time::Duration::from_millis(50));
        assert!(!handle.is_finished());

        drop(guard);
        handle.join().unwrap();
    }

    #[test]
    fn different_keys_proceed() {
        let lock = KeyedLock::new();
        let _a = lock.acquire("p1");
        let _b = lock.acquire("p2");
    }
}
