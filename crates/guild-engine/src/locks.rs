//! # Keyed Locks
//!
//! One logical mutex per key (project, contract or milestone id) without
//! allocating a mutex per entity. Waiters park on a condition variable and
//! give up at a deadline with [`EngineError::Conflict`].

use std::collections::HashSet;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::EngineError;

/// A set of per-key exclusive locks.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    label: &'static str,
    held: Mutex<HashSet<K>>,
    released: Condvar,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    /// Create an empty lock set. `label` names the resource in conflicts.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    /// Block until `key` is free or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// [`EngineError::Conflict`] when the deadline passes with the key still
    /// held by someone else.
    pub fn acquire(&self, key: K, timeout: Duration) -> Result<KeyGuard<'_, K>, EngineError> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();
        while held.contains(&key) {
            if self.released.wait_until(&mut held, deadline).timed_out() && held.contains(&key) {
                tracing::warn!(resource = %format!("{}:{}", self.label, key), "lock wait timed out");
                return Err(EngineError::Conflict {
                    resource: format!("{}:{}", self.label, key),
                });
            }
        }
        held.insert(key.clone());
        Ok(KeyGuard { locks: self, key })
    }

    /// Whether `key` is currently held.
    pub fn is_held(&self, key: &K) -> bool {
        self.held.lock().contains(key)
    }
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct KeyGuard<'a, K>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    locks: &'a KeyedLocks<K>,
    key: K,
}

impl<K> Drop for KeyGuard<'_, K>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.key);
        self.locks.released.notify_all();
    }
}
