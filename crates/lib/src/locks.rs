//! Per-key mutual exclusion for cache and store operations.
//!
//! A dependency manager resolves many locations in parallel. Two locations
//! sharing a source URI contend on one cache working copy, and two installs
//! of the same revision contend on one store entry, so both the cache and the
//! store hand out a mutex per key. Distinct keys never block each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A registry of mutexes, one per string key, created on first use.
#[derive(Debug, Default)]
pub struct KeyedLocks {
  inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get the mutex guarding `key`.
  ///
  /// The caller locks the returned mutex and holds the guard for as long as
  /// the keyed resource must stay exclusive.
  pub fn get(&self, key: &str) -> Arc<Mutex<()>> {
    let mut map = self.inner.lock().unwrap();
    map.entry(key.to_string()).or_default().clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;

  #[test]
  fn same_key_returns_same_mutex() {
    let locks = KeyedLocks::new();
    let a = locks.get("https://example.com/repo");
    let b = locks.get("https://example.com/repo");
    assert!(Arc::ptr_eq(&a, &b));
  }

  #[test]
  fn different_keys_return_different_mutexes() {
    let locks = KeyedLocks::new();
    let a = locks.get("https://example.com/one");
    let b = locks.get("https://example.com/two");
    assert!(!Arc::ptr_eq(&a, &b));
  }

  #[test]
  fn serializes_holders_of_one_key() {
    let locks = Arc::new(KeyedLocks::new());
    let counter = Arc::new(Mutex::new(0u32));

    let handles: Vec<_> = (0..8)
      .map(|_| {
        let locks = Arc::clone(&locks);
        let counter = Arc::clone(&counter);
        thread::spawn(move || {
          let key = locks.get("shared");
          let _guard = key.lock().unwrap();
          let mut n = counter.lock().unwrap();
          *n += 1;
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }
    assert_eq!(*counter.lock().unwrap(), 8);
  }
}
