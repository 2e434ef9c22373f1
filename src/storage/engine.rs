//! In-Memory Storage Engine with Expiry Support
//!
//! This module implements [`MemoryStorage`], the default [`Storage`] backend.
//!
//! ## Design Decisions
//!
//! 1. **One RwLock**: a single readers-writer lock guards the whole map, so
//!    a conditional write can check and write under one exclusive guard.
//! 2. **Lazy Expiry**: deadlines are checked on every read; expired entries
//!    are removed by `get` after the read has already been answered.
//! 3. **Injected Clock**: every expiry decision asks the engine's [`Clock`].
//!
//! ## Concurrency Model
//!
//! ```text
//!   get / exists / keys ──> read lock  ─┐
//!                                       ├──> HashMap<Bytes, Entry>
//!   set_if / delete / clear ─> write lock ┘
//! ```

use crate::storage::{Clock, SetCondition, Storage, StorageError, StorageResult, SystemClock};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Represents a stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The actual value stored
    pub value: Bytes,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates an entry that expires `ttl` after `now`.
    ///
    /// A missing or zero `ttl` produces an entry that never expires, as does
    /// a deadline too far out for `Instant` to represent.
    pub fn new(value: Bytes, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            expires_at: ttl
                .filter(|d| !d.is_zero())
                .and_then(|d| now.checked_add(d)),
        }
    }

    /// Checks if this entry has expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// The in-memory key space.
///
/// Designed to be wrapped in an `Arc` and shared by every connection task.
/// Each instance is independent; nothing here is global.
///
/// # Example
///
/// ```
/// use clonekv::storage::{MemoryStorage, SetCondition, Storage};
/// use bytes::Bytes;
///
/// let storage = MemoryStorage::new();
///
/// assert!(storage
///     .set_if(Bytes::from("lock"), Bytes::from("a"), None, SetCondition::IfAbsent)
///     .unwrap());
/// assert!(!storage
///     .set_if(Bytes::from("lock"), Bytes::from("b"), None, SetCondition::IfAbsent)
///     .unwrap());
/// assert_eq!(storage.get(b"lock").unwrap(), Some(Bytes::from("a")));
/// ```
#[derive(Debug)]
pub struct MemoryStorage {
    data: RwLock<HashMap<Bytes, Entry>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Creates an empty key space on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty key space that reads time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of physically stored entries, expired ones included.
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.read()?.len())
    }

    /// Returns true if nothing is physically stored.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<Bytes, Entry>>> {
        self.data.read().map_err(|_| StorageError::Poisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<Bytes, Entry>>> {
        self.data.write().map_err(|_| StorageError::Poisoned)
    }
}

impl Storage for MemoryStorage {
    fn set_if(
        &self,
        key: Bytes,
        value: Bytes,
        ttl: Option<Duration>,
        condition: SetCondition,
    ) -> StorageResult<bool> {
        let mut data = self.write()?;
        let now = self.clock.now();

        if condition != SetCondition::Always {
            let present = data.get(&key).is_some_and(|e| !e.is_expired_at(now));
            let allowed = match condition {
                SetCondition::IfAbsent => !present,
                SetCondition::IfPresent => present,
                SetCondition::Always => true,
            };
            if !allowed {
                debug!(key = ?key, ?condition, "Conditional write skipped");
                return Ok(false);
            }
        }

        data.insert(key, Entry::new(value, ttl, now));
        Ok(true)
    }

    /// Gets the value for a key.
    ///
    /// The answer is decided under the read lock. If the entry turned out to
    /// be expired, a write lock is taken afterwards to evict it, but only if
    /// it is still expired by then: a concurrent `set` may have replaced it.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        {
            let data = self.read()?;
            match data.get(key) {
                Some(entry) if !entry.is_expired_at(self.clock.now()) => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut data = self.write()?;
        let now = self.clock.now();
        if data.get(key).is_some_and(|e| e.is_expired_at(now)) {
            data.remove(key);
            trace!(key = ?Bytes::copy_from_slice(key), "Evicted expired key");
        }

        Ok(None)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<bool> {
        let mut data = self.write()?;
        let now = self.clock.now();

        // An expired entry is already gone as far as callers can tell.
        Ok(data.remove(key).is_some_and(|e| !e.is_expired_at(now)))
    }

    fn exists(&self, key: &[u8]) -> StorageResult<u64> {
        let data = self.read()?;
        let now = self.clock.now();

        Ok(u64::from(data.get(key).is_some_and(|e| !e.is_expired_at(now))))
    }

    fn keys(&self, _pattern: &str) -> StorageResult<Vec<Bytes>> {
        let data = self.read()?;
        let now = self.clock.now();

        Ok(data
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn clear(&self) -> StorageResult<()> {
        let mut data = self.write()?;
        let dropped = data.len();
        data.clear();
        debug!(dropped, "Key space cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ManualClock;
    use std::thread;

    fn with_manual_clock() -> (MemoryStorage, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (MemoryStorage::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_set_and_get() {
        let engine = MemoryStorage::new();

        engine.set(Bytes::from("key"), Bytes::from("value"), None).unwrap();
        assert_eq!(engine.get(b"key").unwrap(), Some(Bytes::from("value")));
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = MemoryStorage::new();
        assert_eq!(engine.get(b"nonexistent").unwrap(), None);
    }

    #[test]
    fn test_set_replaces_value_and_expiry() {
        let (engine, clock) = with_manual_clock();

        engine
            .set(Bytes::from("key"), Bytes::from("v1"), Some(Duration::from_secs(1)))
            .unwrap();
        engine.set(Bytes::from("key"), Bytes::from("v2"), None).unwrap();

        clock.advance(Duration::from_secs(5));
        assert_eq!(engine.get(b"key").unwrap(), Some(Bytes::from("v2")));
    }

    #[test]
    fn test_binary_values() {
        let engine = MemoryStorage::new();
        let value = Bytes::from(&b"hel\x00o\r\n"[..]);

        engine.set(Bytes::from("bin"), value.clone(), None).unwrap();
        assert_eq!(engine.get(b"bin").unwrap(), Some(value));
    }

    #[test]
    fn test_delete() {
        let engine = MemoryStorage::new();

        engine.set(Bytes::from("key"), Bytes::from("value"), None).unwrap();
        assert!(engine.delete(b"key").unwrap());
        assert_eq!(engine.get(b"key").unwrap(), None);
        assert!(!engine.delete(b"key").unwrap()); // Already deleted
        assert_eq!(engine.exists(b"key").unwrap(), 0);
    }

    #[test]
    fn test_exists() {
        let engine = MemoryStorage::new();

        assert_eq!(engine.exists(b"key").unwrap(), 0);
        engine.set(Bytes::from("key"), Bytes::from("value"), None).unwrap();
        assert_eq!(engine.exists(b"key").unwrap(), 1);
    }

    #[test]
    fn test_expiry() {
        let (engine, clock) = with_manual_clock();

        engine
            .set(Bytes::from("key"), Bytes::from("value"), Some(Duration::from_secs(1)))
            .unwrap();

        // Key should exist immediately
        assert_eq!(engine.exists(b"key").unwrap(), 1);

        clock.advance(Duration::from_secs(2));

        assert_eq!(engine.exists(b"key").unwrap(), 0);
        assert_eq!(engine.get(b"key").unwrap(), None);
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let (engine, clock) = with_manual_clock();

        engine
            .set(Bytes::from("key"), Bytes::from("value"), Some(Duration::from_millis(100)))
            .unwrap();

        clock.advance(Duration::from_millis(99));
        assert_eq!(engine.exists(b"key").unwrap(), 1);

        clock.advance(Duration::from_millis(1));
        assert_eq!(engine.exists(b"key").unwrap(), 0);
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let (engine, clock) = with_manual_clock();

        engine
            .set(Bytes::from("key"), Bytes::from("value"), Some(Duration::ZERO))
            .unwrap();

        clock.advance(Duration::from_secs(3600));
        assert_eq!(engine.get(b"key").unwrap(), Some(Bytes::from("value")));
    }

    #[test]
    fn test_lazy_eviction_on_get() {
        let (engine, clock) = with_manual_clock();

        engine
            .set(Bytes::from("key"), Bytes::from("value"), Some(Duration::from_secs(1)))
            .unwrap();
        clock.advance(Duration::from_secs(2));

        // exists() hides the entry but leaves it in place
        assert_eq!(engine.exists(b"key").unwrap(), 0);
        assert_eq!(engine.len().unwrap(), 1);

        // get() evicts it
        assert_eq!(engine.get(b"key").unwrap(), None);
        assert_eq!(engine.len().unwrap(), 0);
    }

    #[test]
    fn test_expired_key_stays_gone() {
        let (engine, clock) = with_manual_clock();

        engine
            .set(Bytes::from("key"), Bytes::from("value"), Some(Duration::from_secs(1)))
            .unwrap();
        clock.advance(Duration::from_secs(2));

        for _ in 0..3 {
            assert_eq!(engine.get(b"key").unwrap(), None);
            assert_eq!(engine.exists(b"key").unwrap(), 0);
            clock.advance(Duration::from_secs(1));
        }
    }

    #[test]
    fn test_delete_expired_reports_nothing_removed() {
        let (engine, clock) = with_manual_clock();

        engine
            .set(Bytes::from("key"), Bytes::from("value"), Some(Duration::from_secs(1)))
            .unwrap();
        clock.advance(Duration::from_secs(2));

        assert!(!engine.delete(b"key").unwrap());
        assert!(engine.is_empty().unwrap());
    }

    #[test]
    fn test_set_if_absent() {
        let engine = MemoryStorage::new();

        assert!(engine
            .set_if(Bytes::from("key"), Bytes::from("first"), None, SetCondition::IfAbsent)
            .unwrap());
        assert!(!engine
            .set_if(Bytes::from("key"), Bytes::from("second"), None, SetCondition::IfAbsent)
            .unwrap());
        assert_eq!(engine.get(b"key").unwrap(), Some(Bytes::from("first")));
    }

    #[test]
    fn test_set_if_present() {
        let engine = MemoryStorage::new();

        assert!(!engine
            .set_if(Bytes::from("key"), Bytes::from("value"), None, SetCondition::IfPresent)
            .unwrap());
        assert_eq!(engine.exists(b"key").unwrap(), 0);

        engine.set(Bytes::from("key"), Bytes::from("old"), None).unwrap();
        assert!(engine
            .set_if(Bytes::from("key"), Bytes::from("new"), None, SetCondition::IfPresent)
            .unwrap());
        assert_eq!(engine.get(b"key").unwrap(), Some(Bytes::from("new")));
    }

    #[test]
    fn test_conditions_treat_expired_as_absent() {
        let (engine, clock) = with_manual_clock();

        engine
            .set(Bytes::from("key"), Bytes::from("old"), Some(Duration::from_secs(1)))
            .unwrap();
        clock.advance(Duration::from_secs(2));

        assert!(!engine
            .set_if(Bytes::from("key"), Bytes::from("x"), None, SetCondition::IfPresent)
            .unwrap());
        assert!(engine
            .set_if(Bytes::from("key"), Bytes::from("new"), None, SetCondition::IfAbsent)
            .unwrap());
        assert_eq!(engine.get(b"key").unwrap(), Some(Bytes::from("new")));
    }

    #[test]
    fn test_keys_ignores_pattern_and_expired() {
        let (engine, clock) = with_manual_clock();

        engine.set(Bytes::from("hello"), Bytes::from("1"), None).unwrap();
        engine.set(Bytes::from("world"), Bytes::from("2"), None).unwrap();
        engine
            .set(Bytes::from("temp"), Bytes::from("3"), Some(Duration::from_secs(1)))
            .unwrap();
        clock.advance(Duration::from_secs(2));

        let mut keys = engine.keys("h*").unwrap();
        keys.sort();
        assert_eq!(keys, vec![Bytes::from("hello"), Bytes::from("world")]);
    }

    #[test]
    fn test_clear() {
        let engine = MemoryStorage::new();

        engine.set(Bytes::from("key1"), Bytes::from("value1"), None).unwrap();
        engine.set(Bytes::from("key2"), Bytes::from("value2"), None).unwrap();

        engine.clear().unwrap();

        assert!(engine.keys("*").unwrap().is_empty());
        assert!(engine.is_empty().unwrap());
    }

    #[test]
    fn test_independent_instances() {
        let a = MemoryStorage::new();
        let b = MemoryStorage::new();

        a.set(Bytes::from("key"), Bytes::from("value"), None).unwrap();
        assert_eq!(b.exists(b"key").unwrap(), 0);
    }

    #[test]
    fn test_poisoned_lock_is_a_storage_fault() {
        let engine = Arc::new(MemoryStorage::new());

        let poisoner = Arc::clone(&engine);
        let _ = thread::spawn(move || {
            let _guard = poisoner.data.write().unwrap();
            panic!("writer died");
        })
        .join();

        assert_eq!(
            engine.set(Bytes::from("key"), Bytes::from("value"), None),
            Err(StorageError::Poisoned)
        );
        assert_eq!(engine.get(b"key"), Err(StorageError::Poisoned));
    }

    #[test]
    fn test_concurrent_access() {
        let engine = Arc::new(MemoryStorage::new());
        let mut handles = vec![];

        // Spawn multiple writers
        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = Bytes::from(format!("key-{}-{}", i, j));
                    engine.set(key.clone(), Bytes::from("value"), None).unwrap();
                    assert_eq!(engine.get(&key).unwrap(), Some(Bytes::from("value")));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len().unwrap(), 1000);
    }

    #[test]
    fn test_concurrent_set_if_absent_has_one_winner() {
        let engine = Arc::new(MemoryStorage::new());
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    engine
                        .set_if(
                            Bytes::from("lock"),
                            Bytes::from(format!("v{}", i)),
                            None,
                            SetCondition::IfAbsent,
                        )
                        .unwrap()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);

        let value = engine.get(b"lock").unwrap().unwrap();
        assert!((0..16).any(|i| value == Bytes::from(format!("v{}", i))));
    }
}
