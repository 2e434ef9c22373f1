//! Storage Engine Module
//!
//! This module owns the key space. It defines the [`Storage`] contract the
//! command layer programs against, and [`MemoryStorage`], the in-memory
//! backend guarded by a single readers-writer lock.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              MemoryStorage                  │
//! │                                             │
//! │   RwLock<HashMap<Bytes, Entry>>             │
//! │     read:  get / exists / keys              │
//! │     write: set / set_if / delete / clear    │
//! │                                             │
//! │   Arc<dyn Clock>  (expiry decisions)        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Expiry
//!
//! Expiry is lazy only. An entry past its deadline is invisible to every
//! read the moment the deadline passes, and is physically removed the next
//! time a `get` touches it. Nothing runs in the background.
//!
//! ## Example
//!
//! ```
//! use clonekv::storage::{MemoryStorage, Storage};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let storage = MemoryStorage::new();
//!
//! storage.set(Bytes::from("name"), Bytes::from("GoClone"), None).unwrap();
//! assert_eq!(storage.get(b"name").unwrap(), Some(Bytes::from("GoClone")));
//!
//! storage
//!     .set(Bytes::from("session"), Bytes::from("abc"), Some(Duration::from_secs(60)))
//!     .unwrap();
//! assert_eq!(storage.exists(b"session").unwrap(), 1);
//! ```

pub mod clock;
pub mod engine;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Entry, MemoryStorage};

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a storage backend.
///
/// These are storage faults: fatal to the invocation that hit them, never
/// to the connection or the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A writer panicked while holding the key space lock
    #[error("key space lock poisoned")]
    Poisoned,

    /// Backend-specific failure
    #[error("{0}")]
    Backend(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Precondition attached to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    /// Write unconditionally
    #[default]
    Always,
    /// Write only if the key is absent (`NX`)
    IfAbsent,
    /// Write only if the key is present (`XX`)
    IfPresent,
}

/// The contract every storage backend fulfils.
///
/// Implementations must be safe to call from many threads at once, and a
/// write that has returned must be visible to every later read.
pub trait Storage: Send + Sync {
    /// Writes `value` under `key` if `condition` holds.
    ///
    /// The existence check and the write form one atomic step: no other
    /// caller can observe or change the key between them. A `ttl` of `None`
    /// or zero means the entry never expires. Any previous value and expiry
    /// are replaced entirely.
    ///
    /// Returns `true` if the write happened.
    fn set_if(
        &self,
        key: Bytes,
        value: Bytes,
        ttl: Option<Duration>,
        condition: SetCondition,
    ) -> StorageResult<bool>;

    /// Returns the value for `key`, or `None` if it is absent or expired.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Removes `key`. Returns `true` if something was removed.
    ///
    /// Deleting an absent key is not an error.
    fn delete(&self, key: &[u8]) -> StorageResult<bool>;

    /// Returns 1 if `key` is present and unexpired, 0 otherwise.
    fn exists(&self, key: &[u8]) -> StorageResult<u64>;

    /// Returns every unexpired key.
    ///
    /// `pattern` is accepted for interface compatibility only; no filtering
    /// is applied.
    fn keys(&self, pattern: &str) -> StorageResult<Vec<Bytes>>;

    /// Empties the key space in one step.
    fn clear(&self) -> StorageResult<()>;

    /// Writes `value` under `key` unconditionally.
    fn set(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) -> StorageResult<()> {
        self.set_if(key, value, ttl, SetCondition::Always).map(|_| ())
    }
}
