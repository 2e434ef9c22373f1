//! # clonekv - A Minimal In-Memory Key-Value Store
//!
//! clonekv is an in-memory key-value store that speaks a small subset of the
//! Redis protocol: `SET` (with `EX`/`PX`/`NX`/`XX`), `GET`, `DELETE`,
//! `EXISTS`, `KEYS`, `FLUSHDB` and `PING`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            clonekv                              │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │          │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │          │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘          │
//! │                                               │ dyn Storage     │
//! │                                               ▼                 │
//! │                     ┌──────────────────────────────────────┐    │
//! │                     │            MemoryStorage             │    │
//! │                     │   RwLock<HashMap<Bytes, Entry>>      │    │
//! │                     │   Arc<dyn Clock>                     │    │
//! │                     └──────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use clonekv::commands::CommandHandler;
//! use clonekv::storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(MemoryStorage::new()));
//!
//! assert_eq!(handler.execute(&["SET", "name", "GoClone"]).serialize(), b"+OK\r\n");
//! assert_eq!(handler.execute(&["SET", "name", "other", "NX"]).serialize(), b"$-1\r\n");
//! assert_eq!(handler.execute(&["GET", "name"]).serialize(), b"$7\r\nGoClone\r\n");
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the `Storage` contract, the in-memory engine and clocks
//! - [`commands`]: argument validation, option parsing and reply encoding
//! - [`protocol`]: request framing and the `RespValue` reply type
//! - [`connection`]: per-client read/execute/reply loop
//! - [`config`]: command-line configuration for the server binary
//!
//! ## Design Highlights
//!
//! ### Atomic Conditional Writes
//!
//! `SET ... NX` and `SET ... XX` run their existence check and their write
//! under one exclusive lock acquisition, so concurrent `NX` writers on the
//! same key produce exactly one winner.
//!
//! ### Lazy Expiry
//!
//! An entry past its deadline is invisible to every read immediately and is
//! evicted the next time `GET` touches it. There is no background sweeper.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, CommandHandler};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{CommandParser, ParseError, RespValue};
pub use storage::{MemoryStorage, SetCondition, Storage, StorageError};

/// The default port clonekv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host clonekv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of clonekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
