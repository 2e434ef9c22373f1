//! Command Handler Module
//!
//! This module implements the command dispatch layer. It receives argument
//! vectors, executes them against the storage engine, and returns replies.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ CommandParser   │  (protocol module)
//! └────────┬────────┘
//!          │  Vec<Bytes>
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  dyn Storage    │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `SET`, `GET`, `DELETE` (`DEL`), `EXISTS`
//! - `KEYS`, `FLUSHDB` (`CLEAR`)
//! - `PING`

pub mod handler;

pub use handler::{CommandError, CommandHandler};
