//! Connection Handler Module
//!
//! This module manages individual client connections to clonekv.
//! Each client connection is handled by its own async task; the only
//! state tasks share is the storage engine behind the command handler.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept() + spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Frame args  │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘     │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send reply  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Pipelining**: several commands in one packet are answered in order
//! - **Statistics**: tracks connection and command counters
//!
//! ## Example
//!
//! ```ignore
//! use clonekv::connection::{handle_connection, ConnectionStats};
//! use clonekv::commands::CommandHandler;
//! use clonekv::storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(MemoryStorage::new()));
//! let stats = Arc::new(ConnectionStats::new());
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler.clone(), stats));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
