//! Command Dispatcher
//!
//! Receives one argument vector, resolves the command, validates its
//! arguments, calls the storage engine and renders the reply.
//!
//! ## Supported Commands
//!
//! - `SET key value [EX seconds | PX milliseconds] [NX | XX]` - Set a key
//! - `GET key` - Get a key's value
//! - `DELETE key` / `DEL key` - Delete a key
//! - `EXISTS key` - Check if a key exists
//! - `KEYS pattern` - List all keys (the pattern is not applied)
//! - `FLUSHDB` / `CLEAR` - Remove every key
//! - `PING` - Test connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  execute()  │───>│  dispatch() │───>│  cmd_*()    │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                        dyn Storage          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `cmd_*` returns `Result<RespValue, CommandError>`. `execute` turns
//! errors into `-ERR` replies, so a failing command never takes the
//! connection down.

use crate::protocol::RespValue;
use crate::storage::{SetCondition, Storage, StorageError};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{trace, warn};

/// Errors a command can fail with.
///
/// The `Display` text of each variant is the exact message sent to the
/// client after the `-` prefix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR no command")]
    Empty,

    #[error("ERR unknown command '{0}'")]
    Unknown(String),

    /// Carries the command name in lowercase
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("ERR value is not an integer")]
    NotAnInteger,

    #[error("ERR invalid expire time in 'set' command")]
    InvalidExpireTime,

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR storage fault: {0}")]
    Storage(#[from] StorageError),
}

type CommandResult = Result<RespValue, CommandError>;

/// Arity constraint, counted without the command name.
#[derive(Debug, Clone, Copy)]
enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    fn check(self, command: &str, argc: usize) -> Result<(), CommandError> {
        let ok = match self {
            Arity::Exact(n) => argc == n,
            Arity::AtLeast(n) => argc >= n,
        };
        if ok {
            Ok(())
        } else {
            Err(CommandError::WrongArity(command.to_lowercase()))
        }
    }
}

/// Handles commands by dispatching them to the storage engine.
///
/// Cheap to clone: every connection gets its own handle onto the same
/// storage.
///
/// # Example
///
/// ```
/// use clonekv::commands::CommandHandler;
/// use clonekv::storage::MemoryStorage;
/// use std::sync::Arc;
///
/// let handler = CommandHandler::new(Arc::new(MemoryStorage::new()));
///
/// let reply = handler.execute(&["SET", "name", "GoClone", "EX", "10"]);
/// assert_eq!(reply.serialize(), b"+OK\r\n");
///
/// let reply = handler.execute(&["GET", "name"]);
/// assert_eq!(reply.serialize(), b"$7\r\nGoClone\r\n");
/// ```
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler").finish_non_exhaustive()
    }
}

impl CommandHandler {
    /// Creates a new command handler over the given storage.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Executes one command and returns the reply.
    ///
    /// `args[0]` is the command name (any case), the rest are its arguments.
    pub fn execute<A: AsRef<[u8]>>(&self, args: &[A]) -> RespValue {
        let Some((name, rest)) = args.split_first() else {
            return RespValue::error(CommandError::Empty.to_string());
        };

        let cmd = String::from_utf8_lossy(name.as_ref()).to_uppercase();
        trace!(command = %cmd, argc = rest.len(), "Executing command");

        match self.dispatch(&cmd, rest) {
            Ok(reply) => reply,
            Err(e) => {
                if let CommandError::Storage(ref fault) = e {
                    warn!(command = %cmd, error = %fault, "Storage fault");
                }
                RespValue::error(e.to_string())
            }
        }
    }

    /// Dispatches a command to its handler.
    fn dispatch<A: AsRef<[u8]>>(&self, cmd: &str, args: &[A]) -> CommandResult {
        let (arity, handler): (Arity, fn(&Self, &[A]) -> CommandResult) = match cmd {
            "SET" => (Arity::AtLeast(2), Self::cmd_set),
            "GET" => (Arity::Exact(1), Self::cmd_get),
            "DELETE" | "DEL" => (Arity::Exact(1), Self::cmd_delete),
            "EXISTS" => (Arity::Exact(1), Self::cmd_exists),
            "KEYS" => (Arity::Exact(1), Self::cmd_keys),
            "FLUSHDB" | "CLEAR" => (Arity::Exact(0), Self::cmd_flushdb),
            "PING" => (Arity::Exact(0), Self::cmd_ping),
            _ => return Err(CommandError::Unknown(cmd.to_string())),
        };

        arity.check(cmd, args.len())?;
        handler(self, args)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// SET key value [EX seconds | PX milliseconds] [NX | XX]
    ///
    /// Options are scanned left to right. A later EX/PX replaces an earlier
    /// one; the first of NX/XX wins; anything else is ignored. Every option
    /// is validated before the write, so a bad integer never writes.
    fn cmd_set<A: AsRef<[u8]>>(&self, args: &[A]) -> CommandResult {
        let key = Bytes::copy_from_slice(args[0].as_ref());
        let value = Bytes::copy_from_slice(args[1].as_ref());

        let mut ttl: Option<Duration> = None;
        let mut condition = SetCondition::Always;

        // The whole option list is checked before NX/XX is consulted, so
        // `SET k v NX EX bad` on an existing key is an integer error, not nil.
        let mut i = 2;
        while i < args.len() {
            let opt = args[i].as_ref();

            if opt.eq_ignore_ascii_case(b"EX") || opt.eq_ignore_ascii_case(b"PX") {
                let raw = args.get(i + 1).ok_or(CommandError::Syntax)?;
                let amount = parse_integer(raw.as_ref())?;
                if amount < 0 {
                    return Err(CommandError::InvalidExpireTime);
                }
                let amount = amount as u64;
                ttl = Some(if opt.eq_ignore_ascii_case(b"EX") {
                    Duration::from_secs(amount)
                } else {
                    Duration::from_millis(amount)
                });
                i += 2;
                continue;
            }

            if condition == SetCondition::Always {
                if opt.eq_ignore_ascii_case(b"NX") {
                    condition = SetCondition::IfAbsent;
                } else if opt.eq_ignore_ascii_case(b"XX") {
                    condition = SetCondition::IfPresent;
                }
            }
            i += 1;
        }

        if self.storage.set_if(key, value, ttl, condition)? {
            Ok(RespValue::ok())
        } else {
            Ok(RespValue::null())
        }
    }

    /// GET key
    fn cmd_get<A: AsRef<[u8]>>(&self, args: &[A]) -> CommandResult {
        match self.storage.get(args[0].as_ref())? {
            Some(value) => Ok(RespValue::bulk_string(value)),
            None => Ok(RespValue::null()),
        }
    }

    /// DELETE key
    fn cmd_delete<A: AsRef<[u8]>>(&self, args: &[A]) -> CommandResult {
        let removed = self.storage.delete(args[0].as_ref())?;
        Ok(RespValue::integer(i64::from(removed)))
    }

    /// EXISTS key
    fn cmd_exists<A: AsRef<[u8]>>(&self, args: &[A]) -> CommandResult {
        let count = self.storage.exists(args[0].as_ref())?;
        Ok(RespValue::integer(count as i64))
    }

    /// KEYS pattern
    fn cmd_keys<A: AsRef<[u8]>>(&self, args: &[A]) -> CommandResult {
        let pattern = String::from_utf8_lossy(args[0].as_ref());
        let keys = self.storage.keys(&pattern)?;

        Ok(RespValue::array(
            keys.into_iter().map(RespValue::bulk_string).collect(),
        ))
    }

    /// FLUSHDB / CLEAR
    fn cmd_flushdb<A: AsRef<[u8]>>(&self, _args: &[A]) -> CommandResult {
        self.storage.clear()?;
        Ok(RespValue::ok())
    }

    /// PING
    fn cmd_ping<A: AsRef<[u8]>>(&self, _args: &[A]) -> CommandResult {
        Ok(RespValue::pong())
    }
}

fn parse_integer(raw: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::NotAnInteger)
}
