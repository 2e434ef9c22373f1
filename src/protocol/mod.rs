//! Wire Protocol
//!
//! The subset of the Redis Serialization Protocol (RESP) that clonekv speaks.
//!
//! ## Modules
//!
//! - `parser`: frames incoming bytes into argument vectors
//! - `types`: defines the `RespValue` reply and its serialization
//!
//! ## Example
//!
//! ```
//! use clonekv::protocol::{CommandParser, RespValue};
//! use bytes::Bytes;
//!
//! let (args, _consumed) = CommandParser::new()
//!     .parse(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(args[1], Bytes::from("name"));
//!
//! let reply = RespValue::bulk_string(Bytes::from("GoClone"));
//! assert_eq!(reply.serialize(), b"$7\r\nGoClone\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{ArgVec, CommandParser, ParseError, ParseResult};
pub use types::RespValue;
