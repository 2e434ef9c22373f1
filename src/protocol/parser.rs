//! Command Framing
//!
//! Turns raw bytes from a client into argument vectors for the dispatcher.
//! Two request shapes are accepted, as Redis does:
//!
//! - **Multibulk**: `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`
//! - **Inline**: `GET name\r\n`, one command per line, split on whitespace,
//!   with `"double"` or `'single'` quoted tokens
//!
//! ## How the Parser Works
//!
//! [`CommandParser::parse`] returns either:
//! - `Ok(Some((args, consumed)))` - one full command, `consumed` bytes used
//! - `Ok(None)` - the command is incomplete, read more data
//! - `Err(ParseError)` - the bytes can never form a valid command
//!
//! Bulk payloads are copied into `Bytes` once and passed through untouched,
//! so values stay binary-safe.

use crate::protocol::types::{prefix, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while framing a command.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// A length header that is not a number
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Bulk string length is negative
    #[error("invalid bulk length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is below -1
    #[error("invalid multibulk length: {0}")]
    InvalidArrayLength(i64),

    /// Protocol violation (missing CRLF, wrong element type, bad quoting)
    #[error("{0}")]
    ProtocolError(String),

    /// The request exceeds a size limit
    #[error("request too large: {size} (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of arguments in one multibulk request
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Upper bound on the argument slots reserved from an array header
const MAX_PREALLOC_ARGS: usize = 1024;

/// Maximum length of an inline command line
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// A parsed argument vector: command name followed by its arguments.
pub type ArgVec = Vec<Bytes>;

/// Frames argument vectors out of a byte buffer.
///
/// # Example
///
/// ```
/// use clonekv::protocol::CommandParser;
/// use bytes::Bytes;
///
/// let parser = CommandParser::new();
/// let (args, consumed) = parser.parse(b"SET name GoClone\r\n").unwrap().unwrap();
/// assert_eq!(args, vec![Bytes::from("SET"), Bytes::from("name"), Bytes::from("GoClone")]);
/// assert_eq!(consumed, 18);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandParser;

impl CommandParser {
    /// Creates a new parser. It holds no state between calls.
    pub fn new() -> Self {
        Self
    }

    /// Attempts to frame one command from the front of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(ArgVec, usize)>> {
        match buf.first() {
            None => Ok(None),
            Some(&prefix::ARRAY) => self.parse_multibulk(buf),
            Some(_) => self.parse_inline(buf),
        }
    }

    /// Parses `*<count>\r\n` followed by `count` bulk strings.
    fn parse_multibulk(&self, buf: &[u8]) -> ParseResult<Option<(ArgVec, usize)>> {
        let (count, mut consumed) = match read_length_line(buf)? {
            Some(header) => header,
            None => return Ok(None),
        };

        // A null or empty array carries no command at all.
        if count == -1 || count == 0 {
            return Ok(Some((Vec::new(), consumed)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        if count > MAX_ARRAY_LEN {
            return Err(ParseError::MessageTooLarge {
                size: count,
                max: MAX_ARRAY_LEN,
            });
        }

        let mut args = Vec::with_capacity(count.min(MAX_PREALLOC_ARGS));
        for _ in 0..count {
            match self.parse_bulk(&buf[consumed..])? {
                Some((arg, used)) => {
                    args.push(arg);
                    consumed += used;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((args, consumed)))
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`
    fn parse_bulk(&self, buf: &[u8]) -> ParseResult<Option<(Bytes, usize)>> {
        match buf.first() {
            None => return Ok(None),
            Some(&prefix::BULK_STRING) => {}
            Some(&other) => {
                return Err(ParseError::ProtocolError(format!(
                    "expected '$', got '{}'",
                    other as char
                )))
            }
        }

        let (length, data_start) = match read_length_line(buf)? {
            Some(header) => header,
            None => return Ok(None),
        };

        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let total_needed = data_start + length + 2;
        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[data_start + length..total_needed] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
        Ok(Some((data, total_needed)))
    }

    /// Parses one newline-terminated inline command.
    fn parse_inline(&self, buf: &[u8]) -> ParseResult<Option<(ArgVec, usize)>> {
        let newline = match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None if buf.len() > MAX_INLINE_SIZE => {
                return Err(ParseError::MessageTooLarge {
                    size: buf.len(),
                    max: MAX_INLINE_SIZE,
                })
            }
            None => return Ok(None),
        };

        let line = buf[..newline].strip_suffix(b"\r").unwrap_or(&buf[..newline]);
        let args = split_inline(line)?;

        Ok(Some((args, newline + 1)))
    }
}

/// Reads a `<prefix><integer>\r\n` header.
///
/// Returns the integer and the number of bytes the header occupies.
fn read_length_line(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let digits = &buf[1..1 + end];
    let n = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ParseError::InvalidInteger(String::from_utf8_lossy(digits).into_owned()))?;

    Ok(Some((n, 1 + end + 2)))
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Splits an inline command line into arguments.
///
/// Whitespace separates tokens. Inside double quotes `\"`, `\\`, `\n`, `\r`,
/// `\t` and `\xHH` escapes are honoured; single quotes only escape `\'`.
/// A closing quote must be followed by whitespace or end of line.
fn split_inline(line: &[u8]) -> ParseResult<ArgVec> {
    let unbalanced = || ParseError::ProtocolError("unbalanced quotes in request".to_string());

    let mut args = Vec::new();
    let mut i = 0;

    loop {
        while i < line.len() && line[i].is_ascii_whitespace() {
            i += 1;
        }
        if i == line.len() {
            return Ok(args);
        }

        let mut token = Vec::new();
        match line[i] {
            quote @ (b'"' | b'\'') => {
                i += 1;
                loop {
                    let &b = line.get(i).ok_or_else(unbalanced)?;
                    match b {
                        b'\\' if quote == b'"' => {
                            let &esc = line.get(i + 1).ok_or_else(unbalanced)?;
                            match esc {
                                b'n' => token.push(b'\n'),
                                b'r' => token.push(b'\r'),
                                b't' => token.push(b'\t'),
                                b'x' => match line.get(i + 2..i + 4).and_then(parse_hex_pair) {
                                    Some(byte) => {
                                        token.push(byte);
                                        i += 2;
                                    }
                                    None => token.push(b'x'),
                                },
                                other => token.push(other),
                            }
                            i += 2;
                        }
                        b'\\' if line.get(i + 1) == Some(&b'\'') => {
                            token.push(b'\'');
                            i += 2;
                        }
                        b if b == quote => {
                            i += 1;
                            if line.get(i).is_some_and(|c| !c.is_ascii_whitespace()) {
                                return Err(unbalanced());
                            }
                            break;
                        }
                        b => {
                            token.push(b);
                            i += 1;
                        }
                    }
                }
            }
            _ => {
                while i < line.len() && !line[i].is_ascii_whitespace() {
                    token.push(line[i]);
                    i += 1;
                }
            }
        }

        args.push(Bytes::from(token));
    }
}

fn parse_hex_pair(pair: &[u8]) -> Option<u8> {
    let s = std::str::from_utf8(pair).ok()?;
    u8::from_str_radix(s, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> ParseResult<Option<(ArgVec, usize)>> {
        CommandParser::new().parse(input)
    }

    fn args(items: &[&str]) -> ArgVec {
        items.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    #[test]
    fn test_parse_multibulk() {
        let input = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
        let (parsed, consumed) = parse(input).unwrap().unwrap();
        assert_eq!(parsed, args(&["GET", "name"]));
        assert_eq!(consumed, 23);
    }

    #[test]
    fn test_parse_multibulk_large_header() {
        // A header alone is just an incomplete request
        assert!(parse(b"*1048576\r\n").unwrap().is_none());

        // More arguments than the preallocation still parse
        let count = MAX_PREALLOC_ARGS * 2 + 1;
        let mut input = format!("*{}\r\n", count).into_bytes();
        for _ in 0..count {
            input.extend_from_slice(b"$1\r\na\r\n");
        }
        let (parsed, consumed) = parse(&input).unwrap().unwrap();
        assert_eq!(parsed.len(), count);
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_multibulk_incomplete() {
        assert!(parse(b"*2\r\n$3\r\nGET\r\n$4\r\nna").unwrap().is_none());
        assert!(parse(b"*2\r\n$3\r\nGET\r\n").unwrap().is_none());
        assert!(parse(b"*2").unwrap().is_none());
        assert!(parse(b"").unwrap().is_none());
    }

    #[test]
    fn test_parse_multibulk_leaves_trailing_bytes() {
        let input = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPI";
        let (parsed, consumed) = parse(input).unwrap().unwrap();
        assert_eq!(parsed, args(&["PING"]));
        assert_eq!(consumed, 14);
        assert!(parse(&input[consumed..]).unwrap().is_none());
    }

    #[test]
    fn test_parse_empty_multibulk() {
        let (parsed, consumed) = parse(b"*0\r\n").unwrap().unwrap();
        assert!(parsed.is_empty());
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_binary_safe_bulk_string() {
        let input = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$5\r\nhel\x00o\r\n";
        let (parsed, _) = parse(input).unwrap().unwrap();
        assert_eq!(parsed[2], Bytes::from(&b"hel\x00o"[..]));
    }

    #[test]
    fn test_multibulk_rejects_non_bulk_element() {
        let result = parse(b"*1\r\n:1\r\n");
        assert!(matches!(result, Err(ParseError::ProtocolError(_))));
    }

    #[test]
    fn test_multibulk_invalid_lengths() {
        assert!(matches!(
            parse(b"*x\r\n"),
            Err(ParseError::InvalidInteger(_))
        ));
        assert_eq!(parse(b"*-2\r\n"), Err(ParseError::InvalidArrayLength(-2)));
        assert_eq!(
            parse(b"*1\r\n$-5\r\n"),
            Err(ParseError::InvalidBulkLength(-5))
        );
    }

    #[test]
    fn test_bulk_missing_trailing_crlf() {
        let result = parse(b"*1\r\n$4\r\nPINGxx");
        assert!(matches!(result, Err(ParseError::ProtocolError(_))));
    }

    #[test]
    fn test_parse_inline_command() {
        let (parsed, consumed) = parse(b"SET name GoClone EX 10\r\n").unwrap().unwrap();
        assert_eq!(parsed, args(&["SET", "name", "GoClone", "EX", "10"]));
        assert_eq!(consumed, 24);
    }

    #[test]
    fn test_parse_inline_bare_newline() {
        let (parsed, consumed) = parse(b"PING\n").unwrap().unwrap();
        assert_eq!(parsed, args(&["PING"]));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parse_inline_incomplete() {
        assert!(parse(b"GET na").unwrap().is_none());
    }

    #[test]
    fn test_parse_inline_blank_line() {
        let (parsed, consumed) = parse(b"   \r\n").unwrap().unwrap();
        assert!(parsed.is_empty());
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parse_inline_quotes() {
        let (parsed, _) = parse(b"SET greeting \"hello world\" 'it\\'s'\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(parsed, args(&["SET", "greeting", "hello world", "it's"]));

        let (parsed, _) = parse(b"SET k \"a\\nb\\x41\"\r\n").unwrap().unwrap();
        assert_eq!(parsed[2], Bytes::from("a\nbA"));
    }

    #[test]
    fn test_parse_inline_unbalanced_quotes() {
        assert!(matches!(
            parse(b"SET k \"oops\r\n"),
            Err(ParseError::ProtocolError(_))
        ));
        assert!(matches!(
            parse(b"SET k \"a\"b\r\n"),
            Err(ParseError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_inline_size_limit() {
        let input = vec![b'a'; MAX_INLINE_SIZE + 1];
        assert!(matches!(
            parse(&input),
            Err(ParseError::MessageTooLarge { .. })
        ));
    }
}
