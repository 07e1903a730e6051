//! RESP wire values.
//!
//! [`RespValue`] covers the reply shapes the server produces and the command arrays
//! clients send. Encoding returns the exact wire text; [`RespValue::parse`] reads one
//! value from the front of a byte slice and reports how many bytes it consumed, so
//! callers can keep partial frames around until the rest arrives.

use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum RespError {
    #[error("incomplete RESP value")]
    Incomplete,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("unknown RESP type '{0}'")]
    UnknownRespType(char),
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid bulk string")]
    InvalidBulkString,
    #[error("invalid array")]
    InvalidArray,
}

impl RespError {
    pub fn as_string(&self) -> String {
        RespValue::Error(format!("ERR Protocol error: {}", self)).encode()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    NullBulkString,
    Array(Vec<RespValue>),
    NullArray,
}

impl RespValue {
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(value) => format!("+{}\r\n", value),
            RespValue::Error(message) => format!("-{}\r\n", message),
            RespValue::Integer(value) => format!(":{}\r\n", value),
            RespValue::BulkString(value) => format!("${}\r\n{}\r\n", value.len(), value),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::Array(items) => {
                let mut encoded = format!("*{}\r\n", items.len());

                for item in items {
                    encoded.push_str(&item.encode());
                }

                encoded
            }
            RespValue::NullArray => "*-1\r\n".to_string(),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.encode())
    }

    pub fn bulk(value: impl Into<String>) -> Self {
        RespValue::BulkString(value.into())
    }

    pub fn array_from_strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RespValue::Array(values.into_iter().map(RespValue::bulk).collect())
    }

    pub fn encode_array_from_strings<I, S>(values: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::array_from_strings(values).encode()
    }

    /// Returns the text of a simple or bulk string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(value) | RespValue::BulkString(value) => Some(value),
            _ => None,
        }
    }

    /// Parses one value from the start of `input`.
    ///
    /// Returns the value together with the number of bytes it occupied. When `input`
    /// ends before the value is complete, `RespError::Incomplete` is returned and
    /// nothing should be discarded by the caller.
    pub fn parse(input: &[u8]) -> Result<(RespValue, usize), RespError> {
        let (line, mut consumed) = read_line(input)?;

        let Some((&type_byte, body)) = line.split_first() else {
            return Err(RespError::UnknownRespType(' '));
        };

        match type_byte {
            b'+' => Ok((RespValue::SimpleString(to_utf8(body)?), consumed)),
            b'-' => Ok((RespValue::Error(to_utf8(body)?), consumed)),
            b':' => Ok((RespValue::Integer(parse_integer(body)?), consumed)),
            b'$' => {
                let length = parse_integer(body)?;

                if length == -1 {
                    return Ok((RespValue::NullBulkString, consumed));
                }

                let length = usize::try_from(length).map_err(|_| RespError::InvalidBulkString)?;
                let end = consumed + length;

                if input.len() < end + 2 {
                    return Err(RespError::Incomplete);
                }

                if &input[end..end + 2] != b"\r\n" {
                    return Err(RespError::InvalidBulkString);
                }

                let content = to_utf8(&input[consumed..end])?;

                Ok((RespValue::BulkString(content), end + 2))
            }
            b'*' => {
                let length = parse_integer(body)?;

                if length == -1 {
                    return Ok((RespValue::NullArray, consumed));
                }

                let length = usize::try_from(length).map_err(|_| RespError::InvalidArray)?;
                let mut items = Vec::with_capacity(length.min(64));

                for _ in 0..length {
                    let (item, used) = Self::parse(&input[consumed..])?;
                    items.push(item);
                    consumed += used;
                }

                Ok((RespValue::Array(items), consumed))
            }
            other => Err(RespError::UnknownRespType(other as char)),
        }
    }
}

/// Finds the first CRLF-terminated line. Returns the line without its terminator and
/// the number of bytes including it.
pub fn read_line(input: &[u8]) -> Result<(&[u8], usize), RespError> {
    let position = find_crlf(input).ok_or(RespError::Incomplete)?;

    Ok((&input[..position], position + 2))
}

pub fn find_crlf(input: &[u8]) -> Option<usize> {
    input.windows(2).position(|window| window == b"\r\n")
}

fn to_utf8(bytes: &[u8]) -> Result<String, RespError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| RespError::InvalidUtf8)
}

fn parse_integer(bytes: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(bytes)
        .map_err(|_| RespError::InvalidUtf8)?
        .parse::<i64>()
        .map_err(|_| RespError::FailedToParseInteger)
}
