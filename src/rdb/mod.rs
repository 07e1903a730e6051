//! Snapshot (RDB) reading.
//!
//! Only string values are understood, which covers what this server needs at startup
//! and what a master ships on full resync.

mod encoding;
mod opcode;

use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use jiff::Timestamp;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    key_value_store::{DataType, Value},
    rdb::{
        encoding::Cursor,
        opcode::{read_section, Section},
    },
};

/// A snapshot with no keys, sent to replicas on full resync.
const EMPTY_SNAPSHOT_HEX: &str = "524544495330303131fa0972656469732d76657205372e322e30fa0a72656469732d62697473c040fa056374696d65c26d08bc65fa08757365642d6d656dc2b0c41000fa08616f662d62617365c000fff06e3bfec0ff5aa2";

#[derive(Error, Debug, PartialEq)]
pub enum RdbError {
    #[error("unexpected end of snapshot")]
    UnexpectedEof,
    #[error("invalid magic string")]
    InvalidMagicString,
    #[error("unsupported snapshot version '{0}'")]
    UnsupportedVersion(String),
    #[error("invalid length encoding 0x{0:02X}")]
    InvalidLengthEncoding(u8),
    #[error("LZF compressed strings are not supported")]
    UnsupportedLzf,
    #[error("unsupported value type 0x{0:02X}")]
    UnsupportedValueType(u8),
    #[error("invalid UTF-8 in snapshot")]
    InvalidUtf8,
    #[error("invalid expiration timestamp {0}")]
    InvalidExpiration(i64),
    #[error("invalid embedded snapshot: {0}")]
    InvalidEmbeddedSnapshot(#[from] hex::FromHexError),
}

#[derive(Debug, Default, PartialEq)]
pub struct RdbSnapshot {
    pub version: String,
    pub metadata: Vec<(String, String)>,
    /// Entries still alive at load time.
    pub entries: Vec<(String, Value)>,
    pub checksum: Option<[u8; 8]>,
}

pub struct RdbParser<'a> {
    cursor: Cursor<'a>,
}

impl<'a> RdbParser<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn parse(mut self) -> Result<RdbSnapshot, RdbError> {
        let mut snapshot = RdbSnapshot {
            version: self.read_header()?,
            ..RdbSnapshot::default()
        };

        while !self.cursor.is_empty() {
            match read_section(&mut self.cursor)? {
                Section::Metadata { key, value } => snapshot.metadata.push((key, value)),
                Section::ResizeDb {
                    hash_table_size,
                    expiry_hash_table_size,
                } => {
                    debug!(hash_table_size, expiry_hash_table_size, "Snapshot resize hint");
                }
                Section::Database(number) => debug!(number, "Snapshot database selected"),
                Section::Entry {
                    key,
                    value,
                    expires_at,
                } => {
                    let expiration = expires_at
                        .map(|millis| {
                            Timestamp::from_millisecond(millis)
                                .map_err(|_| RdbError::InvalidExpiration(millis))
                        })
                        .transpose()?;

                    let value = Value::with_expiration(DataType::String(value), expiration);

                    if !value.is_expired() {
                        snapshot.entries.push((key, value));
                    }
                }
                Section::EndOfFile { checksum } => {
                    snapshot.checksum = checksum;
                    break;
                }
            }
        }

        Ok(snapshot)
    }

    fn read_header(&mut self) -> Result<String, RdbError> {
        if self.cursor.take(5)? != b"REDIS" {
            return Err(RdbError::InvalidMagicString);
        }

        let version = String::from_utf8(self.cursor.take(4)?.to_vec())
            .map_err(|_| RdbError::InvalidUtf8)?;

        match version.parse::<u32>() {
            Ok(1..=12) => Ok(version),
            _ => Err(RdbError::UnsupportedVersion(version)),
        }
    }
}

pub fn empty_snapshot() -> Result<Bytes, RdbError> {
    Ok(Bytes::from(hex::decode(EMPTY_SNAPSHOT_HEX)?))
}

/// Loads `<dir>/<dbfilename>`. Unset options or a missing file give an empty start.
pub async fn load_snapshot_file(dir: &str, dbfilename: &str) -> anyhow::Result<Vec<(String, Value)>> {
    if dbfilename.is_empty() {
        return Ok(Vec::new());
    }

    let path = Path::new(dir).join(dbfilename);

    if !path.exists() {
        info!(path = %path.display(), "No snapshot file, starting empty");
        return Ok(Vec::new());
    }

    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading snapshot {}", path.display()))?;

    let snapshot = RdbParser::new(&bytes)
        .parse()
        .with_context(|| format!("parsing snapshot {}", path.display()))?;

    info!(
        path = %path.display(),
        keys = snapshot.entries.len(),
        "Snapshot loaded"
    );

    Ok(snapshot.entries)
}
