use std::{
    collections::BTreeMap,
    fmt,
    ops::Bound::{Excluded, Unbounded},
    str::FromStr,
};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum StreamIdError {
    #[error("The ID specified in XADD must be greater than 0-0")]
    ZeroId,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    NotGreaterThanTop,
    #[error("Invalid stream ID specified as stream command argument")]
    Invalid,
}

/// Entry ID ordered by timestamp, then sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamEntryId {
    pub timestamp: u64,
    pub sequence: u64,
}

impl StreamEntryId {
    pub const ZERO: Self = Self::new(0, 0);
    pub const MAX: Self = Self::new(u64::MAX, u64::MAX);

    pub const fn new(timestamp: u64, sequence: u64) -> Self {
        Self {
            timestamp,
            sequence,
        }
    }

    /// Parses `<ms>-<seq>` or a bare `<ms>`, which takes `default_sequence`.
    pub fn parse_bound(input: &str, default_sequence: u64) -> Result<Self, StreamIdError> {
        let (timestamp, sequence) = match input.split_once('-') {
            Some((timestamp, sequence)) => (
                timestamp,
                sequence.parse::<u64>().map_err(|_| StreamIdError::Invalid)?,
            ),
            None => (input, default_sequence),
        };

        let timestamp = timestamp
            .parse::<u64>()
            .map_err(|_| StreamIdError::Invalid)?;

        Ok(Self::new(timestamp, sequence))
    }

    fn next_sequence(&self) -> Result<Self, StreamIdError> {
        self.sequence
            .checked_add(1)
            .map(|sequence| Self::new(self.timestamp, sequence))
            .ok_or(StreamIdError::NotGreaterThanTop)
    }
}

impl fmt::Display for StreamEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.timestamp, self.sequence)
    }
}

/// The ID argument of XADD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRequest {
    /// `*`
    Auto,
    /// `<ms>-*`, or a bare `<ms>`
    AutoSequence(u64),
    /// `<ms>-<seq>`
    Explicit(StreamEntryId),
}

impl FromStr for IdRequest {
    type Err = StreamIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input == "*" {
            return Ok(IdRequest::Auto);
        }

        match input.split_once('-') {
            Some((timestamp, "*")) => timestamp
                .parse::<u64>()
                .map(IdRequest::AutoSequence)
                .map_err(|_| StreamIdError::Invalid),
            Some(_) => StreamEntryId::parse_bound(input, 0).map(IdRequest::Explicit),
            None => input
                .parse::<u64>()
                .map(IdRequest::AutoSequence)
                .map_err(|_| StreamIdError::Invalid),
        }
    }
}

pub type StreamFields = Vec<(String, String)>;
pub type StreamEntry = (StreamEntryId, StreamFields);

/// Append-only log. Every appended ID is strictly greater than `last_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamRecord {
    entries: BTreeMap<StreamEntryId, StreamFields>,
    last_id: StreamEntryId,
}

impl StreamRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_id(&self) -> StreamEntryId {
        self.last_id
    }

    /// Resolves the ID an append with `request` would get at `now_ms`.
    pub fn next_id(&self, request: IdRequest, now_ms: u64) -> Result<StreamEntryId, StreamIdError> {
        let last = self.last_id;

        match request {
            IdRequest::Auto if now_ms > last.timestamp => Ok(StreamEntryId::new(now_ms, 0)),
            // The clock went backwards or did not move: stay on the last timestamp.
            IdRequest::Auto => last.next_sequence(),
            IdRequest::AutoSequence(timestamp) if timestamp > last.timestamp => {
                Ok(StreamEntryId::new(timestamp, 0))
            }
            IdRequest::AutoSequence(timestamp) if timestamp == last.timestamp => {
                last.next_sequence()
            }
            IdRequest::AutoSequence(_) => Err(StreamIdError::NotGreaterThanTop),
            IdRequest::Explicit(id) if id == StreamEntryId::ZERO => Err(StreamIdError::ZeroId),
            IdRequest::Explicit(id) if id <= last => Err(StreamIdError::NotGreaterThanTop),
            IdRequest::Explicit(id) => Ok(id),
        }
    }

    /// Appends an entry, leaving the stream untouched when the ID is rejected.
    pub fn append(
        &mut self,
        request: IdRequest,
        fields: StreamFields,
        now_ms: u64,
    ) -> Result<StreamEntryId, StreamIdError> {
        let id = self.next_id(request, now_ms)?;

        self.entries.insert(id, fields);
        self.last_id = id;

        Ok(id)
    }

    /// Entries with `start <= id <= end`.
    pub fn range(&self, start: StreamEntryId, end: StreamEntryId) -> Vec<StreamEntry> {
        if start > end {
            return Vec::new();
        }

        self.entries
            .range(start..=end)
            .map(|(id, fields)| (*id, fields.clone()))
            .collect()
    }

    /// Entries with an ID strictly greater than `id`.
    pub fn entries_after(&self, id: StreamEntryId) -> Vec<StreamEntry> {
        self.entries
            .range((Excluded(id), Unbounded))
            .map(|(id, fields)| (*id, fields.clone()))
            .collect()
    }
}
