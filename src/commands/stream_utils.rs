use crate::{
    key_value_store::{StreamEntry, StreamEntryId, StreamIdError},
    resp::RespValue,
};

/// Which side of an XRANGE interval a bound sits on. A bare `<ms>` takes sequence 0
/// as a start and the largest sequence as an end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeBound {
    Start,
    End,
}

/// Parses an XRANGE bound: `-`, `+`, `<ms>` or `<ms>-<seq>`.
pub fn parse_range_bound(input: &str, bound: RangeBound) -> Result<StreamEntryId, StreamIdError> {
    match (input, bound) {
        ("-", _) => Ok(StreamEntryId::ZERO),
        ("+", _) => Ok(StreamEntryId::MAX),
        (input, RangeBound::Start) => StreamEntryId::parse_bound(input, 0),
        (input, RangeBound::End) => StreamEntryId::parse_bound(input, u64::MAX),
    }
}

/// Converts stream entries to RESP: each entry becomes
/// `[id, [field1, value1, field2, value2, ...]]`.
pub fn entries_to_resp(entries: Vec<StreamEntry>) -> RespValue {
    RespValue::Array(
        entries
            .into_iter()
            .map(|(id, fields)| {
                RespValue::Array(vec![
                    RespValue::BulkString(id.to_string()),
                    RespValue::array_from_strings(
                        fields
                            .into_iter()
                            .flat_map(|(field, value)| [field, value]),
                    ),
                ])
            })
            .collect(),
    )
}

/// XREAD's reply shape: `[[key, entries], ...]`.
pub fn streams_to_resp(streams: Vec<(String, Vec<StreamEntry>)>) -> RespValue {
    RespValue::Array(
        streams
            .into_iter()
            .map(|(key, entries)| {
                RespValue::Array(vec![RespValue::BulkString(key), entries_to_resp(entries)])
            })
            .collect(),
    )
}
