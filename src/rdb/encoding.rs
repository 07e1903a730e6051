use crate::rdb::RdbError;

/// A forward-only view over snapshot bytes.
pub struct Cursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.bytes.len()
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], RdbError> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(RdbError::UnexpectedEof)?;

        let slice = &self.bytes[self.position..end];
        self.position = end;

        Ok(slice)
    }

    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], RdbError> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);

        Ok(array)
    }

    pub fn take_byte(&mut self) -> Result<u8, RdbError> {
        Ok(self.take_array::<1>()?[0])
    }
}

#[derive(Debug, PartialEq)]
enum LengthEncoding {
    Length(usize),
    Int8,
    Int16,
    Int32,
    Lzf,
}

/// The first two bits of the first byte select the encoding:
///
/// * `00`: the remaining 6 bits are the length
/// * `01`: the remaining 6 bits and the next byte form a 14-bit length
/// * `10`: `0x80` is followed by a 32-bit, `0x81` by a 64-bit big-endian length
/// * `11`: a specially encoded string (integer or LZF)
fn read_length_encoding(cursor: &mut Cursor) -> Result<LengthEncoding, RdbError> {
    let first = cursor.take_byte()?;

    match first >> 6 {
        0b00 => Ok(LengthEncoding::Length((first & 0b0011_1111) as usize)),
        0b01 => {
            let second = cursor.take_byte()?;
            let length = (((first & 0b0011_1111) as usize) << 8) | second as usize;

            Ok(LengthEncoding::Length(length))
        }
        0b10 => match first {
            0x80 => Ok(LengthEncoding::Length(
                u32::from_be_bytes(cursor.take_array()?) as usize,
            )),
            0x81 => Ok(LengthEncoding::Length(
                u64::from_be_bytes(cursor.take_array()?) as usize,
            )),
            other => Err(RdbError::InvalidLengthEncoding(other)),
        },
        _ => match first & 0b0011_1111 {
            0 => Ok(LengthEncoding::Int8),
            1 => Ok(LengthEncoding::Int16),
            2 => Ok(LengthEncoding::Int32),
            3 => Ok(LengthEncoding::Lzf),
            _ => Err(RdbError::InvalidLengthEncoding(first)),
        },
    }
}

/// Reads a plain length, as used by resize hints and database selectors.
pub fn read_length(cursor: &mut Cursor) -> Result<usize, RdbError> {
    let first = cursor.bytes.get(cursor.position).copied();

    match read_length_encoding(cursor)? {
        LengthEncoding::Length(length) => Ok(length),
        _ => Err(RdbError::InvalidLengthEncoding(first.unwrap_or_default())),
    }
}

/// Reads a string, expanding integer encodings to their decimal text.
pub fn read_string(cursor: &mut Cursor) -> Result<String, RdbError> {
    match read_length_encoding(cursor)? {
        LengthEncoding::Length(length) => String::from_utf8(cursor.take(length)?.to_vec())
            .map_err(|_| RdbError::InvalidUtf8),
        LengthEncoding::Int8 => Ok(i8::from_le_bytes(cursor.take_array()?).to_string()),
        LengthEncoding::Int16 => Ok(i16::from_le_bytes(cursor.take_array()?).to_string()),
        LengthEncoding::Int32 => Ok(i32::from_le_bytes(cursor.take_array()?).to_string()),
        LengthEncoding::Lzf => Err(RdbError::UnsupportedLzf),
    }
}
